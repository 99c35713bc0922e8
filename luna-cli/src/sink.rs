//! A stdout [`ResultSink`] implementation: one tab-separated line per
//! `value()`/`value_str()` call, prefixed by the current stratification
//! keys. Not meant to rival the original tabular writer (out of scope per
//! section 1) — just enough for a command-line frontend to show results.

use luna_core::interfaces::ResultSink;
use serde_json::{Map, Value};

pub struct StdoutSink {
    strata: Vec<(String, String)>,
}

impl StdoutSink {
    #[must_use]
    pub fn new() -> Self {
        Self { strata: Vec::new() }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSink for StdoutSink {
    fn stratify(&mut self, keys: &[(&str, &str)]) {
        self.strata = keys.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    }

    fn value(&mut self, name: &str, value: f64) {
        self.print_row(name, &format!("{value}"));
    }

    fn value_str(&mut self, name: &str, value: &str) {
        self.print_row(name, value);
    }
}

impl StdoutSink {
    fn print_row(&self, name: &str, value: &str) {
        let prefix: String = self.strata.iter().map(|(k, v)| format!("{k}={v}\t")).collect();
        println!("{prefix}{name}\t{value}");
    }
}

/// A [`ResultSink`] that accumulates every stratified value into a nested
/// `serde_json::Value` object (stratification keys become nested object
/// keys), for `--json` output. Matches the annotation-file/statistics
/// interchange use of `serde`/`serde_json` noted in the ambient stack.
#[derive(Default)]
pub struct JsonSink {
    strata: Vec<(String, String)>,
    root: Map<String, Value>,
}

impl JsonSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    fn leaf_map(&mut self) -> &mut Map<String, Value> {
        let mut map = &mut self.root;
        for (k, v) in &self.strata {
            map = map
                .entry(format!("{k}={v}"))
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .expect("stratification path always holds an object");
        }
        map
    }
}

impl ResultSink for JsonSink {
    fn stratify(&mut self, keys: &[(&str, &str)]) {
        self.strata = keys.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    }

    fn value(&mut self, name: &str, value: f64) {
        let name = name.to_string();
        self.leaf_map().insert(name, Value::from(value));
    }

    fn value_str(&mut self, name: &str, value: &str) {
        let name = name.to_string();
        self.leaf_map().insert(name, Value::from(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stratify_prefixes_subsequent_values() {
        let mut sink = StdoutSink::new();
        sink.stratify(&[("E", "1")]);
        sink.value("TST", 1.0);
    }

    #[test]
    fn json_sink_nests_by_stratification() {
        let mut sink = JsonSink::new();
        sink.value("TST", 420.0);
        sink.stratify(&[("STAGE", "N2")]);
        sink.value("NBOUTS", 3.0);
        let v = sink.into_value();
        assert_eq!(v["TST"], 420.0);
        assert_eq!(v["STAGE=N2"]["NBOUTS"], 3.0);
    }
}
