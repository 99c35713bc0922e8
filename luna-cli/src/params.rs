//! Parses a command's `key=value,key2=value2` parameter string (section 6)
//! into a lookup usable by the `hypno`/`trans` command handlers. Values
//! themselves may be comma-separated sub-lists (`cut=50,3,10,10`), so
//! splitting is done on top-level `,` only, matching the greedy
//! `key=value[,value...]` grouping the original command parser uses.

use std::collections::HashMap;

use color_eyre::eyre::{eyre, Result};
use luna_core::ClockTime;

/// One parsed `key=value-list` pair; value-list retains its original
/// comma-separated sub-fields for parameters like `cut=50,3,10,10`.
#[derive(Debug, Clone, Default)]
pub struct ParamList {
    values: HashMap<String, Vec<String>>,
}

impl ParamList {
    /// Parse a full `key=v1,key2=v1,v2,...` parameter string. A bare `key`
    /// with no `=` is recorded as a flag with an empty value list.
    pub fn parse(input: &str) -> Result<Self> {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for field in split_top_level(input, ' ') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            match field.split_once('=') {
                Some((key, rest)) => {
                    let parts = split_top_level(rest, ',').into_iter().map(str::to_string).collect();
                    values.insert(key.trim().to_string(), parts);
                }
                None => {
                    values.insert(field.to_string(), Vec::new());
                }
            }
        }
        Ok(Self { values })
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn raw(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn string(&self, key: &str) -> Result<String> {
        self.raw(key)
            .and_then(|v| v.first())
            .cloned()
            .ok_or_else(|| eyre!("missing required parameter '{key}'"))
    }

    pub fn float(&self, key: &str) -> Result<f64> {
        self.string(key)?.parse().map_err(|e| eyre!("parameter '{key}' is not a number: {e}"))
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        self.string(key)?.parse().map_err(|e| eyre!("parameter '{key}' is not an integer: {e}"))
    }

    pub fn floats(&self, key: &str) -> Result<Vec<f64>> {
        self.raw(key)
            .ok_or_else(|| eyre!("missing required parameter '{key}'"))?
            .iter()
            .map(|s| s.parse().map_err(|e| eyre!("parameter '{key}' has a non-numeric field: {e}")))
            .collect()
    }

    pub fn clock(&self, key: &str) -> Result<ClockTime> {
        let s = self.string(key)?;
        ClockTime::parse(&s).ok_or_else(|| eyre!("parameter '{key}' is not an HH:MM:SS clock: {s}"))
    }
}

/// Split on `sep` outside of parentheses, so a future bracketed sub-list
/// parameter does not get split prematurely.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            c if c == sep && depth == 0 => {
                out.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_and_flag() {
        let p = ParamList::parse("lights-off=23:30:00 verbose").unwrap();
        assert_eq!(p.string("lights-off").unwrap(), "23:30:00");
        assert!(p.has("verbose"));
        assert!(p.raw("verbose").unwrap().is_empty());
    }

    #[test]
    fn parses_comma_separated_value_list() {
        let p = ParamList::parse("cut=50,3,10,10").unwrap();
        assert_eq!(p.floats("cut").unwrap(), vec![50.0, 3.0, 10.0, 10.0]);
    }

    #[test]
    fn missing_required_parameter_errors() {
        let p = ParamList::parse("verbose").unwrap();
        assert!(p.string("sig").is_err());
    }

    #[test]
    fn clock_parameter_parses_hh_mm_ss() {
        let p = ParamList::parse("clock=07:15:30").unwrap();
        let ct = p.clock("clock").unwrap();
        assert_eq!(ct.h, 7);
        assert_eq!(ct.m, 15);
    }
}
