//! Trait boundaries for the external collaborators named in section 6:
//! EDF/EDF+ file access, annotation-record ingestion, and tabular result
//! output. `luna-core` consumes the first two and produces into the third;
//! it implements none of them — EDF parsing, DSP kernels, and the tabular
//! writer live downstream of this crate.

use crate::clock::{ClockTime, Interval, Tick};

/// One channel's static header info as recorded at EDF load.
#[derive(Debug, Clone)]
pub struct ChannelHeader {
    pub label: String,
    pub sample_rate_hz: f64,
}

/// The opaque EDF/EDF+ loader surface this crate's [`crate::timeline::Timeline`]
/// is built from: record geometry, per-channel headers, and a slice
/// operation returning samples plus tick stamps for an interval.
pub trait EdfSource {
    fn num_records(&self) -> usize;
    fn record_duration_sec(&self) -> f64;
    fn start_time(&self) -> Option<ClockTime>;
    fn channels(&self) -> &[ChannelHeader];

    /// Samples for `channel` covering `window`, plus the tick stamp of the
    /// first returned sample. Implementations must not straddle a
    /// discontinuity; callers that need continuity check the timeline first.
    fn slice(&self, channel: &str, window: Interval) -> Option<(Vec<f64>, Tick)>;
}

/// One annotation record as read from a line/record-format annotation file
/// (section 6): `(annotation name, instance id, channel or "*", interval,
/// optional typed metadata)`. XML NSRR variants are a distinct external
/// loader that ultimately produces the same records.
#[derive(Debug, Clone)]
pub struct AnnotationRecord {
    pub annotation: String,
    pub instance_id: String,
    pub channel: String,
    pub interval: Interval,
    pub meta: Vec<(String, crate::value::TypedValue)>,
}

pub trait AnnotationRecordSource {
    fn records(&self) -> Vec<AnnotationRecord>;
}

/// The stratified keyed tabular writer commands emit results into. Not
/// thread-safe (section 5): a single recording's command sequence drives one
/// `ResultSink` to completion before the next command begins.
pub trait ResultSink {
    /// Set the current stratification keys (e.g. `E` for epoch, `CH` for
    /// channel) before emitting values under them.
    fn stratify(&mut self, keys: &[(&str, &str)]);
    fn value(&mut self, name: &str, value: f64);
    fn value_str(&mut self, name: &str, value: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink(Vec<(String, String)>);
    impl ResultSink for NullSink {
        fn stratify(&mut self, _keys: &[(&str, &str)]) {}
        fn value(&mut self, name: &str, value: f64) {
            self.0.push((name.to_string(), value.to_string()));
        }
        fn value_str(&mut self, name: &str, value: &str) {
            self.0.push((name.to_string(), value.to_string()));
        }
    }

    #[test]
    fn result_sink_is_object_safe() {
        let mut sink: Box<dyn ResultSink> = Box::new(NullSink(Vec::new()));
        sink.stratify(&[("E", "1")]);
        sink.value("TST", 420.0);
    }
}
