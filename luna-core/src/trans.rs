//! TRANS: expression-driven signal/annotation synthesis. Two modes, both
//! built on the same evaluator used for scripted expressions elsewhere:
//! `sig=X, expr=...` rewrites or creates channel `X` at the shared sampling
//! rate of its inputs, `annot=A, expr=...` turns a boolean-vector result
//! into annotation instances over the true runs.

use crate::annotation::{Annotation, Instance};
use crate::clock::{Interval, Tick};
use crate::error::{LunaError, Result};
use crate::evaluator::Evaluator;
use crate::value::TypedValue;

/// One input channel's samples, bound into the expression under its
/// sanitized identifier.
#[derive(Debug, Clone)]
pub struct ChannelBinding {
    pub name: String,
    pub sample_rate_hz: f64,
    pub samples: Vec<f64>,
}

/// Non-alphanumeric characters in a channel label become `_` so the name is
/// a legal evaluator identifier; leading digits get a `_` prefix.
#[must_use]
pub fn sanitize_channel_name(name: &str) -> String {
    let mut out: String = name.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn common_sample_rate(channels: &[ChannelBinding]) -> Result<f64> {
    let Some(first) = channels.first() else {
        return Err(LunaError::MissingChannel("no input channels bound".into()));
    };
    for ch in &channels[1..] {
        if (ch.sample_rate_hz - first.sample_rate_hz).abs() > 1e-9 {
            return Err(LunaError::IncompatibleRate(format!("{} ({} Hz) vs {} ({} Hz)", first.name, first.sample_rate_hz, ch.name, ch.sample_rate_hz)));
        }
    }
    Ok(first.sample_rate_hz)
}

fn bind_channels(local: &mut Instance, channels: &[ChannelBinding]) {
    for ch in channels {
        local.set(sanitize_channel_name(&ch.name), TypedValue::DblVec(ch.samples.clone()));
    }
}

/// `sig=X, expr=...`: evaluate `expr` with every channel in `channels` bound
/// as a float vector, and return `X`'s new samples at the channels' shared
/// sampling rate. Fails if the bound channels disagree on sampling rate or
/// the expression's result is not a vector of the expected length.
pub fn eval_sig(expr: &str, channels: &[ChannelBinding], out_channel: &str) -> Result<(f64, Vec<f64>)> {
    let rate = common_sample_rate(channels)?;
    let expected_len = channels[0].samples.len();

    let mut local = Instance::new();
    bind_channels(&mut local, channels);

    let mut ev = Evaluator::new();
    let result = ev.eval_script(expr, &mut local, None)?;
    let samples = result.as_typed_value().double_vector();
    if samples.len() != expected_len {
        return Err(LunaError::Assignment(format!(
            "sig={out_channel}: expression produced {} samples, expected {expected_len}",
            samples.len()
        )));
    }
    Ok((rate, samples))
}

/// `annot=A, expr=...`: evaluate `expr` with every channel in `channels`
/// bound, require a boolean vector of the channels' sample count, and
/// return one interval per maximal contiguous run of `true`, in the
/// channel's tick scale. Does not mutate an [`Annotation`] itself; the
/// caller decides whether/how to merge the result.
pub fn eval_annot(expr: &str, channels: &[ChannelBinding]) -> Result<Vec<Interval>> {
    let rate = common_sample_rate(channels)?;
    let expected_len = channels[0].samples.len();
    let tick_per_sample = Tick::from_seconds(1.0 / rate);

    let mut local = Instance::new();
    bind_channels(&mut local, channels);

    let mut ev = Evaluator::new();
    let result = ev.eval_script(expr, &mut local, None)?;
    let mask = result.as_typed_value().bool_vector();
    if mask.len() != expected_len {
        return Err(LunaError::Assignment(format!("annot expression produced {} samples, expected {expected_len}", mask.len())));
    }

    let mut intervals = Vec::new();
    let mut i = 0;
    while i < mask.len() {
        if mask[i] {
            let start = i;
            while i < mask.len() && mask[i] {
                i += 1;
            }
            intervals.push(Interval::new(tick_per_sample * start as i64, tick_per_sample * i as i64));
        } else {
            i += 1;
        }
    }
    Ok(intervals)
}

/// Write `eval_annot`'s intervals into `annotation` as numbered instances
/// `"1"`, `"2"`, ... on channel `channel`.
pub fn write_annot_instances(annotation: &mut Annotation, intervals: &[Interval], channel: &str) {
    for (i, iv) in intervals.iter().enumerate() {
        annotation.add((i + 1).to_string(), *iv, channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_non_alnum_and_leading_digit() {
        assert_eq!(sanitize_channel_name("C3-M2"), "C3_M2");
        assert_eq!(sanitize_channel_name("3C"), "_3C");
    }

    #[test]
    fn sig_requires_matching_sample_rates() {
        let channels = vec![
            ChannelBinding { name: "C3".into(), sample_rate_hz: 100.0, samples: vec![0.0; 10] },
            ChannelBinding { name: "C4".into(), sample_rate_hz: 200.0, samples: vec![0.0; 10] },
        ];
        let err = eval_sig("C3 + C4", &channels, "SUM").unwrap_err();
        assert!(matches!(err, LunaError::IncompatibleRate(_)));
    }

    #[test]
    fn sig_adds_two_channels() {
        let channels = vec![
            ChannelBinding { name: "C3".into(), sample_rate_hz: 100.0, samples: vec![1.0, 2.0, 3.0] },
            ChannelBinding { name: "C4".into(), sample_rate_hz: 100.0, samples: vec![10.0, 20.0, 30.0] },
        ];
        let (rate, samples) = eval_sig("C3 + C4", &channels, "SUM").unwrap();
        assert_eq!(rate, 100.0);
        assert_eq!(samples, vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn annot_from_threshold_produces_contiguous_runs() {
        let samples = vec![0.1, 0.6, 0.7, 0.2, 0.8, 0.9, 0.3];
        let channels = vec![ChannelBinding { name: "C".into(), sample_rate_hz: 1.0, samples: samples.clone() }];
        let intervals = eval_annot("C > 0.5", &channels).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0], Interval::new(Tick::from_seconds(1.0), Tick::from_seconds(3.0)));
        assert_eq!(intervals[1], Interval::new(Tick::from_seconds(4.0), Tick::from_seconds(6.0)));
    }
}
