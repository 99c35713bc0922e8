//! LZW-complexity of a hypnogram: encode the stage sequence as a character
//! string, LZW-compress it, and express the result as a ratio against the
//! theoretical minimum ratio achievable by a constant sequence of the same
//! length (a maximally-compressible "flat" hypnogram).

use std::collections::HashMap;

use super::{Class3, SleepStage};

#[derive(Debug, Clone, Copy)]
pub struct LzwComplexity {
    /// `encoded_len / raw_len` for the scored sequence.
    pub raw_ratio: f64,
    /// The same ratio for a constant sequence of identical length: the
    /// smallest ratio any sequence of this length can achieve.
    pub min_ratio: f64,
    /// `raw_ratio / min_ratio`, `1.0` for a fully flat hypnogram and growing
    /// with sequence disorder.
    pub normalized: f64,
}

fn encode_chars_5class(stages: &[SleepStage]) -> Vec<char> {
    stages
        .iter()
        .filter_map(|s| s.class5())
        .map(|c| match c {
            super::Class5::Wake => 'A',
            super::Class5::N1 => 'B',
            super::Class5::N2 => 'C',
            super::Class5::N3 => 'D',
            super::Class5::Rem => 'E',
        })
        .collect()
}

fn encode_chars_3class(stages: &[SleepStage]) -> Vec<char> {
    stages
        .iter()
        .filter_map(|s| s.class3())
        .map(|c| match c {
            Class3::Wake => 'A',
            Class3::Nrem => 'B',
            Class3::Rem => 'C',
        })
        .collect()
}

/// Number of codewords an LZW encoder emits for `chars`: the classic
/// dictionary-growing single-pass algorithm, codeword count only (the
/// dictionary contents are not needed by callers).
#[must_use]
fn lzw_codeword_count(chars: &[char]) -> usize {
    if chars.is_empty() {
        return 0;
    }
    let mut dict: HashMap<String, usize> = HashMap::new();
    for c in chars.iter().collect::<std::collections::HashSet<_>>() {
        let next_id = dict.len();
        dict.insert(c.to_string(), next_id);
    }
    let mut w = String::new();
    let mut count = 0usize;
    for &c in chars {
        let mut wc = w.clone();
        wc.push(c);
        if dict.contains_key(&wc) {
            w = wc;
        } else {
            count += 1;
            let next_id = dict.len();
            dict.insert(wc, next_id);
            w = c.to_string();
        }
    }
    if !w.is_empty() {
        count += 1;
    }
    count
}

/// Compute the 5-class LZW complexity for a scored stage sequence.
#[must_use]
pub fn complexity_5class(stages: &[SleepStage]) -> LzwComplexity {
    compute(&encode_chars_5class(stages))
}

/// Compute the 3-class (wake/NREM/REM) LZW complexity.
#[must_use]
pub fn complexity_3class(stages: &[SleepStage]) -> LzwComplexity {
    compute(&encode_chars_3class(stages))
}

fn compute(chars: &[char]) -> LzwComplexity {
    let n = chars.len();
    if n == 0 {
        return LzwComplexity { raw_ratio: 0.0, min_ratio: 0.0, normalized: 0.0 };
    }
    let raw_len = lzw_codeword_count(chars) as f64;
    let raw_ratio = raw_len / n as f64;

    let flat: Vec<char> = std::iter::repeat(chars[0]).take(n).collect();
    let min_len = lzw_codeword_count(&flat) as f64;
    let min_ratio = min_len / n as f64;

    let normalized = if min_ratio > 0.0 { raw_ratio / min_ratio } else { 1.0 };
    LzwComplexity { raw_ratio, min_ratio, normalized }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(spec: &str) -> Vec<SleepStage> {
        spec.split_whitespace().map(|c| SleepStage::from_code(c).unwrap()).collect()
    }

    #[test]
    fn constant_sequence_is_normalized_to_one() {
        let s = vec![SleepStage::N2; 40];
        let c = complexity_5class(&s);
        assert!((c.normalized - 1.0).abs() < 1e-9);
    }

    #[test]
    fn alternating_sequence_has_higher_ratio_than_constant() {
        let mut s = Vec::new();
        for i in 0..40 {
            s.push(if i % 2 == 0 { SleepStage::N2 } else { SleepStage::Rem });
        }
        let c = complexity_5class(&s);
        assert!(c.normalized >= 1.0);
        assert!(c.raw_ratio > 0.0);
    }

    #[test]
    fn three_class_collapses_nrem_stages() {
        let s = stages("W N1 N2 N3 N2 N1 W R R W");
        let c3 = complexity_3class(&s);
        let c5 = complexity_5class(&s);
        assert!(c3.raw_ratio <= c5.raw_ratio + 1e-9);
    }

    #[test]
    fn empty_sequence_yields_zero() {
        let c = complexity_5class(&[]);
        assert_eq!(c.raw_ratio, 0.0);
        assert_eq!(c.normalized, 0.0);
    }
}
