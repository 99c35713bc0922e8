//! 5-class and 3-class stage-adjacency transition matrices, plus the Sleep
//! Fragmentation Index (SFI) and Sleep Transition Index (STI).

use std::collections::HashMap;

use super::{Class3, SleepStage};

/// Dense adjacency counts over the 5-class scheme actually observed
/// (wake / N1 / N2 / N3-N4 / REM), keyed by `(from, to)`.
#[must_use]
pub fn adjacency_5class(stages: &[SleepStage]) -> HashMap<(SleepStage, SleepStage), u64> {
    let mut counts = HashMap::new();
    for w in stages.windows(2) {
        let (a, b) = (collapse5(w[0]), collapse5(w[1]));
        let (Some(a), Some(b)) = (a, b) else { continue };
        *counts.entry((a, b)).or_insert(0u64) += 1;
    }
    counts
}

#[must_use]
pub fn adjacency_3class(stages: &[SleepStage]) -> HashMap<(Class3, Class3), u64> {
    let mut counts = HashMap::new();
    for w in stages.windows(2) {
        let (a, b) = (w[0].class3(), w[1].class3());
        let (Some(a), Some(b)) = (a, b) else { continue };
        *counts.entry((a, b)).or_insert(0u64) += 1;
    }
    counts
}

/// Collapse N3/N4 for the transition matrix's 5-class scheme without
/// discarding wake.
fn collapse5(s: SleepStage) -> Option<SleepStage> {
    match s {
        SleepStage::N4 => Some(SleepStage::N3),
        SleepStage::Wake | SleepStage::N1 | SleepStage::N2 | SleepStage::N3 | SleepStage::Rem => Some(s),
        _ => None,
    }
}

/// Conditional probability `P(to | from)` from a raw count matrix.
#[must_use]
pub fn conditional_probabilities<K: Eq + std::hash::Hash + Copy>(counts: &HashMap<(K, K), u64>) -> HashMap<(K, K), f64> {
    let mut row_totals: HashMap<K, u64> = HashMap::new();
    for (&(from, _), &n) in counts {
        *row_totals.entry(from).or_insert(0) += n;
    }
    counts
        .iter()
        .map(|(&(from, to), &n)| {
            let total = row_totals[&from].max(1) as f64;
            ((from, to), n as f64 / total)
        })
        .collect()
}

/// SFI = #(sleep -> wake) / TST(minutes); STI = #(sleep -> sleep) / TST.
#[must_use]
pub fn sleep_fragmentation_and_transition_index(stages: &[SleepStage], epoch_min: f64) -> (f64, f64) {
    let tst_min = stages.iter().filter(|s| s.is_sleep()).count() as f64 * epoch_min;
    if tst_min == 0.0 {
        return (0.0, 0.0);
    }
    let mut sleep_to_wake = 0u64;
    let mut sleep_to_sleep = 0u64;
    for w in stages.windows(2) {
        if w[0].is_sleep() && w[1].is_wake() {
            sleep_to_wake += 1;
        }
        if w[0].is_sleep() && w[1].is_sleep() {
            sleep_to_sleep += 1;
        }
    }
    (sleep_to_wake as f64 / tst_min, sleep_to_sleep as f64 / tst_min)
}

/// 3-class transition index: #(class change) / TST(minutes).
#[must_use]
pub fn transition_index_3class(stages: &[SleepStage], epoch_min: f64) -> f64 {
    let tst_min = stages.iter().filter(|s| s.is_sleep()).count() as f64 * epoch_min;
    if tst_min == 0.0 {
        return 0.0;
    }
    let changes = stages.windows(2).filter(|w| w[0].class3() != w[1].class3()).count() as f64;
    changes / tst_min
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(spec: &str) -> Vec<SleepStage> {
        spec.split_whitespace().map(|c| SleepStage::from_code(c).unwrap()).collect()
    }

    #[test]
    fn adjacency_counts_interleaved_transitions() {
        let s = stages("W W N1 N2 N2 N3 N3 R R W N2 N2 N3 R W");
        let counts = adjacency_5class(&s);
        assert_eq!(counts[&(SleepStage::Wake, SleepStage::N1)], 1);
        assert_eq!(counts[&(SleepStage::N1, SleepStage::N2)], 1);
        assert_eq!(counts[&(SleepStage::N2, SleepStage::N3)], 2);
        assert_eq!(counts[&(SleepStage::N3, SleepStage::Rem)], 2);
        assert_eq!(counts[&(SleepStage::Rem, SleepStage::Wake)], 2);
        assert_eq!(counts[&(SleepStage::Wake, SleepStage::N2)], 1);
    }

    #[test]
    fn sfi_is_zero_without_sleep() {
        let s = vec![SleepStage::Wake; 5];
        assert_eq!(sleep_fragmentation_and_transition_index(&s, 0.5), (0.0, 0.0));
    }
}
