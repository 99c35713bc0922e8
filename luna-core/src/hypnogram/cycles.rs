//! Feinberg-Floyd (modified) sleep cycle definition: NREM period minimum
//! 15 min, REM period minimum 5 min (from the second cycle on), 15-minute
//! interruption tolerance, 15-minute terminating WASO, 10-minute persistent
//! sleep onset.

use serde::{Deserialize, Serialize};

use super::SleepStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepPeriod {
    Nrem,
    Rem,
    None,
}

#[derive(Debug, Clone)]
pub struct Cycle {
    pub start_epoch: usize,
    pub end_epoch: usize,
    pub nrem_min: f64,
    pub rem_min: f64,
}

impl Cycle {
    #[must_use]
    pub fn duration_min(&self, epoch_min: f64) -> f64 {
        (self.end_epoch - self.start_epoch) as f64 * epoch_min
    }
}

#[derive(Debug, Clone)]
pub struct CycleAnalysis {
    /// Per-epoch 3-label sleep-period field.
    pub sleep_period: Vec<SleepPeriod>,
    /// Per-epoch terminating-WASO flag.
    pub cycle_ending_waso: Vec<bool>,
    /// Per-epoch 1-based cycle number, `0` if not assigned to any cycle.
    pub cycle_number: Vec<usize>,
    pub cycles: Vec<Cycle>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CycleParams {
    pub nrem_min_min: f64,
    pub rem_min_min: f64,
    pub interruption_tolerance_min: f64,
    pub terminating_waso_min: f64,
}

impl Default for CycleParams {
    fn default() -> Self {
        Self { nrem_min_min: 15.0, rem_min_min: 5.0, interruption_tolerance_min: 15.0, terminating_waso_min: 15.0 }
    }
}

/// Classify each epoch's sleep period (NREM/REM/none), identify
/// cycle-terminating WASO runs, and cut the edited stage vector into
/// Feinberg-Floyd cycles. A new cycle starts once a NREM run of at least
/// `nrem_min_min` precedes the next REM period or a terminating WASO run;
/// REM periods shorter than `rem_min_min` after the first cycle do not
/// themselves start a new cycle but still count toward the current one.
#[must_use]
pub fn analyze(stages: &[SleepStage], epoch_min: f64, params: CycleParams) -> CycleAnalysis {
    let n = stages.len();
    let nrem_min_epochs = (params.nrem_min_min / epoch_min).ceil() as usize;
    let waso_epochs = (params.terminating_waso_min / epoch_min).ceil() as usize;

    let mut sleep_period = vec![SleepPeriod::None; n];
    let mut cycle_ending_waso = vec![false; n];

    // Mark maximal runs of identical class as NREM/REM periods directly;
    // wake runs of at least `waso_epochs` are cycle-terminating.
    let mut i = 0;
    while i < n {
        let start = i;
        let is_nrem = stages[i].is_nrem();
        let is_rem = stages[i].is_rem();
        let is_wake = stages[i].is_wake();
        while i < n && (stages[i].is_nrem() == is_nrem && stages[i].is_rem() == is_rem && stages[i].is_wake() == is_wake) {
            i += 1;
        }
        let run_len = i - start;
        if is_nrem {
            for p in &mut sleep_period[start..i] {
                *p = SleepPeriod::Nrem;
            }
        } else if is_rem {
            for p in &mut sleep_period[start..i] {
                *p = SleepPeriod::Rem;
            }
        } else if is_wake && run_len >= waso_epochs {
            for f in &mut cycle_ending_waso[start..i] {
                *f = true;
            }
        }
    }

    let mut cycles: Vec<Cycle> = Vec::new();
    let mut cycle_number = vec![0usize; n];
    let mut cursor = 0usize;

    while cursor < n {
        // Find the next NREM run of sufficient length to start a cycle.
        let Some(nrem_start) = (cursor..n).find(|&k| {
            sleep_period[k] == SleepPeriod::Nrem && {
                let mut end = k;
                while end < n && sleep_period[end] == SleepPeriod::Nrem {
                    end += 1;
                }
                end - k >= nrem_min_epochs
            }
        }) else {
            break;
        };

        // Extend the cycle until a terminating WASO or the next
        // sufficiently long NREM run begins a fresh cycle.
        let mut end = nrem_start;
        while end < n && !cycle_ending_waso[end] {
            // Stop if we've hit a *later* NREM run long enough to be its
            // own cycle start and we've already accumulated a REM period.
            if end > nrem_start && sleep_period[end] == SleepPeriod::Nrem {
                let mut look = end;
                while look < n && sleep_period[look] == SleepPeriod::Nrem {
                    look += 1;
                }
                let seen_rem = sleep_period[nrem_start..end].iter().any(|p| *p == SleepPeriod::Rem);
                if seen_rem && look - end >= nrem_min_epochs {
                    break;
                }
            }
            end += 1;
        }

        let nrem_count = sleep_period[nrem_start..end].iter().filter(|p| **p == SleepPeriod::Nrem).count();
        let rem_count = sleep_period[nrem_start..end].iter().filter(|p| **p == SleepPeriod::Rem).count();
        let cn = cycles.len() + 1;
        for c in &mut cycle_number[nrem_start..end] {
            *c = cn;
        }
        cycles.push(Cycle {
            start_epoch: nrem_start,
            end_epoch: end,
            nrem_min: nrem_count as f64 * epoch_min,
            rem_min: rem_count as f64 * epoch_min,
        });
        cursor = end;
    }

    CycleAnalysis { sleep_period, cycle_ending_waso, cycle_number, cycles }
}

/// Relative (0..1 fraction of cycle duration) and absolute (elapsed
/// minutes since cycle start) position for epoch `e` within its cycle, or
/// `None` if `e` is not assigned to any cycle.
#[must_use]
pub fn cycle_position(analysis: &CycleAnalysis, epoch: usize, epoch_min: f64) -> Option<(f64, f64)> {
    let cn = *analysis.cycle_number.get(epoch)?;
    if cn == 0 {
        return None;
    }
    let cycle = &analysis.cycles[cn - 1];
    let elapsed = (epoch - cycle.start_epoch) as f64 * epoch_min;
    let total = cycle.duration_min(epoch_min);
    let rel = if total > 0.0 { elapsed / total } else { 0.0 };
    Some((rel, elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(spec: &str) -> Vec<SleepStage> {
        spec.split_whitespace().map(|c| SleepStage::from_code(c).unwrap()).collect()
    }

    #[test]
    fn single_long_nrem_run_starts_a_cycle() {
        let mut s = vec![SleepStage::Wake; 4];
        s.extend(vec![SleepStage::N2; 40]);
        s.extend(vec![SleepStage::Rem; 12]);
        let s = s;
        let analysis = analyze(&s, 0.5, CycleParams::default());
        assert_eq!(analysis.cycles.len(), 1);
        assert_eq!(analysis.cycles[0].start_epoch, 4);
    }

    #[test]
    fn coverage_every_sleep_epoch_has_a_cycle_number() {
        let s = stages(
            "W W W W N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 N2 R R R R R R R R R R R R",
        );
        let analysis = analyze(&s, 0.5, CycleParams::default());
        for (i, stage) in s.iter().enumerate() {
            if stage.is_sleep() {
                assert!(analysis.cycle_number[i] >= 1, "epoch {i} has no cycle");
            }
        }
    }

    #[test]
    fn cycle_position_is_in_unit_interval() {
        let mut s = vec![SleepStage::Wake; 4];
        s.extend(vec![SleepStage::N2; 40]);
        let analysis = analyze(&s, 0.5, CycleParams::default());
        let (rel, abs) = cycle_position(&analysis, 20, 0.5).unwrap();
        assert!((0.0..=1.0).contains(&rel));
        assert!(abs >= 0.0);
    }
}
