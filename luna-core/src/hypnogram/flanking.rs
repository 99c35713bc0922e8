//! Per-epoch flanking-run and nearest-transition counters, named after the
//! original engine's derived-annotation columns: `flanking_sim`,
//! `nearest_wake`, `nearest_rem`, `nearest_nrem`, and their `*_total`
//! homogeneous-run-length counterparts.

use super::SleepStage;

#[derive(Debug, Clone)]
pub struct FlankingStats {
    /// Number of epochs on each side identical to the current epoch's
    /// stage (not counting the epoch itself).
    pub flanking_sim: Vec<usize>,
    /// Length of the maximal homogeneous run the epoch belongs to.
    pub flanking_sim_total: Vec<usize>,
    /// Forward distance (in epochs) to the next epoch scored Wake, or
    /// `None` if there is none.
    pub nearest_wake: Vec<Option<usize>>,
    pub nearest_wake_total: Vec<usize>,
    /// Forward distance to the next epoch scored REM.
    pub nearest_rem: Vec<Option<usize>>,
    pub nearest_rem_total: Vec<usize>,
    /// Forward distance to the next epoch scored NREM.
    pub nearest_nrem: Vec<Option<usize>>,
    pub nearest_nrem_total: Vec<usize>,
}

#[must_use]
pub fn analyze(stages: &[SleepStage]) -> FlankingStats {
    let n = stages.len();

    let mut flanking_sim = vec![0usize; n];
    let mut flanking_sim_total = vec![0usize; n];
    let mut i = 0;
    while i < n {
        let start = i;
        while i < n && stages[i] == stages[start] {
            i += 1;
        }
        let run_len = i - start;
        for (k, idx) in (start..i).enumerate() {
            flanking_sim[idx] = run_len.saturating_sub(1);
            flanking_sim_total[idx] = run_len;
            let _ = k;
        }
    }

    let nearest_wake = nearest_forward(stages, SleepStage::is_wake);
    let nearest_rem = nearest_forward(stages, SleepStage::is_rem);
    let nearest_nrem = nearest_forward(stages, SleepStage::is_nrem);

    let nearest_wake_total = total_to_next(stages, SleepStage::is_wake);
    let nearest_rem_total = total_to_next(stages, SleepStage::is_rem);
    let nearest_nrem_total = total_to_next(stages, SleepStage::is_nrem);

    FlankingStats {
        flanking_sim,
        flanking_sim_total,
        nearest_wake,
        nearest_wake_total,
        nearest_rem,
        nearest_rem_total,
        nearest_nrem,
        nearest_nrem_total,
    }
}

/// For each epoch, the forward distance (in epochs) to the next epoch
/// satisfying `pred`, `0` if the epoch itself satisfies it.
fn nearest_forward(stages: &[SleepStage], pred: impl Fn(SleepStage) -> bool) -> Vec<Option<usize>> {
    let n = stages.len();
    let mut out = vec![None; n];
    let mut next_hit: Option<usize> = None;
    for i in (0..n).rev() {
        if pred(stages[i]) {
            next_hit = Some(i);
        }
        out[i] = next_hit.map(|h| h - i);
    }
    out
}

/// Current homogeneous block's length with respect to `pred`'s class
/// boundary (i.e. the run length of `pred(stage) == pred(stages[i])`).
fn total_to_next(stages: &[SleepStage], pred: impl Fn(SleepStage) -> bool) -> Vec<usize> {
    let n = stages.len();
    let mut out = vec![0usize; n];
    let mut i = 0;
    while i < n {
        let start = i;
        let want = pred(stages[i]);
        while i < n && pred(stages[i]) == want {
            i += 1;
        }
        for v in &mut out[start..i] {
            *v = i - start;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(spec: &str) -> Vec<SleepStage> {
        spec.split_whitespace().map(|c| SleepStage::from_code(c).unwrap()).collect()
    }

    #[test]
    fn flanking_sim_counts_run_membership() {
        let s = stages("W W W N2 N2 R");
        let f = analyze(&s);
        assert_eq!(f.flanking_sim_total[0], 3);
        assert_eq!(f.flanking_sim[0], 2);
        assert_eq!(f.flanking_sim_total[3], 2);
    }

    #[test]
    fn nearest_rem_counts_forward_distance() {
        let s = stages("W N2 N2 R W");
        let f = analyze(&s);
        assert_eq!(f.nearest_rem[0], Some(3));
        assert_eq!(f.nearest_rem[3], Some(0));
        assert_eq!(f.nearest_rem[4], None);
    }
}
