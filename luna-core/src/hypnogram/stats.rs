//! Sleep-architecture statistics: per-class totals, key landmarks, the
//! derived time quantities (TIB/TRT/TST/WASO/SOL/.../SE/SME), N2
//! ascending/descending/flat subclassification, and contiguous-run bouts.

use super::SleepStage;

#[derive(Debug, Clone, Default)]
pub struct ClassTotals {
    pub wake_min: f64,
    pub n1_min: f64,
    pub n2_min: f64,
    pub n3_min: f64,
    pub n4_min: f64,
    pub rem_min: f64,
    pub lights_on_min: f64,
    pub unknown_min: f64,
    pub gap_min: f64,
}

impl ClassTotals {
    #[must_use]
    pub fn nrem_min(&self) -> f64 {
        self.n1_min + self.n2_min + self.n3_min + self.n4_min
    }

    #[must_use]
    pub fn sleep_min(&self) -> f64 {
        self.nrem_min() + self.rem_min
    }
}

#[must_use]
pub fn class_totals(stages: &[SleepStage], epoch_min: f64) -> ClassTotals {
    let mut t = ClassTotals::default();
    for s in stages {
        match s {
            SleepStage::Wake => t.wake_min += epoch_min,
            SleepStage::N1 => t.n1_min += epoch_min,
            SleepStage::N2 => t.n2_min += epoch_min,
            SleepStage::N3 => t.n3_min += epoch_min,
            SleepStage::N4 => t.n4_min += epoch_min,
            SleepStage::Rem => t.rem_min += epoch_min,
            SleepStage::LightsOn => t.lights_on_min += epoch_min,
            SleepStage::Unknown | SleepStage::Unscored => t.unknown_min += epoch_min,
            SleepStage::Gap => t.gap_min += epoch_min,
            SleepStage::Movement | SleepStage::Artifact => {}
        }
    }
    t
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum N2Trend {
    Ascending,
    Descending,
    Flat,
}

/// Symmetric +/-10-epoch weighted N2 ascending/descending/flat
/// classification. Left window: +1 per N3, -1 per {N1, R, W}; right window
/// inverts; the mean (normalized by window count) is `n2_ascdesc`.
#[must_use]
pub fn n2_asc_desc(stages: &[SleepStage], window: usize, threshold: f64) -> Vec<Option<N2Trend>> {
    let n = stages.len();
    let score = |s: SleepStage| -> f64 {
        match s {
            SleepStage::N3 | SleepStage::N4 => 1.0,
            SleepStage::N1 | SleepStage::Rem | SleepStage::Wake => -1.0,
            _ => 0.0,
        }
    };

    (0..n)
        .map(|i| {
            if stages[i] != SleepStage::N2 {
                return None;
            }
            let lo = i.saturating_sub(window);
            let hi = (i + window + 1).min(n);
            let left: f64 = stages[lo..i].iter().map(|s| score(*s)).sum();
            let right: f64 = stages[i + 1..hi].iter().map(|s| score(*s)).sum();
            let left_n = (i - lo).max(1) as f64;
            let right_n = (hi - i - 1).max(1) as f64;
            let value = (left / left_n - right / right_n) / 2.0;
            Some(if value > threshold {
                N2Trend::Ascending
            } else if value < -threshold {
                N2Trend::Descending
            } else {
                N2Trend::Flat
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Landmarks {
    pub lights_out_epoch: Option<usize>,
    pub first_sleep_epoch: Option<usize>,
    pub first_persistent_sleep_epoch: Option<usize>,
    pub final_wake_epoch: Option<usize>,
    pub lights_on_epoch: Option<usize>,
}

/// `first_persistent_sleep_epoch`: the first epoch initiating at least
/// `persistent_min` minutes of continuous sleep.
#[must_use]
pub fn landmarks(stages: &[SleepStage], epoch_min: f64, persistent_min: f64) -> Landmarks {
    let n = stages.len();
    let lights_out_epoch = stages.iter().position(|s| !matches!(s, SleepStage::LightsOn));
    let first_sleep_epoch = stages.iter().position(|s| s.is_sleep());
    let lights_on_epoch = stages.iter().rposition(|s| !matches!(s, SleepStage::LightsOn)).map(|i| i + 1).filter(|&i| i <= n);
    let final_wake_epoch = stages.iter().rposition(|s| s.is_sleep()).map(|i| i + 1).filter(|&i| i <= n);

    let need_epochs = (persistent_min / epoch_min).ceil() as usize;
    let first_persistent_sleep_epoch = (0..n).find(|&i| {
        stages[i].is_sleep() && {
            let hi = (i + need_epochs).min(n);
            hi - i >= need_epochs && stages[i..hi].iter().all(|s| s.is_sleep())
        }
    });

    Landmarks {
        lights_out_epoch,
        first_sleep_epoch,
        first_persistent_sleep_epoch,
        final_wake_epoch,
        lights_on_epoch,
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimeSummary {
    pub tib_min: f64,
    pub trt_min: f64,
    pub twt_min: f64,
    pub tst_min: f64,
    pub tp_st_min: f64,
    pub waso_min: f64,
    pub sol_min: f64,
    pub lps_min: f64,
    pub se_pct: f64,
    pub sme_pct: f64,
    pub rem_latency_min: f64,
    pub rem_latency_no_wake_min: f64,
    pub midpoint_epoch: Option<f64>,
}

#[must_use]
pub fn time_summary(stages: &[SleepStage], epoch_min: f64, lm: &Landmarks) -> TimeSummary {
    let n = stages.len();
    let tib_min = n as f64 * epoch_min;

    let Some(lights_out) = lm.lights_out_epoch else {
        return TimeSummary { tib_min, ..Default::default() };
    };
    let lights_on = lm.lights_on_epoch.unwrap_or(n);
    let trt_min = (lights_on.saturating_sub(lights_out)) as f64 * epoch_min;

    let span = &stages[lights_out..lights_on.min(n)];
    let tst_min = span.iter().filter(|s| s.is_sleep()).count() as f64 * epoch_min;
    let twt_min = span.iter().filter(|s| s.is_wake()).count() as f64 * epoch_min;

    let sol_min = lm.first_sleep_epoch.map(|e| (e.saturating_sub(lights_out)) as f64 * epoch_min).unwrap_or(trt_min);
    let lps_min = lm
        .first_persistent_sleep_epoch
        .map(|e| (e.saturating_sub(lights_out)) as f64 * epoch_min)
        .unwrap_or(trt_min);

    let tp_st_min = lm
        .first_persistent_sleep_epoch
        .zip(lm.final_wake_epoch)
        .map(|(a, b)| span[a.saturating_sub(lights_out)..(b.saturating_sub(lights_out)).min(span.len())].iter().filter(|s| s.is_sleep()).count() as f64 * epoch_min)
        .unwrap_or(0.0);

    let waso_min = lm
        .first_sleep_epoch
        .zip(lm.final_wake_epoch)
        .map(|(a, b)| {
            let a = a.saturating_sub(lights_out);
            let b = b.saturating_sub(lights_out).min(span.len());
            span.get(a..b).map(|w| w.iter().filter(|s| s.is_wake()).count()).unwrap_or(0) as f64 * epoch_min
        })
        .unwrap_or(0.0);

    let rem_onset = stages.iter().position(|s| *s == SleepStage::Rem);
    let rem_latency_min = rem_onset.map(|e| (e.saturating_sub(lights_out)) as f64 * epoch_min).unwrap_or(0.0);
    let rem_latency_no_wake_min = rem_onset
        .map(|e| stages[lights_out..e.min(n)].iter().filter(|s| s.is_sleep()).count() as f64 * epoch_min)
        .unwrap_or(0.0);

    let se_pct = if trt_min > 0.0 { 100.0 * tst_min / trt_min } else { 0.0 };
    let spt_min = lm
        .first_sleep_epoch
        .zip(lm.final_wake_epoch)
        .map(|(a, b)| (b.saturating_sub(a)) as f64 * epoch_min)
        .unwrap_or(0.0);
    let sme_pct = if spt_min > 0.0 { 100.0 * tst_min / spt_min } else { 0.0 };

    let midpoint_epoch = lm.first_sleep_epoch.zip(lm.final_wake_epoch).map(|(a, b)| (a + b) as f64 / 2.0);

    TimeSummary {
        tib_min,
        trt_min,
        twt_min,
        tst_min,
        tp_st_min,
        waso_min,
        sol_min,
        lps_min,
        se_pct,
        sme_pct,
        rem_latency_min,
        rem_latency_no_wake_min,
        midpoint_epoch,
    }
}

#[derive(Debug, Clone)]
pub struct Bout {
    pub stage: SleepStage,
    pub start_epoch: usize,
    pub len_epochs: usize,
}

/// Maximal contiguous runs of identical stage, in epoch order.
#[must_use]
pub fn bouts(stages: &[SleepStage]) -> Vec<Bout> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < stages.len() {
        let start = i;
        let stage = stages[i];
        while i < stages.len() && stages[i] == stage {
            i += 1;
        }
        out.push(Bout { stage, start_epoch: start, len_epochs: i - start });
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct BoutStats {
    pub count: usize,
    pub mean_min: f64,
    pub median_min: f64,
    pub max_min: f64,
    pub min_in_bouts_ge5: f64,
    pub min_in_bouts_ge10: f64,
}

#[must_use]
pub fn bout_stats_for(bouts: &[Bout], stage: SleepStage, epoch_min: f64) -> BoutStats {
    let mut durations: Vec<f64> = bouts.iter().filter(|b| b.stage == stage).map(|b| b.len_epochs as f64 * epoch_min).collect();
    if durations.is_empty() {
        return BoutStats::default();
    }
    durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let count = durations.len();
    let mean_min = durations.iter().sum::<f64>() / count as f64;
    let median_min = if count % 2 == 0 { (durations[count / 2 - 1] + durations[count / 2]) / 2.0 } else { durations[count / 2] };
    let max_min = durations[count - 1];
    let min_in_bouts_ge5 = durations.iter().filter(|&&d| d >= 5.0).sum();
    let min_in_bouts_ge10 = durations.iter().filter(|&&d| d >= 10.0).sum();
    BoutStats { count, mean_min, median_min, max_min, min_in_bouts_ge5, min_in_bouts_ge10 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(spec: &str) -> Vec<SleepStage> {
        spec.split_whitespace().map(|c| SleepStage::from_code(c).unwrap()).collect()
    }

    #[test]
    fn bouts_split_on_stage_change() {
        let s = stages("W W N1 N2 N2 N3 N3 R R W N2 N2 N3 R W");
        let b = bouts(&s);
        let lens: Vec<(SleepStage, usize)> = b.iter().map(|x| (x.stage, x.len_epochs)).collect();
        assert_eq!(
            lens,
            vec![
                (SleepStage::Wake, 2),
                (SleepStage::N1, 1),
                (SleepStage::N2, 2),
                (SleepStage::N3, 2),
                (SleepStage::Rem, 2),
                (SleepStage::Wake, 1),
                (SleepStage::N2, 2),
                (SleepStage::N3, 1),
                (SleepStage::Rem, 1),
                (SleepStage::Wake, 1),
            ]
        );
    }

    #[test]
    fn class_totals_sum_to_tib() {
        let s = stages("W W N1 N2 N2 N3 N3 R R W");
        let t = class_totals(&s, 0.5);
        let total = t.wake_min + t.nrem_min() + t.rem_min + t.lights_on_min + t.unknown_min + t.gap_min;
        assert!((total - s.len() as f64 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn sol_and_waso_for_bracketed_wake_and_sleep() {
        let mut s = vec![SleepStage::Wake; 10];
        for i in 0..40 {
            s.push(if i % 2 == 0 { SleepStage::N2 } else { SleepStage::Rem });
        }
        s.extend(vec![SleepStage::Wake; 10]);
        let lm = landmarks(&s, 0.5, 10.0);
        let t = time_summary(&s, 0.5, &lm);
        assert!((t.sol_min - 5.0).abs() < 1e-9);
        assert!((t.tst_min - 20.0).abs() < 1e-9);
        assert!((t.waso_min).abs() < 1e-9);
    }
}
