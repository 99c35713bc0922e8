//! The `hypno` command: applies the hypnogram edits (section 4.5) to a
//! scored stage vector in the fixed order the analyzer uses, then emits
//! architecture statistics, cycles, transitions, flanking counters, and LZW
//! complexity through a [`ResultSink`].

use color_eyre::eyre::{eyre, Context, Result};
use luna_core::clock::ClockTime;
use luna_core::hypnogram::density::{slide, Anchor, AnchorEpochs, SlideSpec};
use luna_core::hypnogram::edits::{self, CutParams};
use luna_core::hypnogram::stats::{self, N2Trend};
use luna_core::hypnogram::{cycles, flanking, lzw, transitions, SleepStage};
use luna_core::interfaces::ResultSink;

use crate::config::LunaCliConfig;
use crate::params::ParamList;

/// Parses `lights-off=HH:MM:SS` or `lights-off=<seconds>` into an epoch
/// index, relative to recording start (epoch 0).
fn epoch_from_time_param(params: &ParamList, key: &str, epoch_sec: f64) -> Result<Option<usize>> {
    let Some(raw) = params.raw(key) else { return Ok(None) };
    let Some(s) = raw.first() else { return Ok(None) };
    let seconds = if let Some(ct) = ClockTime::parse(s) {
        ct.hours() * 3600.0
    } else {
        s.parse::<f64>().map_err(|e| eyre!("parameter '{key}' is not a clock or seconds value: {e}"))?
    };
    Ok(Some((seconds / epoch_sec).round().max(0.0) as usize))
}

/// Runs the full hypnogram pipeline over `stages` and writes results into
/// `sink`. `stages` is mutated in place by the edit pipeline, matching the
/// original's "edits demote, never remove" invariant.
pub fn run(stages: &mut Vec<SleepStage>, epoch_sec: f64, params: &ParamList, cfg: &LunaCliConfig, sink: &mut dyn ResultSink) -> Result<()> {
    let epoch_min = epoch_sec / 60.0;

    // 1. lights-off / lights-on.
    let lights_off = epoch_from_time_param(params, "lights-off", epoch_sec)?;
    let lights_on = epoch_from_time_param(params, "lights-on", epoch_sec)?;
    let reclassified = edits::apply_lights(stages, lights_off, lights_on);
    if reclassified > 0 {
        tracing::debug!(reclassified, "lights-off/on reclassified sleep epochs");
    }

    // 2. optional cut.
    if params.has("cut") {
        let v = params.floats("cut").context("parsing 'cut'")?;
        let cut = match v.as_slice() {
            [th, fac, gap, flank] => CutParams { threshold: *th, wake_penalty_factor: *fac, gap_epochs: *gap as usize, flank_epochs: *flank as usize },
            _ => cfg.hypnogram.cut,
        };
        edits::apply_cut(stages, cut);
    }

    // 3. end-wake / end-sleep.
    if params.has("end-wake") || params.has("end-sleep") {
        let end_wake = params.float("end-wake").unwrap_or(0.0);
        let end_sleep = params.float("end-sleep").unwrap_or(0.0);
        edits::apply_end_wake_end_sleep(stages, end_wake, end_sleep, epoch_min);
    }

    // 4. trim-(leading|trailing)-wake / trim-wake.
    if params.has("trim-wake") || params.has("trim-leading-wake") || params.has("trim-trailing-wake") {
        if let Ok(k) = params.int("trim-wake") {
            edits::trim_leading_trailing_wake(stages, k as usize, true, true);
        }
        if let Ok(k) = params.int("trim-leading-wake") {
            edits::trim_leading_trailing_wake(stages, k as usize, true, false);
        }
        if let Ok(k) = params.int("trim-trailing-wake") {
            edits::trim_leading_trailing_wake(stages, k as usize, false, true);
        }
    }

    // 5. leading/trailing Unknown -> LightsOn.
    edits::unknown_margins_to_lights_on(stages);

    // 6. first / last window, anchored at T0 (recording start) / T6 (end).
    if let Ok(mins) = params.float("first") {
        let duration_epochs = (mins / epoch_min).round() as usize;
        if edits::constrain_window(stages, 0, duration_epochs, false) {
            tracing::warn!("first= window exceeds available staging: constrain_too_short");
        }
    }
    if let Ok(mins) = params.float("last") {
        let duration_epochs = (mins / epoch_min).round() as usize;
        if edits::constrain_window(stages, stages.len(), duration_epochs, true) {
            tracing::warn!("last= window exceeds available staging: constrain_too_short");
        }
    }

    // Statistics.
    let totals = stats::class_totals(stages, epoch_min);
    let landmarks = stats::landmarks(stages, epoch_min, cfg.hypnogram.persistent_sleep_min);
    let time = stats::time_summary(stages, epoch_min, &landmarks);

    sink.stratify(&[]);
    sink.value("TIB", totals.wake_min + totals.nrem_min() + totals.rem_min + totals.lights_on_min + totals.unknown_min + totals.gap_min);
    sink.value("WAKE_MIN", totals.wake_min);
    sink.value("NREM_MIN", totals.nrem_min());
    sink.value("REM_MIN", totals.rem_min);
    sink.value("TRT", time.trt_min);
    sink.value("TST", time.tst_min);
    sink.value("TWT", time.twt_min);
    sink.value("WASO", time.waso_min);
    sink.value("SOL", time.sol_min);
    sink.value("LPS", time.lps_min);
    sink.value("SE", time.se_pct);
    sink.value("SME", time.sme_pct);
    sink.value("REM_LAT", time.rem_latency_min);
    sink.value("REM_LAT_NOWAKE", time.rem_latency_no_wake_min);

    // N2 ascending/descending/flat.
    let n2_threshold = params.float("n2-asc-desc-th").unwrap_or(cfg.hypnogram.n2.threshold);
    if params.has("n2-asc-desc") || params.has("n2-asc-desc-th") {
        let trend = stats::n2_asc_desc(stages, cfg.hypnogram.n2.window_epochs, n2_threshold);
        let (mut asc, mut dsc, mut flt) = (0u64, 0u64, 0u64);
        for t in trend.iter().flatten() {
            match t {
                N2Trend::Ascending => asc += 1,
                N2Trend::Descending => dsc += 1,
                N2Trend::Flat => flt += 1,
            }
        }
        sink.value("N2_ASC", asc as f64);
        sink.value("N2_DSC", dsc as f64);
        sink.value("N2_FLT", flt as f64);
    }

    // Bouts.
    let bout_list = stats::bouts(stages);
    for stage in [SleepStage::Wake, SleepStage::N1, SleepStage::N2, SleepStage::N3, SleepStage::Rem] {
        let bs = stats::bout_stats_for(&bout_list, stage, epoch_min);
        sink.stratify(&[("STAGE", stage.code())]);
        sink.value("NBOUTS", bs.count as f64);
        sink.value("BOUT_MEAN", bs.mean_min);
        sink.value("BOUT_MEDIAN", bs.median_min);
        sink.value("BOUT_MAX", bs.max_min);
    }
    sink.stratify(&[]);

    // Sleep cycles.
    let cycle_analysis = cycles::analyze(stages, epoch_min, cfg.hypnogram.cycles);
    sink.value("NCYCLES", cycle_analysis.cycles.len() as f64);
    for (i, cyc) in cycle_analysis.cycles.iter().enumerate() {
        sink.stratify(&[("CYCLE", &(i + 1).to_string())]);
        sink.value("CYCLE_DUR", cyc.duration_min(epoch_min));
        sink.value("CYCLE_NREM", cyc.nrem_min);
        sink.value("CYCLE_REM", cyc.rem_min);
    }
    sink.stratify(&[]);

    // Transitions.
    let (sfi, sti) = transitions::sleep_fragmentation_and_transition_index(stages, epoch_min);
    let ti3 = transitions::transition_index_3class(stages, epoch_min);
    sink.value("SFI", sfi);
    sink.value("STI", sti);
    sink.value("TI3", ti3);

    // Flanking / nearest-transition counters (summarized as means).
    let flank = flanking::analyze(stages);
    let mean = |v: &[usize]| if v.is_empty() { 0.0 } else { v.iter().sum::<usize>() as f64 / v.len() as f64 };
    sink.value("FLANKING_SIM_MEAN", mean(&flank.flanking_sim));

    // LZW complexity.
    let lzw5 = lzw::complexity_5class(stages);
    let lzw3 = lzw::complexity_3class(stages);
    sink.value("LZW5_NORM", lzw5.normalized);
    sink.value("LZW3_NORM", lzw3.normalized);

    // Sliding-window density, if requested.
    if params.has("slide") {
        run_slide(stages, epoch_min, &landmarks, params, sink)?;
    }

    if params.has("gaps") {
        tracing::debug!("gaps=1: discontinuous-recording epoch exclusion is the timeline's responsibility, not the hypnogram pipeline");
    }

    Ok(())
}

fn run_slide(stages: &[SleepStage], epoch_min: f64, landmarks: &stats::Landmarks, params: &ParamList, sink: &mut dyn ResultSink) -> Result<()> {
    let n = stages.len();
    let anchors = AnchorEpochs {
        t0: 0,
        t1: landmarks.lights_out_epoch,
        t2: landmarks.first_sleep_epoch,
        t3: landmarks.first_sleep_epoch.zip(landmarks.final_wake_epoch).map(|(a, b)| (a + b) / 2),
        t4: landmarks.final_wake_epoch,
        t5: landmarks.lights_on_epoch,
        t6: n.saturating_sub(1),
    };

    let slide_vals = params.floats("slide").context("parsing 'slide'")?;
    let width = *slide_vals.first().unwrap_or(&20.0);
    let increment = *slide_vals.get(1).unwrap_or(&width);
    let anchor = match params.raw("slide-anchor").and_then(|v| v.first()).map(String::as_str).unwrap_or("T0") {
        "T1" => Anchor::T1,
        "T2" => Anchor::T2,
        "T3" => Anchor::T3,
        "T4" => Anchor::T4,
        "T5" => Anchor::T5,
        "T6" => Anchor::T6,
        _ => Anchor::T0,
    };
    let spec = SlideSpec { width_epochs: width as usize, increment_epochs: increment as usize, anchor };
    let windows = slide(stages, &anchors, spec, &[SleepStage::Wake, SleepStage::Rem]);
    for (i, w) in windows.iter().enumerate() {
        sink.stratify(&[("WIN", &(i + 1).to_string())]);
        sink.value("WIN_START", w.start_epoch as f64 * epoch_min);
        sink.value("WIN_END", w.end_epoch as f64 * epoch_min);
        if let Some(wake_density) = w.density.first() {
            sink.value("WIN_WAKE_DENSITY", *wake_density);
        }
        if let Some(rem_density) = w.density.get(1) {
            sink.value("WIN_REM_DENSITY", *rem_density);
        }
    }
    sink.stratify(&[]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::StdoutSink;

    fn stages(spec: &str) -> Vec<SleepStage> {
        spec.split_whitespace().map(|c| SleepStage::from_code(c).unwrap()).collect()
    }

    #[test]
    fn runs_end_to_end_without_params() {
        let mut s = stages("W W N1 N2 N2 N3 N3 R R W N2 N2 N3 R W");
        let cfg = LunaCliConfig::default();
        let params = ParamList::parse("").unwrap();
        let mut sink = StdoutSink::new();
        run(&mut s, 30.0, &params, &cfg, &mut sink).unwrap();
    }

    #[test]
    fn lights_off_param_as_seconds_reclassifies() {
        let mut s = stages("W W N1 N2 N2 W");
        let cfg = LunaCliConfig::default();
        let params = ParamList::parse("lights-off=60").unwrap();
        let mut sink = StdoutSink::new();
        run(&mut s, 30.0, &params, &cfg, &mut sink).unwrap();
        assert_eq!(s[0], SleepStage::LightsOn);
        assert_eq!(s[1], SleepStage::LightsOn);
    }

    #[test]
    fn cut_param_overrides_config_defaults() {
        let mut s = stages(&"W ".repeat(20).trim().to_string());
        let mut long = stages(&"N2 ".repeat(60));
        s.append(&mut long);
        s.extend(stages(&"W ".repeat(20)));
        let cfg = LunaCliConfig::default();
        let params = ParamList::parse("cut=50,3,10,10").unwrap();
        let mut sink = StdoutSink::new();
        run(&mut s, 30.0, &params, &cfg, &mut sink).unwrap();
    }
}
