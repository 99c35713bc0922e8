//! Derived-annotation emission: turns the statistics computed elsewhere in
//! this tree (cycles, bouts, landmarks, N2 trend) into epoch-anchored
//! [`Annotation`] instances a caller can merge into an [`AnnotationSet`] for
//! downstream stratified output, exactly as the original engine's optional
//! `HYPNO` derived-signal columns do.

use crate::annotation::AnnotationSet;
use crate::clock::{ClockTime, Interval, Tick};

use super::cycles::CycleAnalysis;
use super::stats::{bouts, Landmarks, N2Trend};
use super::{Class3, SleepStage};

#[must_use]
fn epoch_interval(epoch: usize, epoch_sec: f64) -> Interval {
    let start = Tick::from_seconds(epoch as f64 * epoch_sec);
    let stop = Tick::from_seconds((epoch + 1) as f64 * epoch_sec);
    Interval::new(start, stop)
}

/// Emit every optional derived annotation series named for the hypnogram
/// analyzer. `start_clock`, if given, anchors `clock_HH` to wall-clock hour;
/// without it that series is skipped.
pub fn emit(stages: &[SleepStage], epoch_sec: f64, landmarks: &Landmarks, cycles: &CycleAnalysis, n2_trend: &[Option<N2Trend>], start_clock: Option<ClockTime>, out: &mut AnnotationSet) {
    emit_cycle_series(stages, epoch_sec, cycles, out);
    emit_bouts(stages, epoch_sec, out);
    if let Some(clock0) = start_clock {
        emit_clock_hour(stages, epoch_sec, clock0, out);
    }
    emit_elapsed_total(stages, epoch_sec, out);
    emit_elapsed_per_stage(stages, epoch_sec, out);
    emit_landmarks(stages, epoch_sec, landmarks, out);
    emit_epoch_flags(stages, epoch_sec, landmarks, n2_trend, out);
    emit_transitions(stages, epoch_sec, out);
}

/// `n1..nN`, per-cycle quintile `q1..q5`, and 10-minute bin annotations.
fn emit_cycle_series(stages: &[SleepStage], epoch_sec: f64, cycles: &CycleAnalysis, out: &mut AnnotationSet) {
    let epoch_min = epoch_sec / 60.0;
    for (e, &cn) in cycles.cycle_number.iter().enumerate() {
        if cn == 0 {
            continue;
        }
        let iv = epoch_interval(e, epoch_sec);
        out.add("cycle_number").add(format!("n{cn}"), iv, "*");

        let cycle = &cycles.cycles[cn - 1];
        let elapsed = (e - cycle.start_epoch) as f64 * epoch_min;
        let total = cycle.duration_min(epoch_min);
        if total > 0.0 {
            let quintile = (1 + (elapsed / total * 5.0).floor() as i64).clamp(1, 5);
            out.add("cycle_quintile").add(format!("q{quintile}"), iv, "*");
        }
        let bin = 1 + (elapsed / 10.0).floor() as i64;
        out.add("cycle_bin10").add(format!("b{bin}"), iv, "*");
    }
    let _ = stages;
}

/// `bout05_*`/`bout10_*`: per contiguous-run bouts of at least 5/10 minutes.
fn emit_bouts(stages: &[SleepStage], epoch_sec: f64, out: &mut AnnotationSet) {
    let epoch_min = epoch_sec / 60.0;
    for b in bouts(stages) {
        let dur_min = b.len_epochs as f64 * epoch_min;
        let iv = Interval::new(Tick::from_seconds(b.start_epoch as f64 * epoch_sec), Tick::from_seconds((b.start_epoch + b.len_epochs) as f64 * epoch_sec));
        if dur_min >= 5.0 {
            out.add(format!("bout05_{}", b.stage.code())).add("bout", iv, "*");
        }
        if dur_min >= 10.0 {
            out.add(format!("bout10_{}", b.stage.code())).add("bout", iv, "*");
        }
    }
}

/// `clock_HH`: per-epoch wall-clock hour.
fn emit_clock_hour(stages: &[SleepStage], epoch_sec: f64, start: ClockTime, out: &mut AnnotationSet) {
    let ann = out.add("clock_HH");
    for e in 0..stages.len() {
        let iv = epoch_interval(e, epoch_sec);
        let at = start.advance_seconds(e as f64 * epoch_sec);
        ann.add(format!("{:02}", at.h), iv, "*");
    }
}

/// `elapsed_T_h1..`: hour-of-recording bin from the first epoch.
fn emit_elapsed_total(stages: &[SleepStage], epoch_sec: f64, out: &mut AnnotationSet) {
    let ann = out.add("elapsed_T");
    for e in 0..stages.len() {
        let hours = e as f64 * epoch_sec / 3600.0;
        let bin = 1 + hours.floor() as i64;
        ann.add(format!("h{bin}"), epoch_interval(e, epoch_sec), "*");
    }
}

/// `elapsed_N1_h1..` etc: per-stage elapsed-time bins and quintiles, counted
/// over epochs scored in that stage only (not wall-clock time).
fn emit_elapsed_per_stage(stages: &[SleepStage], epoch_sec: f64, out: &mut AnnotationSet) {
    let epoch_min = epoch_sec / 60.0;
    for class in [SleepStage::N1, SleepStage::N2, SleepStage::N3, SleepStage::N4, SleepStage::Rem] {
        let total_epochs = stages.iter().filter(|s| **s == class).count();
        if total_epochs == 0 {
            continue;
        }
        let total_min = total_epochs as f64 * epoch_min;
        let hour_ann_name = format!("elapsed_{}", class.code());
        let quintile_ann_name = format!("elapsed_{}_quintile", class.code());
        let mut seen = 0usize;
        for (e, &s) in stages.iter().enumerate() {
            if s != class {
                continue;
            }
            let iv = epoch_interval(e, epoch_sec);
            let elapsed_min = seen as f64 * epoch_min;
            seen += 1;
            let bin = 1 + (elapsed_min / 60.0).floor() as i64;
            out.add(hour_ann_name.clone()).add(format!("h{bin}"), iv, "*");
            let quintile = (1 + (elapsed_min / total_min * 5.0).floor() as i64).clamp(1, 5);
            out.add(quintile_ann_name.clone()).add(format!("q{quintile}"), iv, "*");
        }
    }
}

/// Point annotations `t0..t6` at the landmark epochs: EDF start, lights-out,
/// sleep onset, sleep midpoint, final wake, lights-on, EDF end.
fn emit_landmarks(stages: &[SleepStage], epoch_sec: f64, landmarks: &Landmarks, out: &mut AnnotationSet) {
    let n = stages.len();
    let ann = out.add("landmark");
    let at = |e: usize| Tick::from_seconds(e as f64 * epoch_sec);

    ann.add("t0", Interval::point(at(0)), "*");
    if let Some(e) = landmarks.lights_out_epoch {
        ann.add("t1", Interval::point(at(e)), "*");
    }
    if let Some(e) = landmarks.first_sleep_epoch {
        ann.add("t2", Interval::point(at(e)), "*");
    }
    if let (Some(a), Some(b)) = (landmarks.first_sleep_epoch, landmarks.final_wake_epoch) {
        let mid = (a + b) / 2;
        ann.add("t3", Interval::point(at(mid)), "*");
    }
    if let Some(e) = landmarks.final_wake_epoch {
        ann.add("t4", Interval::point(at(e)), "*");
    }
    if let Some(e) = landmarks.lights_on_epoch {
        ann.add("t5", Interval::point(at(e)), "*");
    }
    ann.add("t6", Interval::point(at(n)), "*");
}

/// Epoch-level boolean-flag series: `waso`, `pre_sleep_wake`,
/// `post_sleep_wake`, `pre_sleep`, `post_sleep`, `persistent_sleep`,
/// `N2_asc`, `N2_dsc`, `lights`.
fn emit_epoch_flags(stages: &[SleepStage], epoch_sec: f64, landmarks: &Landmarks, n2_trend: &[Option<N2Trend>], out: &mut AnnotationSet) {
    let n = stages.len();
    let first_sleep = landmarks.first_sleep_epoch;
    let final_wake = landmarks.final_wake_epoch;
    let persistent = landmarks.first_persistent_sleep_epoch;

    for e in 0..n {
        let iv = epoch_interval(e, epoch_sec);
        let is_wake = stages[e].is_wake();

        let in_sleep_period = first_sleep.is_some_and(|a| e >= a) && final_wake.is_some_and(|b| e < b);
        if is_wake && in_sleep_period {
            out.add("waso").add("waso", iv, "*");
        }
        if is_wake && first_sleep.is_some_and(|a| e < a) {
            out.add("pre_sleep_wake").add("pre_sleep_wake", iv, "*");
        }
        if is_wake && final_wake.is_some_and(|b| e >= b) {
            out.add("post_sleep_wake").add("post_sleep_wake", iv, "*");
        }
        if first_sleep.is_some_and(|a| e < a) {
            out.add("pre_sleep").add("pre_sleep", iv, "*");
        }
        if final_wake.is_some_and(|b| e >= b) {
            out.add("post_sleep").add("post_sleep", iv, "*");
        }
        if persistent.is_some_and(|p| e >= p) {
            out.add("persistent_sleep").add("persistent_sleep", iv, "*");
        }
        match n2_trend.get(e).copied().flatten() {
            Some(N2Trend::Ascending) => {
                out.add("N2_asc").add("N2_asc", iv, "*");
            }
            Some(N2Trend::Descending) => {
                out.add("N2_dsc").add("N2_dsc", iv, "*");
            }
            _ => {}
        }
        if matches!(stages[e], SleepStage::LightsOn) {
            out.add("lights").add("lights", iv, "*");
        }
    }
}

/// `tr_W_NR` etc: one annotation per 3-class-collapsed stage transition,
/// named `tr_{from}_{to}`, anchored at the epoch the transition lands on.
fn emit_transitions(stages: &[SleepStage], epoch_sec: f64, out: &mut AnnotationSet) {
    let code3 = |c: Class3| match c {
        Class3::Wake => "W",
        Class3::Nrem => "NR",
        Class3::Rem => "R",
    };
    let mut prev: Option<Class3> = None;
    for (e, &s) in stages.iter().enumerate() {
        let Some(cur) = s.class3() else {
            prev = None;
            continue;
        };
        if let Some(p) = prev {
            if p != cur {
                let name = format!("tr_{}_{}", code3(p), code3(cur));
                out.add(name).add("trans", epoch_interval(e, epoch_sec), "*");
            }
        }
        prev = Some(cur);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypnogram::cycles;
    use crate::hypnogram::stats;

    fn stages(spec: &str) -> Vec<SleepStage> {
        spec.split_whitespace().map(|c| SleepStage::from_code(c).unwrap()).collect()
    }

    #[test]
    fn landmarks_emit_t0_through_t6_when_fully_determined() {
        let mut s = vec![SleepStage::Wake; 4];
        s.extend(vec![SleepStage::N2; 20]);
        s.extend(vec![SleepStage::Wake; 4]);
        let lm = stats::landmarks(&s, 0.5, 10.0);
        let mut set = AnnotationSet::new();
        emit_landmarks(&s, 30.0, &lm, &mut set);
        let ann = set.get("landmark").unwrap();
        assert!(ann.instance_ids().contains("t0"));
        assert!(ann.instance_ids().contains("t1"));
        assert!(ann.instance_ids().contains("t6"));
    }

    #[test]
    fn transitions_fire_only_on_class_change() {
        let s = stages("W W N2 N2 R R W");
        let mut set = AnnotationSet::new();
        emit_transitions(&s, 30.0, &mut set);
        assert!(set.get("tr_W_NR").is_some());
        assert!(set.get("tr_NR_R").is_some());
        assert!(set.get("tr_R_W").is_some());
        assert!(set.get("tr_W_W").is_none());
    }

    #[test]
    fn bouts_below_five_minutes_are_not_emitted() {
        let s = stages("W N2 N2 W");
        let mut set = AnnotationSet::new();
        emit_bouts(&s, 30.0, &mut set);
        assert!(set.get("bout05_N2").is_none());
    }

    #[test]
    fn cycle_series_only_covers_epochs_with_a_cycle_number() {
        let mut s = vec![SleepStage::Wake; 4];
        s.extend(vec![SleepStage::N2; 40]);
        let analysis = cycles::analyze(&s, 0.5, cycles::CycleParams::default());
        let mut set = AnnotationSet::new();
        emit_cycle_series(&s, 30.0, &analysis, &mut set);
        let ann = set.get("cycle_number").unwrap();
        assert_eq!(ann.num_instances(), analysis.cycle_number.iter().filter(|&&c| c > 0).count());
    }
}
