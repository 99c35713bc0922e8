//! Sliding-window stage density: for a list of `(width, increment, anchor)`
//! triples, enumerate windows over the stage vector and compute per-class
//! density `matches / window_size` within each window.

use super::SleepStage;

/// Anchor points for sliding-window enumeration (and for hypnogram
/// windowing in `edits.rs`): T0 EDF start, T1 lights-out, T2 sleep-onset,
/// T3 sleep midpoint (density only: generates windows both backward and
/// forward), T4 final-wake, T5 lights-on, T6 EDF end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
}

#[derive(Debug, Clone, Copy)]
pub struct SlideSpec {
    pub width_epochs: usize,
    pub increment_epochs: usize,
    pub anchor: Anchor,
}

#[derive(Debug, Clone)]
pub struct DensityWindow {
    pub start_epoch: usize,
    pub end_epoch: usize,
    /// Density (`matches / window_size`) per queried stage, parallel to the
    /// `stages_of_interest` argument given to [`slide`].
    pub density: Vec<f64>,
}

/// Anchor epoch lookup table, resolved once per hypnogram before calling
/// [`slide`] for each requested `SlideSpec`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchorEpochs {
    pub t0: usize,
    pub t1: Option<usize>,
    pub t2: Option<usize>,
    pub t3: Option<usize>,
    pub t4: Option<usize>,
    pub t5: Option<usize>,
    pub t6: usize,
}

impl AnchorEpochs {
    #[must_use]
    fn resolve(&self, anchor: Anchor) -> Option<usize> {
        match anchor {
            Anchor::T0 => Some(self.t0),
            Anchor::T1 => self.t1,
            Anchor::T2 => self.t2,
            Anchor::T3 => self.t3,
            Anchor::T4 => self.t4,
            Anchor::T5 => self.t5,
            Anchor::T6 => Some(self.t6),
        }
    }
}

/// Enumerate windows for one `SlideSpec` and compute density for each stage
/// in `stages_of_interest`. `T3` generates windows walking both backward and
/// forward from the anchor; every other anchor walks forward only.
#[must_use]
pub fn slide(stages: &[SleepStage], anchors: &AnchorEpochs, spec: SlideSpec, stages_of_interest: &[SleepStage]) -> Vec<DensityWindow> {
    let n = stages.len();
    let Some(anchor_epoch) = anchors.resolve(spec.anchor) else {
        return Vec::new();
    };

    let mut starts: Vec<usize> = Vec::new();
    if spec.anchor == Anchor::T3 {
        let mut s = anchor_epoch;
        while s + spec.width_epochs <= n {
            starts.push(s);
            match s.checked_sub(spec.increment_epochs) {
                Some(prev) => s = prev,
                None => break,
            }
        }
        let mut s = anchor_epoch;
        loop {
            match s.checked_add(spec.increment_epochs) {
                Some(next) if next + spec.width_epochs <= n => s = next,
                _ => break,
            }
            starts.push(s);
        }
    } else {
        let mut s = anchor_epoch;
        while s + spec.width_epochs <= n {
            starts.push(s);
            s += spec.increment_epochs;
        }
    }
    starts.sort_unstable();
    starts.dedup();

    starts
        .into_iter()
        .map(|start| {
            let end = start + spec.width_epochs;
            let window = &stages[start..end];
            let density = stages_of_interest
                .iter()
                .map(|&want| window.iter().filter(|s| **s == want).count() as f64 / spec.width_epochs as f64)
                .collect();
            DensityWindow { start_epoch: start, end_epoch: end, density }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(spec: &str) -> Vec<SleepStage> {
        spec.split_whitespace().map(|c| SleepStage::from_code(c).unwrap()).collect()
    }

    #[test]
    fn forward_windows_from_t0() {
        let s = stages("W W N2 N2 N2 N2 R R R R");
        let anchors = AnchorEpochs { t0: 0, t6: s.len(), ..Default::default() };
        let spec = SlideSpec { width_epochs: 4, increment_epochs: 4, anchor: Anchor::T0 };
        let windows = slide(&s, &anchors, spec, &[SleepStage::N2]);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].density[0], 0.5);
        assert_eq!(windows[1].density[0], 0.0);
    }

    #[test]
    fn t3_generates_both_directions() {
        let s = stages("W W N2 N2 N2 N2 N2 N2 R R");
        let anchors = AnchorEpochs { t0: 0, t3: Some(5), t6: s.len(), ..Default::default() };
        let spec = SlideSpec { width_epochs: 2, increment_epochs: 2, anchor: Anchor::T3 };
        let windows = slide(&s, &anchors, spec, &[SleepStage::N2]);
        assert!(windows.iter().any(|w| w.start_epoch < 5));
        assert!(windows.iter().any(|w| w.start_epoch >= 5));
    }

    #[test]
    fn missing_anchor_yields_no_windows() {
        let s = stages("W W N2 N2");
        let anchors = AnchorEpochs::default();
        let spec = SlideSpec { width_epochs: 2, increment_epochs: 2, anchor: Anchor::T2 };
        assert!(slide(&s, &anchors, spec, &[SleepStage::N2]).is_empty());
    }
}
