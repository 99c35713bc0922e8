//! Timeline: maps EDF record blocks to wall-clock/tick coordinates and
//! materializes epochs over them, continuous or discontinuous. Owns the
//! epoch cursor, the whole-epoch mask, and the per-channel CHEP mask.

use std::collections::{BTreeSet, HashMap};

use crate::clock::{Interval, Tick};

/// One contiguous run of samples: `[tick_start, tick_start + tick_dur)`.
/// A continuous recording has exactly one record block spanning the whole
/// recording; a discontinuous recording has several, in increasing
/// `tick_start` order and non-overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordBlock {
    pub tick_start: Tick,
    pub tick_dur: Tick,
}

impl RecordBlock {
    #[must_use]
    pub fn interval(&self) -> Interval {
        Interval::new(self.tick_start, self.tick_start + self.tick_dur)
    }
}

/// One materialized epoch: its tick interval plus 0-based internal index.
/// The 1-based `display_epoch` is derived separately since generic layouts
/// may skip internal housekeeping slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    pub internal_index: usize,
    pub interval: Interval,
}

#[derive(Debug, Clone, Copy)]
enum Layout {
    /// Uniform epochs of length `dur_ticks`, starting every `step_ticks`
    /// (`step_ticks = dur_ticks - overlap_ticks`), excluding epochs that
    /// straddle a gap.
    Uniform { dur_ticks: Tick, step_ticks: Tick },
    /// Arbitrary per-epoch `(start, duration)` pairs, typically derived
    /// from annotations.
    Generic,
}

/// Owns the record-block geometry and the materialized epoch list, plus the
/// whole-epoch mask, the CHEP (channel-epoch) mask, and the iteration
/// cursor. Epoch boundaries can additionally be aligned to a cadence or
/// shifted by a fixed offset; both operations replace the uniform layout
/// with an explicit generic one and are recorded so hypnogram-mutating
/// commands can reject running against an offset/aligned timeline.
pub struct Timeline {
    blocks: Vec<RecordBlock>,
    layout: Layout,
    epochs: Vec<Epoch>,
    epoch_mask: Vec<bool>,
    chep_mask: HashMap<usize, BTreeSet<String>>,
    cursor: usize,
    offset_or_aligned: bool,
}

impl Timeline {
    /// A single continuous recording of `n_records` blocks of
    /// `record_dur_ticks` each, with uniform epochs of `epoch_dur_ticks`
    /// (no overlap).
    #[must_use]
    pub fn continuous(n_records: usize, record_dur_ticks: Tick, epoch_dur_ticks: Tick) -> Self {
        let total = record_dur_ticks * n_records as i64;
        Self::from_blocks(vec![RecordBlock { tick_start: Tick::ZERO, tick_dur: total }], epoch_dur_ticks, Tick::ZERO)
    }

    /// A recording made of explicit, possibly non-contiguous, record
    /// blocks (sorted by `tick_start`), with uniform epochs over them.
    #[must_use]
    pub fn from_blocks(mut blocks: Vec<RecordBlock>, epoch_dur_ticks: Tick, overlap_ticks: Tick) -> Self {
        blocks.sort_by_key(|b| b.tick_start);
        let step = (epoch_dur_ticks - overlap_ticks).max(Tick(1));
        let mut tl = Self {
            blocks,
            layout: Layout::Uniform { dur_ticks: epoch_dur_ticks, step_ticks: step },
            epochs: Vec::new(),
            epoch_mask: Vec::new(),
            chep_mask: HashMap::new(),
            cursor: 0,
            offset_or_aligned: false,
        };
        tl.rebuild_uniform_epochs();
        tl
    }

    fn rebuild_uniform_epochs(&mut self) {
        let Layout::Uniform { dur_ticks, step_ticks } = self.layout else {
            return;
        };
        let mut epochs = Vec::new();
        for block in &self.blocks {
            let block_iv = block.interval();
            let mut start = block_iv.start;
            let mut i = epochs.len();
            while start + dur_ticks <= block_iv.stop {
                epochs.push(Epoch { internal_index: i, interval: Interval::new(start, start + dur_ticks) });
                i += 1;
                start = start + step_ticks;
            }
        }
        for (i, e) in epochs.iter_mut().enumerate() {
            e.internal_index = i;
        }
        self.epochs = epochs;
        self.epoch_mask = vec![false; self.epochs.len()];
    }

    /// Replace the layout wholesale with a generic, explicit epoch list
    /// (e.g. derived from annotation intervals).
    pub fn set_generic_epochs(&mut self, intervals: Vec<Interval>) {
        self.layout = Layout::Generic;
        self.epochs = intervals
            .into_iter()
            .enumerate()
            .map(|(i, iv)| Epoch { internal_index: i, interval: iv })
            .collect();
        self.epoch_mask = vec![false; self.epochs.len()];
        self.chep_mask.clear();
        self.cursor = 0;
    }

    #[must_use]
    pub fn num_epochs(&self) -> usize {
        self.epochs.len()
    }

    #[must_use]
    pub fn epoch(&self, i: usize) -> Option<Interval> {
        self.epochs.get(i).map(|e| e.interval)
    }

    /// 1-based user-visible epoch number. In the base layout this is simply
    /// `i + 1`; layouts that excise internal housekeeping slots would
    /// override this, but neither `Uniform` nor plain `Generic` do so here.
    #[must_use]
    pub fn display_epoch(&self, i: usize) -> Option<usize> {
        if i < self.epochs.len() { Some(i + 1) } else { None }
    }

    /// Snap every epoch boundary to the nearest multiple of `cadence_ticks`
    /// (the recording's annotation cadence). Marks the timeline as
    /// offset/aligned.
    pub fn align(&mut self, cadence_ticks: Tick) {
        let cadence = cadence_ticks.0.max(1);
        let snapped: Vec<Interval> = self
            .epochs
            .iter()
            .map(|e| {
                let snap = |t: Tick| Tick(((t.0 as f64 / cadence as f64).round() as i64) * cadence);
                Interval::new(snap(e.interval.start), snap(e.interval.stop))
            })
            .collect();
        self.set_generic_epochs(snapped);
        self.offset_or_aligned = true;
    }

    /// Shift every epoch start (and stop) by a fixed tick amount.
    pub fn offset(&mut self, delta_ticks: Tick) {
        let shifted: Vec<Interval> = self.epochs.iter().map(|e| Interval::new(e.interval.start + delta_ticks, e.interval.stop + delta_ticks)).collect();
        self.set_generic_epochs(shifted);
        self.offset_or_aligned = true;
    }

    #[must_use]
    pub fn is_offset_or_aligned(&self) -> bool {
        self.offset_or_aligned
    }

    // -- masking -------------------------------------------------------

    /// Whole-epoch mask: exclude epoch `i` from iteration.
    pub fn mask_epoch(&mut self, i: usize, masked: bool) {
        if let Some(m) = self.epoch_mask.get_mut(i) {
            *m = masked;
        }
    }

    #[must_use]
    pub fn epoch_masked(&self, i: usize) -> bool {
        self.epoch_mask.get(i).copied().unwrap_or(true)
    }

    /// CHEP: mask `channel` within `epoch`. Whole-epoch masking takes
    /// precedence over CHEP when checking [`Self::masked`].
    pub fn set_chep_mask(&mut self, epoch: usize, channel: impl Into<String>) {
        self.chep_mask.entry(epoch).or_default().insert(channel.into());
    }

    #[must_use]
    pub fn masked(&self, epoch: usize, channel: &str) -> bool {
        self.epoch_masked(epoch) || self.chep_mask.get(&epoch).is_some_and(|s| s.contains(channel))
    }

    #[must_use]
    pub fn make_chep_copy(&self) -> HashMap<usize, BTreeSet<String>> {
        self.chep_mask.clone()
    }

    pub fn clear_chep_mask(&mut self) {
        self.chep_mask.clear();
    }

    /// Union `copy` into the live CHEP mask (a channel is masked in the
    /// result if masked in either).
    pub fn merge_chep_mask(&mut self, copy: &HashMap<usize, BTreeSet<String>>) {
        for (epoch, channels) in copy {
            self.chep_mask.entry(*epoch).or_default().extend(channels.iter().cloned());
        }
    }

    // -- epoch cursor ----------------------------------------------------

    /// Rewind the iteration cursor. Must be called before any `next_epoch`
    /// loop (section 9: "process-wide state per timeline").
    pub fn first_epoch(&mut self) {
        self.cursor = 0;
    }

    /// Advance to and return the next unmasked (whole-epoch) epoch's
    /// internal index, or `-1` if exhausted.
    pub fn next_epoch(&mut self) -> i32 {
        while self.cursor < self.epochs.len() {
            let i = self.cursor;
            self.cursor += 1;
            if !self.epoch_masked(i) {
                return i as i32;
            }
        }
        -1
    }

    #[must_use]
    pub fn blocks(&self) -> &[RecordBlock] {
        &self.blocks
    }

    /// True iff `window` is fully contained within a single record block
    /// (does not straddle a gap).
    #[must_use]
    pub fn is_continuous_over(&self, window: Interval) -> bool {
        self.blocks.iter().any(|b| b.interval().contained_in(window.start, window.stop) || (window.start >= b.interval().start && window.stop <= b.interval().stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_epoch_geometry_matches_invariant() {
        // epoch(e).start = e*(E-overlap)*ticks, duration = E*ticks.
        let epoch_dur = Tick::from_seconds(30.0);
        let tl = Timeline::continuous(600, Tick::from_seconds(1.0), epoch_dur);
        for e in 0..5 {
            let iv = tl.epoch(e).unwrap();
            assert_eq!(iv.start, epoch_dur * e as i64);
            assert_eq!(iv.duration(), epoch_dur);
        }
    }

    #[test]
    fn epochs_never_straddle_a_gap() {
        let epoch_dur = Tick::from_seconds(30.0);
        let blocks = vec![
            RecordBlock { tick_start: Tick::ZERO, tick_dur: Tick::from_seconds(100.0) },
            RecordBlock { tick_start: Tick::from_seconds(200.0), tick_dur: Tick::from_seconds(100.0) },
        ];
        let tl = Timeline::from_blocks(blocks, epoch_dur, Tick::ZERO);
        for e in 0..tl.num_epochs() {
            let iv = tl.epoch(e).unwrap();
            assert!(tl.is_continuous_over(iv));
        }
        // first block holds 3 full 30s epochs (90s), second block offset starts fresh
        assert_eq!(tl.epoch(3).unwrap().start, Tick::from_seconds(200.0));
    }

    #[test]
    fn cursor_resets_on_first_epoch() {
        let tl_epoch_dur = Tick::from_seconds(30.0);
        let mut tl = Timeline::continuous(600, Tick::from_seconds(1.0), tl_epoch_dur);
        tl.first_epoch();
        assert_eq!(tl.next_epoch(), 0);
        assert_eq!(tl.next_epoch(), 1);
        tl.first_epoch();
        assert_eq!(tl.next_epoch(), 0);
    }

    #[test]
    fn masked_epoch_is_skipped_by_next_epoch() {
        let epoch_dur = Tick::from_seconds(30.0);
        let mut tl = Timeline::continuous(600, Tick::from_seconds(1.0), epoch_dur);
        tl.mask_epoch(1, true);
        tl.first_epoch();
        assert_eq!(tl.next_epoch(), 0);
        assert_eq!(tl.next_epoch(), 2);
    }

    #[test]
    fn chep_mask_is_independent_per_channel() {
        let epoch_dur = Tick::from_seconds(30.0);
        let mut tl = Timeline::continuous(600, Tick::from_seconds(1.0), epoch_dur);
        tl.set_chep_mask(0, "C3");
        assert!(tl.masked(0, "C3"));
        assert!(!tl.masked(0, "C4"));
    }

    #[test]
    fn align_marks_offset_or_aligned() {
        let epoch_dur = Tick::from_seconds(30.0);
        let mut tl = Timeline::continuous(600, Tick::from_seconds(1.0), epoch_dur);
        assert!(!tl.is_offset_or_aligned());
        tl.align(Tick::from_seconds(1.0));
        assert!(tl.is_offset_or_aligned());
    }

    #[test]
    fn offset_shifts_every_epoch_start() {
        let epoch_dur = Tick::from_seconds(30.0);
        let mut tl = Timeline::continuous(600, Tick::from_seconds(1.0), epoch_dur);
        let before = tl.epoch(0).unwrap();
        tl.offset(Tick::from_seconds(5.0));
        let after = tl.epoch(0).unwrap();
        assert_eq!(after.start, before.start + Tick::from_seconds(5.0));
    }
}
