//! Annotation store: [`AnnotationSet`] owns named [`Annotation`]s, each of
//! which owns [`Instance`]s keyed by [`InstanceIndex`] and indexed by an
//! [`IntervalTree`] for fast temporal queries.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::clock::{ClockTime, Interval, Tick};
use crate::interval_tree::{IntervalKeyed, IntervalTree};
use crate::value::TypedValue;

/// Reserved annotation class names the merge/synthesis machinery owns.
/// A later loader is not permitted to silently retype one of these once it
/// has been created by [`AnnotationSet::make_sleep_stage`].
pub const CANONICAL_SLEEP_STAGE: &str = "SleepStage";

#[must_use]
pub fn is_reserved(name: &str) -> bool {
    name == CANONICAL_SLEEP_STAGE
}

/// Identifies one instance within its parent annotation: `(parent, interval,
/// id, channel)`. Total order is lexicographic on `(parent identity, start,
/// stop, id, channel)`. The back-pointer to `parent` is a borrow: an
/// `InstanceIndex` cannot outlive the `Annotation` that owns it.
#[derive(Debug, Clone)]
pub struct InstanceIndex {
    pub parent: String,
    pub interval: Interval,
    pub id: String,
    pub channel: String,
}

impl InstanceIndex {
    #[must_use]
    pub fn new(parent: impl Into<String>, interval: Interval, id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            interval,
            id: id.into(),
            channel: channel.into(),
        }
    }

    fn sort_key(&self) -> (&str, Tick, Tick, &str, &str) {
        (
            self.parent.as_str(),
            self.interval.start,
            self.interval.stop,
            self.id.as_str(),
            self.channel.as_str(),
        )
    }
}

impl PartialEq for InstanceIndex {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}
impl Eq for InstanceIndex {}
impl PartialOrd for InstanceIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for InstanceIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl IntervalKeyed for InstanceIndex {
    fn interval(&self) -> Interval {
        self.interval
    }
}

/// A single instance's `name -> TypedValue` field map. The instance is the
/// sole owner of its `TypedValue`s.
#[derive(Debug, Clone, Default)]
pub struct Instance {
    data: BTreeMap<String, TypedValue>,
}

impl Instance {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&TypedValue> {
        self.data.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: TypedValue) {
        self.data.insert(name.into(), value);
    }

    pub fn set_flag(&mut self, name: impl Into<String>) {
        self.set(name, TypedValue::Flag);
    }

    #[must_use]
    pub fn fields(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `name=value;name=value` debug rendering, matching the original
    /// `instance_t::print`.
    #[must_use]
    pub fn render(&self, delim: &str) -> String {
        self.data
            .iter()
            .map(|(k, v)| format!("{k}={}", v.text_value()))
            .collect::<Vec<_>>()
            .join(delim)
    }
}

/// One coherent annotation class (e.g. `SleepStage`, `Arousal`): owns all of
/// its instances, keyed and ordered by [`InstanceIndex`], plus an interval
/// tree index that is rebuilt lazily whenever stale.
pub struct Annotation {
    pub name: String,
    pub description: String,
    instances: IndexMap<InstanceKey, Instance>,
    tree: Option<IntervalTree<InstanceIndex>>,
}

/// A hashable/ordered stand-in for `InstanceIndex` used as the map key
/// (ticks + strings are cheap to clone and compare).
type InstanceKey = (Tick, Tick, String, String);

fn key_of(idx: &InstanceIndex) -> InstanceKey {
    (idx.interval.start, idx.interval.stop, idx.id.clone(), idx.channel.clone())
}

impl Annotation {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instances: IndexMap::new(),
            tree: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    #[must_use]
    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    /// Create a fresh instance at `(id, interval, channel)` and invalidate
    /// the tree. Re-adding the same key overwrites the prior instance (the
    /// original's `add` always creates fresh storage).
    pub fn add(&mut self, id: impl Into<String>, interval: Interval, channel: impl Into<String>) -> &mut Instance {
        let id = id.into();
        let channel = channel.into();
        let idx = InstanceIndex::new(self.name.clone(), interval, id.clone(), channel.clone());
        self.tree = None;
        self.instances.entry(key_of(&idx)).or_insert_with(Instance::new)
    }

    pub fn remove(&mut self, interval: Interval, id: &str, channel: &str) {
        let key = (interval.start, interval.stop, id.to_string(), channel.to_string());
        if self.instances.shift_remove(&key).is_some() {
            self.tree = None;
        }
    }

    fn ensure_tree(&mut self) {
        if self.tree.is_none() {
            debug!(annotation = %self.name, "rebuilding interval tree index");
            let items: Vec<InstanceIndex> = self
                .instances
                .keys()
                .map(|(start, stop, id, channel)| {
                    InstanceIndex::new(self.name.clone(), Interval::new(*start, *stop), id.clone(), channel.clone())
                })
                .collect();
            self.tree = Some(IntervalTree::build(items));
        }
    }

    /// All instances overlapping `window`.
    pub fn extract(&mut self, window: Interval) -> Vec<(InstanceIndex, &Instance)> {
        self.ensure_tree();
        let hits = self.tree.as_ref().unwrap().query_refs(window.start, window.stop);
        hits.into_iter()
            .map(|idx| {
                let key = (idx.interval.start, idx.interval.stop, idx.id.clone(), idx.channel.clone());
                (idx.clone(), self.instances.get(&key).expect("index consistent with store"))
            })
            .collect()
    }

    /// Only instances *fully contained* in `window`.
    pub fn extract_complete_overlap(&mut self, window: Interval) -> Vec<(InstanceIndex, &Instance)> {
        self.extract(window)
            .into_iter()
            .filter(|(idx, _)| idx.interval.contained_in(window.start, window.stop))
            .collect()
    }

    #[must_use]
    pub fn minimum_tp(&self) -> Option<Tick> {
        self.instances.keys().map(|(start, _, _, _)| *start).min()
    }

    #[must_use]
    pub fn maximum_tp(&self) -> Option<Tick> {
        self.instances.keys().map(|(_, stop, _, _)| *stop).max()
    }

    #[must_use]
    pub fn instance_ids(&self) -> std::collections::BTreeSet<String> {
        self.instances.keys().map(|(_, _, id, _)| id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceIndex, &Instance)> {
        self.instances.iter().map(|((start, stop, id, channel), inst)| {
            (
                InstanceIndex::new(self.name.clone(), Interval::new(*start, *stop), id.clone(), channel.clone()),
                inst,
            )
        })
    }
}

/// One recording's full set of annotations, owned by name.
pub struct AnnotationSet {
    by_name: IndexMap<String, Annotation>,
    pub start_ct: Option<ClockTime>,
    pub duration_sec: f64,
    pub epoch_sec: f64,
    pub write_offset: Tick,
    aliasing: std::collections::HashMap<String, String>,
}

impl Default for AnnotationSet {
    fn default() -> Self {
        Self {
            by_name: IndexMap::new(),
            start_ct: None,
            duration_sec: 0.0,
            epoch_sec: 30.0,
            write_offset: Tick::ZERO,
            aliasing: std::collections::HashMap::new(),
        }
    }
}

/// Outcome of merging up to eight stage-annotation layers into the
/// canonical `SleepStage` class.
#[derive(Debug, Default)]
pub struct SleepStageMergeReport {
    pub created: bool,
    pub conflicting_epochs: Vec<Interval>,
}

impl AnnotationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliasing.insert(alias.into(), canonical.into());
    }

    fn resolve(&self, name: &str) -> String {
        self.aliasing.get(name).cloned().unwrap_or_else(|| name.to_string())
    }

    /// Idempotent: returns the existing annotation if already present.
    pub fn add(&mut self, name: impl Into<String>) -> &mut Annotation {
        let name = self.resolve(&name.into());
        self.by_name.entry(name.clone()).or_insert_with(|| Annotation::new(name))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Annotation> {
        self.by_name.get(&self.resolve(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Annotation> {
        let resolved = self.resolve(name);
        self.by_name.get_mut(&resolved)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.by_name.keys().map(String::as_str).collect()
    }

    /// Attempt to synthesize the canonical `SleepStage` annotation from up to
    /// eight source annotation names (one per stage, in the order:
    /// `[wake, n1, n2, n3, n4, rem, lights_on_or_movement, unknown]`). If the
    /// canonical class already exists it is only rebuilt when
    /// `force_remake` is set. An epoch spanned by two incompatible source
    /// annotations is recorded as conflicting; the internal coding prefers
    /// `Unknown` for such an epoch.
    pub fn make_sleep_stage(
        &mut self,
        sources: &[(Option<&str>, crate::hypnogram::SleepStage)],
        epoch_len: Tick,
        recording_end: Tick,
        force_remake: bool,
    ) -> SleepStageMergeReport {
        if self.by_name.contains_key(CANONICAL_SLEEP_STAGE) && !force_remake {
            return SleepStageMergeReport { created: false, conflicting_epochs: vec![] };
        }

        let n_epochs = (recording_end.0 / epoch_len.0).max(0) as usize;
        let mut coded: Vec<Option<crate::hypnogram::SleepStage>> = vec![None; n_epochs];
        let mut conflicts = Vec::new();

        for (source_name, stage) in sources {
            let Some(source_name) = source_name else { continue };
            let Some(ann) = self.by_name.get_mut(*source_name) else { continue };
            for epoch_i in 0..n_epochs {
                let start = Tick(epoch_i as i64 * epoch_len.0);
                let stop = start + epoch_len;
                let hits = ann.extract(Interval::new(start, stop));
                if hits.is_empty() {
                    continue;
                }
                match coded[epoch_i] {
                    None => coded[epoch_i] = Some(*stage),
                    Some(existing) if existing == *stage => {}
                    Some(_) => {
                        warn!(epoch = epoch_i, "conflicting sleep-stage source annotations");
                        conflicts.push(Interval::new(start, stop));
                        coded[epoch_i] = Some(crate::hypnogram::SleepStage::Unknown);
                    }
                }
            }
        }

        let canonical = self.add(CANONICAL_SLEEP_STAGE);
        for (epoch_i, stage) in coded.iter().enumerate() {
            let stage = stage.unwrap_or(crate::hypnogram::SleepStage::Unscored);
            let start = Tick(epoch_i as i64 * epoch_len.0);
            let stop = start + epoch_len;
            canonical.add(stage.code(), Interval::new(start, stop), "*");
        }

        SleepStageMergeReport { created: true, conflicting_epochs: conflicts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut set = AnnotationSet::new();
        set.add("Arousal");
        set.add("Arousal");
        assert_eq!(set.names(), vec!["Arousal"]);
    }

    #[test]
    fn extract_overlapping_window() {
        let mut set = AnnotationSet::new();
        let ann = set.add("Arousal");
        ann.add("a1", Interval::new(Tick(0), Tick(10)), "C3");
        ann.add("a2", Interval::new(Tick(20), Tick(30)), "C3");
        let ann = set.get_mut("Arousal").unwrap();
        let hits = ann.extract(Interval::new(Tick(5), Tick(25)));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn extract_complete_overlap_is_stricter() {
        let mut set = AnnotationSet::new();
        let ann = set.add("Arousal");
        ann.add("a1", Interval::new(Tick(5), Tick(15)), "C3");
        let ann = set.get_mut("Arousal").unwrap();
        assert_eq!(ann.extract(Interval::new(Tick(0), Tick(10))).len(), 1);
        assert_eq!(ann.extract_complete_overlap(Interval::new(Tick(0), Tick(10))).len(), 0);
        assert_eq!(ann.extract_complete_overlap(Interval::new(Tick(0), Tick(20))).len(), 1);
    }

    #[test]
    fn minimum_maximum_tp() {
        let mut set = AnnotationSet::new();
        let ann = set.add("A");
        ann.add("x", Interval::new(Tick(10), Tick(20)), "*");
        ann.add("y", Interval::new(Tick(5), Tick(8)), "*");
        assert_eq!(ann.minimum_tp(), Some(Tick(5)));
        assert_eq!(ann.maximum_tp(), Some(Tick(20)));
    }

    #[test]
    fn instance_field_roundtrip() {
        let mut set = AnnotationSet::new();
        let ann = set.add("A");
        let inst = ann.add("x", Interval::new(Tick(0), Tick(10)), "*");
        inst.set("amp", TypedValue::Dbl(1.5));
        let ann = set.get_mut("A").unwrap();
        let (_, inst) = &ann.extract(Interval::new(Tick(0), Tick(10)))[0];
        assert_eq!(inst.find("amp"), Some(&TypedValue::Dbl(1.5)));
    }
}
