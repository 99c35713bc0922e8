//! Augmented static interval tree over any `T: IntervalKeyed`.
//!
//! Balanced by midpoint selection of a `stable_sort`ed index permutation
//! (rather than a self-balancing dynamic tree) because the tree is rebuilt
//! wholesale whenever the owning annotation's instance set changes — see
//! [`crate::annotation::Annotation`]'s "stale after mutation" invariant.

use crate::clock::{Interval, Tick};

/// Anything that can be keyed by an [`Interval`] for tree indexing.
pub trait IntervalKeyed {
    fn interval(&self) -> Interval;
}

struct Node<T> {
    item: T,
    interval: Interval,
    max_stop: Tick,
    left: Option<usize>,
    right: Option<usize>,
}

/// A static, rebuildable interval tree. Invalid intervals (`stop < start`)
/// are silently dropped at build time; an empty tree answers every query
/// with zero results.
pub struct IntervalTree<T> {
    nodes: Vec<Node<T>>,
    root: Option<usize>,
}

impl<T> Default for IntervalTree<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<T: IntervalKeyed> IntervalTree<T> {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tree over `items`, dropping any with an invalid interval.
    /// Items are ordered by `(start, stop)` with ties broken by their
    /// original position (a `stable_sort`), then a balanced BST is built by
    /// repeated midpoint selection.
    pub fn build(items: Vec<T>) -> Self {
        let mut entries: Vec<(usize, Interval, T)> = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i, item.interval(), item))
            .filter(|(_, iv, _)| iv.is_valid())
            .collect();

        entries.sort_by(|a, b| a.1.sort_key().cmp(&b.1.sort_key()).then(a.0.cmp(&b.0)));

        let mut tree = Self {
            nodes: Vec::with_capacity(entries.len()),
            root: None,
        };
        if entries.is_empty() {
            return tree;
        }
        let n = entries.len();
        // Move items out in sorted order; each slot is taken exactly once
        // by the balanced-midpoint recursion below.
        let mut sorted: Vec<Option<(Interval, T)>> = entries
            .into_iter()
            .map(|(_, iv, t)| Some((iv, t)))
            .collect();
        tree.root = tree.build_range(&mut sorted, 0, n - 1);
        tree
    }

    fn build_range(
        &mut self,
        items: &mut [Option<(Interval, T)>],
        l: usize,
        r: usize,
    ) -> Option<usize> {
        if l > r {
            return None;
        }
        let m = l + (r - l) / 2;
        let (interval, item) = items[m].take().expect("each slot taken exactly once");
        let idx = self.nodes.len();
        self.nodes.push(Node {
            item,
            interval,
            max_stop: interval.stop,
            left: None,
            right: None,
        });
        let left = if m == 0 { None } else { self.build_range(items, l, m - 1) };
        let right = if m == r { None } else { self.build_range(items, m + 1, r) };
        self.nodes[idx].left = left;
        self.nodes[idx].right = right;
        self.pull(idx);
        Some(idx)
    }

    fn pull(&mut self, u: usize) {
        let mut max_stop = self.nodes[u].interval.stop;
        if let Some(l) = self.nodes[u].left {
            if self.nodes[l].max_stop > max_stop {
                max_stop = self.nodes[l].max_stop;
            }
        }
        if let Some(r) = self.nodes[u].right {
            if self.nodes[r].max_stop > max_stop {
                max_stop = self.nodes[r].max_stop;
            }
        }
        self.nodes[u].max_stop = max_stop;
    }

    /// Invoke `sink` once per item overlapping `[qs, qe)`.
    pub fn query(&self, qs: Tick, qe: Tick, mut sink: impl FnMut(&T)) {
        self.query_rec(self.root, qs, qe, &mut sink);
    }

    fn query_rec(&self, u: Option<usize>, qs: Tick, qe: Tick, sink: &mut impl FnMut(&T)) {
        let Some(u) = u else { return };
        let node = &self.nodes[u];

        if let Some(l) = node.left {
            if self.nodes[l].max_stop > qs {
                self.query_rec(Some(l), qs, qe, sink);
            }
        }

        if node.interval.overlaps(qs, qe) {
            sink(&node.item);
        }

        if let Some(r) = node.right {
            if node.interval.start < qe {
                self.query_rec(Some(r), qs, qe, sink);
            }
        }
    }

    #[must_use]
    pub fn query_refs(&self, qs: Tick, qe: Tick) -> Vec<&T> {
        let mut out = Vec::new();
        self.query(qs, qe, |item| out.push(item));
        out
    }

    #[must_use]
    pub fn count(&self, qs: Tick, qe: Tick) -> u64 {
        let mut c = 0u64;
        self.query(qs, qe, |_| c += 1);
        c
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Item(Interval);

    impl IntervalKeyed for Item {
        fn interval(&self) -> Interval {
            self.0
        }
    }

    fn iv(a: i64, b: i64) -> Interval {
        Interval::new(Tick(a), Tick(b))
    }

    fn sample_tree() -> IntervalTree<Item> {
        IntervalTree::build(vec![
            Item(iv(0, 10)),
            Item(iv(5, 15)),
            Item(iv(12, 20)),
            Item(iv(100, 100)),
        ])
    }

    #[test]
    fn query_matches_naive_filter() {
        let tree = sample_tree();
        let got: Vec<Interval> = tree.query_refs(Tick(8), Tick(13)).into_iter().map(|i| i.0).collect();
        let mut got_sorted = got.clone();
        got_sorted.sort_by_key(Interval::sort_key);
        assert_eq!(
            got_sorted,
            vec![iv(0, 10), iv(5, 15), iv(12, 20)]
        );
    }

    #[test]
    fn query_point_interval() {
        let tree = sample_tree();
        let got = tree.query_refs(Tick(100), Tick(101));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, iv(100, 100));
    }

    #[test]
    fn empty_tree_returns_nothing() {
        let tree: IntervalTree<Item> = IntervalTree::build(vec![]);
        assert!(tree.is_empty());
        assert_eq!(tree.count(Tick(0), Tick(1000)), 0);
    }

    #[test]
    fn invalid_intervals_are_dropped() {
        let tree = IntervalTree::build(vec![Item(iv(10, 5)), Item(iv(0, 1))]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn matches_naive_filter_property() {
        let items: Vec<Item> = vec![
            Item(iv(0, 10)),
            Item(iv(3, 3)),
            Item(iv(7, 9)),
            Item(iv(20, 25)),
            Item(iv(-5, 2)),
        ];
        let tree = IntervalTree::build(items.clone());
        for (qs, qe) in [(0i64, 5i64), (3, 3), (-10, -1), (8, 30), (0, 100)] {
            let mut expected: Vec<Interval> = items
                .iter()
                .filter(|i| i.0.overlaps(Tick(qs), Tick(qe)))
                .map(|i| i.0)
                .collect();
            expected.sort_by_key(Interval::sort_key);
            let mut got: Vec<Interval> = tree
                .query_refs(Tick(qs), Tick(qe))
                .into_iter()
                .map(|i| i.0)
                .collect();
            got.sort_by_key(Interval::sort_key);
            assert_eq!(got, expected, "qs={qs} qe={qe}");
        }
    }
}
