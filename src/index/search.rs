//! Best-first search over every tree of a forest at once.
//!
//! A max-priority queue holds `(priority, node)` pairs. Each root starts at
//! `+inf`; descending into a split node lowers the priority of each child to
//! the margin on its side, so the queue always expands the subtree whose
//! plane the query is deepest inside. Items reached this way are candidates;
//! once `search_k` of them are collected they are scored exactly and the
//! best `n` returned.

use super::traits::SearchResult;
use crate::distance::Distance;
use crate::element::Element;
use crate::metrics::SearchStatsBuilder;
use crate::storage::Arena;
use crate::types::ItemId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::marker::PhantomData;

/// Knobs of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Number of neighbors to return.
    pub n: usize,
    /// Candidates to collect before ranking. `None` or `Some(0)` means
    /// `n * n_trees`.
    pub search_k: Option<usize>,
    /// Drop the query item from item queries.
    pub exclude_self: bool,
}

impl SearchParams {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            search_k: None,
            exclude_self: false,
        }
    }

    pub fn with_search_k(mut self, search_k: usize) -> Self {
        self.search_k = Some(search_k);
        self
    }

    pub fn excluding_self(mut self) -> Self {
        self.exclude_self = true;
        self
    }

    /// Effective candidate bound for a forest of `n_trees` trees.
    pub fn effective_search_k(&self, n_trees: usize) -> usize {
        match self.search_k {
            None | Some(0) => self.n.saturating_mul(n_trees),
            Some(k) => k,
        }
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Queue entry. Higher priority pops first; equal priorities pop in node
/// order so the traversal does not depend on push order.
#[derive(Debug, Clone, Copy)]
struct QueueEntry<T> {
    priority: T,
    node: usize,
}

impl<T: Element> PartialEq for QueueEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Element> Eq for QueueEntry<T> {}

impl<T: Element> PartialOrd for QueueEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Element> Ord for QueueEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Read-only view of a built forest used to answer queries.
pub(crate) struct QueryEngine<'a, T, D> {
    arena: &'a Arena,
    roots: &'a [usize],
    n_items: usize,
    _policy: PhantomData<(T, D)>,
}

impl<'a, T: Element, D: Distance> QueryEngine<'a, T, D> {
    pub fn new(arena: &'a Arena, roots: &'a [usize], n_items: usize) -> Self {
        Self {
            arena,
            roots,
            n_items,
            _policy: PhantomData,
        }
    }

    /// Nearest neighbors of `query`, skipping item `exclude` if given.
    pub fn search(
        &self,
        query: &[T],
        params: &SearchParams,
        exclude: Option<u32>,
        stats: &mut SearchStatsBuilder,
    ) -> Vec<SearchResult<T>> {
        if self.roots.is_empty() || self.n_items == 0 || params.n == 0 {
            return Vec::new();
        }

        // One extra slot so dropping the query item still leaves n results.
        let wanted = params.n + usize::from(exclude.is_some());
        let search_k = SearchParams {
            n: wanted,
            ..*params
        }
        .effective_search_k(self.roots.len());
        stats.search_k(search_k);

        let mut candidates = self.collect_candidates(query, search_k, stats);
        stats.add_candidates(candidates.len());

        candidates.sort_unstable();
        candidates.dedup();
        if let Some(item) = exclude {
            candidates.retain(|&c| c != item);
        }
        stats.distinct_candidates(candidates.len());

        let mut scored: Vec<(T, u32)> = Vec::with_capacity(candidates.len());
        for &id in &candidates {
            let Some(leaf) = self.arena.get::<T>(id as usize) else {
                continue;
            };
            // Slots of ids that were never added have no descendants.
            if leaf.n_descendants() != 1 {
                continue;
            }
            scored.push((D::distance(query, leaf.vector()), id));
        }
        stats.add_distances(scored.len());

        let by_distance =
            |a: &(T, u32), b: &(T, u32)| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1));
        let n = params.n.min(scored.len());
        if n < scored.len() && n > 0 {
            scored.select_nth_unstable_by(n - 1, by_distance);
            scored.truncate(n);
        }
        scored.sort_unstable_by(by_distance);
        scored.truncate(n);

        scored
            .into_iter()
            .map(|(distance, id)| SearchResult {
                id: ItemId(id),
                distance: D::normalized_distance(distance),
            })
            .collect()
    }

    /// Walk the forest best-first until `search_k` item ids are collected.
    fn collect_candidates(
        &self,
        query: &[T],
        search_k: usize,
        stats: &mut SearchStatsBuilder,
    ) -> Vec<u32> {
        let capacity = self.arena.layout().bucket_capacity;
        let mut queue: BinaryHeap<QueueEntry<T>> = self
            .roots
            .iter()
            .map(|&node| QueueEntry {
                priority: T::INFINITY,
                node,
            })
            .collect();

        let mut candidates = Vec::with_capacity(search_k.min(1 << 16));
        while candidates.len() < search_k {
            let Some(QueueEntry { priority, node: index }) = queue.pop() else {
                break;
            };
            stats.visit_node();

            let Some(node) = self.arena.get::<T>(index) else {
                tracing::warn!(node = index, "reference past the end of the arena, skipped");
                continue;
            };
            let nd = node.n_descendants();

            if nd == 1 && index < self.n_items {
                candidates.push(index as u32);
            } else if nd <= capacity {
                candidates.extend(
                    node.bucket_items()
                        .iter()
                        .filter(|&&id| id >= 0 && (id as usize) < self.n_items)
                        .map(|&id| id as u32),
                );
            } else {
                let margin = D::margin(node.vector(), node.extra(), query, T::ZERO);
                let [left, right] = node.children();
                // Children are always allocated before their parent.
                if right < index {
                    queue.push(QueueEntry {
                        priority: priority.min(margin),
                        node: right,
                    });
                }
                if left < index {
                    queue.push(QueueEntry {
                        priority: priority.min(-margin),
                        node: left,
                    });
                }
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{Euclidean, Metric};
    use crate::index::builder::{append_root_trailer, build_sequential, BuildPlan};
    use crate::node::NodeLayout;
    use crate::random::Kiss32Random;

    fn forest(vectors: &[Vec<f32>], n_trees: usize) -> (Arena, Vec<usize>) {
        let layout = NodeLayout::of::<f32>(Metric::Euclidean, vectors[0].len());
        let mut arena = Arena::new(layout);
        arena.resize(vectors.len()).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            let mut node = arena.node_mut::<f32>(i).unwrap();
            node.set_n_descendants(1);
            node.vector_mut().copy_from_slice(v);
        }
        let plan = BuildPlan {
            n_items: vectors.len(),
            n_trees: Some(n_trees),
            seed: 7,
            verbose: false,
        };
        let roots = build_sequential::<f32, Euclidean, Kiss32Random>(&mut arena, &plan).unwrap();
        let roots = append_root_trailer(&mut arena, &roots).unwrap();
        (arena, roots)
    }

    fn line(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![i as f32, 0.0, 0.0]).collect()
    }

    #[test]
    fn test_queue_order() {
        let mut heap = BinaryHeap::new();
        heap.push(QueueEntry { priority: 1.0f32, node: 3 });
        heap.push(QueueEntry { priority: 5.0f32, node: 1 });
        heap.push(QueueEntry { priority: 5.0f32, node: 2 });
        assert_eq!(heap.pop().unwrap().node, 2);
        assert_eq!(heap.pop().unwrap().node, 1);
        assert_eq!(heap.pop().unwrap().node, 3);
    }

    #[test]
    fn test_effective_search_k() {
        assert_eq!(SearchParams::new(10).effective_search_k(5), 50);
        assert_eq!(SearchParams::new(10).with_search_k(0).effective_search_k(5), 50);
        assert_eq!(SearchParams::new(10).with_search_k(7).effective_search_k(5), 7);
    }

    #[test]
    fn test_exhaustive_search_is_exact() {
        let vectors = line(100);
        let (arena, roots) = forest(&vectors, 4);
        let engine = QueryEngine::<f32, Euclidean>::new(&arena, &roots, 100);

        let params = SearchParams::new(5).with_search_k(100 * 4);
        let mut stats = SearchStatsBuilder::new();
        let results = engine.search(&[42.2, 0.0, 0.0], &params, None, &mut stats);
        let ids: Vec<u32> = results.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![42, 43, 41, 44, 40]);
        assert!((results[0].distance - 0.2).abs() < 1e-5);

        let stats = stats.build();
        assert_eq!(stats.distinct_candidates, 100);
        assert_eq!(stats.distances_computed, 100);
    }

    #[test]
    fn test_exclude_self() {
        let vectors = line(30);
        let (arena, roots) = forest(&vectors, 3);
        let engine = QueryEngine::<f32, Euclidean>::new(&arena, &roots, 30);

        let params = SearchParams::new(2).with_search_k(90);
        let mut stats = SearchStatsBuilder::new();
        let results = engine.search(&vectors[10], &params, Some(10), &mut stats);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.id.0 != 10));
        assert!(results.iter().all(|r| (r.distance - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_no_roots_returns_nothing() {
        let vectors = line(5);
        let (arena, _) = forest(&vectors, 1);
        let engine = QueryEngine::<f32, Euclidean>::new(&arena, &[], 5);
        let mut stats = SearchStatsBuilder::new();
        assert!(engine
            .search(&vectors[0], &SearchParams::new(3), None, &mut stats)
            .is_empty());
    }

    #[test]
    fn test_n_larger_than_candidates() {
        let vectors = line(4);
        let (arena, roots) = forest(&vectors, 2);
        let engine = QueryEngine::<f32, Euclidean>::new(&arena, &roots, 4);
        let mut stats = SearchStatsBuilder::new();
        let results = engine.search(&vectors[0], &SearchParams::new(50), None, &mut stats);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].id, ItemId(0));
    }
}
