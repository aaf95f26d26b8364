//! Brute force index for exact nearest neighbor search.
//!
//! This implementation serves as the ground truth baseline for the forest.
//! It computes distances to all vectors and returns the k closest, reporting
//! distances the same way the forest does.

use super::traits::{NearestNeighbors, SearchResult};
use crate::distance::Metric;
use crate::element::Element;
use crate::error::{ForestError, Result};
use crate::types::ItemId;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Rows scored per rayon task in [`BruteForceIndex::search_parallel`].
const CHUNK_SIZE: usize = 1000;

/// A vector with its ranking score, used for heap operations.
#[derive(Clone, Copy)]
struct Scored<T> {
    id: u32,
    score: T,
}

impl<T: Element> PartialEq for Scored<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Element> Eq for Scored<T> {}

impl<T: Element> PartialOrd for Scored<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Element> Ord for Scored<T> {
    // Max-heap on (score, id): peek() is the current worst of the k best.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Keep `candidate` if it beats the worst of the `k` best so far.
#[inline]
fn offer<T: Element>(heap: &mut BinaryHeap<Scored<T>>, k: usize, candidate: Scored<T>) {
    if heap.len() < k {
        heap.push(candidate);
    } else if let Some(worst) = heap.peek() {
        if candidate < *worst {
            heap.pop();
            heap.push(candidate);
        }
    }
}

/// Brute force index that performs exact nearest neighbor search.
///
/// This index computes distances to all stored vectors for each query,
/// guaranteeing 100% recall at the cost of O(n) search time.
pub struct BruteForceIndex<T: Element = f32> {
    vectors: Vec<Vec<T>>,
    ids: Vec<u32>,
    dimensions: usize,
    metric: Metric,
}

impl<T: Element> BruteForceIndex<T> {
    /// Create a new empty index with the given dimensionality and metric.
    pub fn new(dimensions: usize, metric: Metric) -> Self {
        Self {
            vectors: Vec::new(),
            ids: Vec::new(),
            dimensions,
            metric,
        }
    }

    /// Add a vector to the index under `id`.
    pub fn add(&mut self, id: u32, vector: Vec<T>) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(ForestError::dimension_mismatch(
                self.dimensions,
                vector.len(),
            ));
        }
        self.ids.push(id);
        self.vectors.push(vector);
        Ok(())
    }

    /// Return the number of vectors in the index.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Return true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn finish(&self, heap: BinaryHeap<Scored<T>>) -> Vec<SearchResult<T>> {
        heap.into_sorted_vec()
            .into_iter()
            .map(|s| SearchResult {
                id: ItemId(s.id),
                distance: self.metric.normalized_distance(s.score),
            })
            .collect()
    }

    /// Search for the k nearest neighbors using a linear scan.
    ///
    /// Returns results sorted by distance, ties broken by id.
    pub fn search(&self, query: &[T], k: usize) -> Vec<SearchResult<T>> {
        let mut heap = BinaryHeap::with_capacity(k + 1);
        for (&id, vector) in self.ids.iter().zip(&self.vectors) {
            let score = self.metric.distance(query, vector);
            offer(&mut heap, k, Scored { id, score });
        }
        self.finish(heap)
    }

    /// Parallel search using Rayon for multi-core scaling.
    ///
    /// Divides the vector set into chunks, processes each chunk in parallel,
    /// then merges results. Returns exactly what [`search`](Self::search)
    /// returns.
    pub fn search_parallel(&self, query: &[T], k: usize) -> Vec<SearchResult<T>> {
        let heap = self
            .vectors
            .par_chunks(CHUNK_SIZE)
            .zip(self.ids.par_chunks(CHUNK_SIZE))
            .map(|(vectors, ids)| {
                let mut local = BinaryHeap::with_capacity(k + 1);
                for (&id, vector) in ids.iter().zip(vectors) {
                    let score = self.metric.distance(query, vector);
                    offer(&mut local, k, Scored { id, score });
                }
                local
            })
            .reduce(
                || BinaryHeap::with_capacity(k + 1),
                |mut a, b| {
                    for item in b {
                        offer(&mut a, k, item);
                    }
                    a
                },
            );
        self.finish(heap)
    }

    /// Batch search for multiple queries in parallel.
    ///
    /// Processes all queries concurrently using Rayon, returning results
    /// for each query in the same order as the input.
    pub fn batch_search(&self, queries: &[Vec<T>], k: usize) -> Vec<Vec<SearchResult<T>>> {
        queries
            .par_iter()
            .map(|query| self.search(query, k))
            .collect()
    }
}

impl<T: Element> NearestNeighbors<T> for BruteForceIndex<T> {
    fn search(&self, query: &[T], k: usize) -> Result<Vec<SearchResult<T>>> {
        if query.len() != self.dimensions {
            return Err(ForestError::dimension_mismatch(
                self.dimensions,
                query.len(),
            ));
        }
        Ok(BruteForceIndex::search(self, query, k))
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
