//! Metrics and statistics for index monitoring.
//!
//! Provides statistics about index state and search operations for
//! performance monitoring, capacity planning, and debugging.
//!
//! # Index Statistics
//!
//! Use [`ForestStatistics`] to understand the current state of a forest:
//!
//! ```ignore
//! let stats = index.statistics();
//! println!("{}", stats.summary());
//! // Output:
//! // ForestStatistics:
//! //   Items: 1000, Dimensions: 64
//! //   Trees: 10 (1843 split nodes, 1905 buckets)
//! //   Nodes: 4758 (stride 268 bytes, bucket capacity 66)
//! //   Storage: 1.22 MB (mapped)
//! ```
//!
//! # Search Statistics
//!
//! Use [`SearchStatistics`] to profile query performance:
//!
//! ```ignore
//! let (results, stats) = index.get_nns_by_vector_with_stats(&query, &SearchParams::new(10))?;
//! println!("Query took {:.3}ms, scored {} items", stats.query_time_ms(), stats.distances_computed);
//! ```

use crate::distance::Metric;
use crate::element::ScalarType;
use crate::storage::BackendKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Statistics about the current state of a forest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestStatistics {
    /// Distance metric of the index.
    pub metric: Metric,
    /// Scalar width of stored vectors.
    pub scalar: ScalarType,
    /// Vector dimension.
    pub dimensions: usize,
    /// Number of item slots (highest id + 1).
    pub n_items: usize,
    /// Number of trees.
    pub n_trees: usize,
    /// Total number of records in the arena.
    pub n_nodes: usize,
    /// Split nodes across all trees (root trailer excluded).
    pub split_nodes: usize,
    /// Bucket nodes across all trees (root trailer excluded).
    pub bucket_nodes: usize,
    /// Bytes per record.
    pub stride: usize,
    /// Item ids a bucket can hold.
    pub bucket_capacity: usize,
    /// Bytes held by the arena.
    pub bytes: usize,
    /// Where the records live.
    pub backend: BackendKind,
}

impl ForestStatistics {
    /// Mean number of nodes per tree, root trailer excluded.
    pub fn nodes_per_tree(&self) -> f64 {
        if self.n_trees == 0 {
            0.0
        } else {
            (self.split_nodes + self.bucket_nodes) as f64 / self.n_trees as f64
        }
    }

    /// Create a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "ForestStatistics:\n  \
             Metric: {} ({})\n  \
             Items: {}, Dimensions: {}\n  \
             Trees: {} ({} split nodes, {} buckets, {:.1} nodes/tree)\n  \
             Nodes: {} (stride {} bytes, bucket capacity {})\n  \
             Storage: {:.2} MB ({})",
            self.metric,
            self.scalar,
            self.n_items,
            self.dimensions,
            self.n_trees,
            self.split_nodes,
            self.bucket_nodes,
            self.nodes_per_tree(),
            self.n_nodes,
            self.stride,
            self.bucket_capacity,
            self.bytes as f64 / (1024.0 * 1024.0),
            self.backend
        )
    }
}

/// Statistics about a single search operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchStatistics {
    /// Total query execution time.
    pub query_time: Duration,
    /// Number of nodes popped from the priority queue.
    pub nodes_visited: usize,
    /// Candidates collected before deduplication.
    pub candidates_collected: usize,
    /// Distinct candidates after deduplication.
    pub distinct_candidates: usize,
    /// Number of exact distance computations performed.
    pub distances_computed: usize,
    /// The candidate bound the search ran with.
    pub search_k: usize,
}

impl SearchStatistics {
    /// Get query time in milliseconds.
    pub fn query_time_ms(&self) -> f32 {
        self.query_time.as_secs_f32() * 1000.0
    }

    /// Share of collected candidates that were duplicates.
    pub fn duplicate_ratio(&self) -> f32 {
        if self.candidates_collected == 0 {
            0.0
        } else {
            1.0 - self.distinct_candidates as f32 / self.candidates_collected as f32
        }
    }

    /// Create a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "SearchStatistics:\n  \
             Time: {:.3}ms\n  \
             search_k: {}\n  \
             Nodes visited: {}\n  \
             Candidates: {} ({} distinct, {:.1}% duplicates)\n  \
             Distances computed: {}",
            self.query_time_ms(),
            self.search_k,
            self.nodes_visited,
            self.candidates_collected,
            self.distinct_candidates,
            self.duplicate_ratio() * 100.0,
            self.distances_computed
        )
    }
}

/// Builder for collecting search statistics during a search operation.
#[derive(Default)]
pub struct SearchStatsBuilder {
    stats: SearchStatistics,
}

impl SearchStatsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the candidate bound.
    pub fn search_k(&mut self, search_k: usize) {
        self.stats.search_k = search_k;
    }

    /// Count one popped node.
    #[inline]
    pub fn visit_node(&mut self) {
        self.stats.nodes_visited += 1;
    }

    /// Add to the count of collected candidates.
    #[inline]
    pub fn add_candidates(&mut self, count: usize) {
        self.stats.candidates_collected += count;
    }

    /// Record the number of distinct candidates.
    pub fn distinct_candidates(&mut self, count: usize) {
        self.stats.distinct_candidates = count;
    }

    /// Add to the count of distances computed.
    pub fn add_distances(&mut self, count: usize) {
        self.stats.distances_computed += count;
    }

    /// Set the query execution time.
    pub fn set_query_time(&mut self, duration: Duration) {
        self.stats.query_time = duration;
    }

    /// Build the final statistics.
    pub fn build(self) -> SearchStatistics {
        self.stats
    }
}
