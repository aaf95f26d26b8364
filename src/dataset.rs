//! Dataset utilities for generating and evaluating vector search.

use crate::distance::Metric;
use crate::error::Result;
use crate::index::brute_force::BruteForceIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// A dataset containing vectors, queries, and ground truth for evaluation.
///
/// Vector `i` is meant to be added to an index as item `i`.
pub struct Dataset {
    pub dimensions: usize,
    pub vectors: Vec<Vec<f32>>,
    pub queries: Vec<Vec<f32>>,
    pub ground_truth: Vec<Vec<u32>>,
}

impl Dataset {
    /// Generate a random synthetic dataset.
    ///
    /// Creates `n_vectors` vectors and `n_queries` query vectors with
    /// components uniform in `[-1, 1)`, reproducibly from `seed`.
    pub fn generate(n_vectors: usize, n_queries: usize, dim: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut random_vector = || -> Vec<f32> {
            (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
        };

        let vectors: Vec<Vec<f32>> = (0..n_vectors).map(|_| random_vector()).collect();
        let queries: Vec<Vec<f32>> = (0..n_queries).map(|_| random_vector()).collect();

        Self {
            dimensions: dim,
            vectors,
            queries,
            ground_truth: Vec::new(),
        }
    }

    /// Compute ground truth nearest neighbors using brute force search.
    ///
    /// For each query, finds the k nearest neighbors under `metric` and
    /// stores their ids.
    pub fn compute_ground_truth(&mut self, k: usize, metric: Metric) -> Result<()> {
        let mut index = BruteForceIndex::new(self.dimensions, metric);
        for (i, vector) in self.vectors.iter().enumerate() {
            index.add(i as u32, vector.clone())?;
        }

        self.ground_truth = index
            .batch_search(&self.queries, k)
            .into_iter()
            .map(|results| results.into_iter().map(|r| r.id.0).collect())
            .collect();
        Ok(())
    }
}

/// Compute recall@k between predicted and ground truth results.
///
/// Recall is the fraction of true nearest neighbors that were found.
/// Returns a value between 0.0 and 1.0.
pub fn recall_at_k(predicted: &[u32], ground_truth: &[u32], k: usize) -> f32 {
    if k == 0 {
        return 1.0;
    }
    let pred_set: HashSet<u32> = predicted.iter().take(k).copied().collect();
    let truth_set: HashSet<u32> = ground_truth.iter().take(k).copied().collect();

    let intersection = pred_set.intersection(&truth_set).count();
    intersection as f32 / k as f32
}
