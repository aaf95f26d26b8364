//! Named constants for configuration values.
//!
//! This module centralizes the tunables of the forest builder, the random
//! sources and the node arena.

/// Constants for tree construction.
pub mod build {
    /// Iterations of the two-means refinement used to pick a split plane.
    pub const TWO_MEANS_ITERATIONS: usize = 200;

    /// Split attempts with fresh randomness before accepting an unbalanced split.
    pub const MAX_SPLIT_ATTEMPTS: usize = 3;

    /// A split is retried while its larger side holds at least this fraction.
    pub const SPLIT_IMBALANCE_RETRY: f64 = 0.95;

    /// Above this fraction the split is replaced by an alternating one.
    pub const SPLIT_IMBALANCE_FALLBACK: f64 = 0.99;

    /// With an automatic tree count, trees are added until the arena holds
    /// this many nodes per item.
    pub const AUTO_NODES_PER_ITEM: usize = 15;
}

/// Constants for the random sources.
pub mod random {
    /// Default seed of the KISS generators.
    pub const DEFAULT_SEED: u64 = 123_456_789;
}

/// Constants for the node arena.
pub mod storage {
    /// Growth factor of owned and on-disk arenas.
    pub const GROWTH_FACTOR: usize = 2;

    /// Minimum number of records allocated when an arena first grows.
    pub const MIN_CAPACITY: usize = 16;

    /// Width of a node reference (`n_descendants`, children, bucket ids).
    pub const REF_SIZE: usize = std::mem::size_of::<i32>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_thresholds_ordered() {
        assert!(build::SPLIT_IMBALANCE_RETRY < build::SPLIT_IMBALANCE_FALLBACK);
        assert!(build::SPLIT_IMBALANCE_FALLBACK < 1.0);
    }

    #[test]
    fn test_storage_constants() {
        assert_eq!(storage::REF_SIZE, 4);
        assert!(storage::GROWTH_FACTOR >= 2);
    }
}
