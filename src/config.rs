//! Index configuration.
//!
//! [`IndexConfig`] gathers everything needed to create an index. It is plain
//! data: it serializes with serde, so it can live in a settings file next to
//! the saved index, and every field except `dimensions` and `metric` has a
//! default.
//!
//! ```ignore
//! let config = IndexConfig::new(64, Metric::Angular)
//!     .with_seed(42)
//!     .with_n_threads(4);
//! let mut index = AnyIndex::from_config(&config)?;
//! ```

use crate::constants::random::DEFAULT_SEED;
use crate::distance::Metric;
use crate::element::ScalarType;
use crate::error::{ForestError, Result};
use serde::{Deserialize, Serialize};

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Parameters of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector dimensionality.
    pub dimensions: usize,
    /// Distance metric.
    pub metric: Metric,
    /// Scalar width of stored vectors.
    #[serde(default)]
    pub scalar: ScalarType,
    /// Seed of the per-tree random sources.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Emit per-tree progress at `info` level while building.
    #[serde(default)]
    pub verbose: bool,
    /// Populate mapped pages when loading.
    #[serde(default)]
    pub prefault: bool,
    /// Build trees on this many threads. `None` builds on the calling thread.
    #[serde(default)]
    pub n_threads: Option<usize>,
}

impl IndexConfig {
    /// Configuration with defaults for everything but the essentials.
    pub fn new(dimensions: usize, metric: Metric) -> Self {
        Self {
            dimensions,
            metric,
            scalar: ScalarType::default(),
            seed: DEFAULT_SEED,
            verbose: false,
            prefault: false,
            n_threads: None,
        }
    }

    /// Set the scalar width.
    pub fn with_scalar(mut self, scalar: ScalarType) -> Self {
        self.scalar = scalar;
        self
    }

    /// Set the build seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable build progress events.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enable or disable prefaulting on load.
    pub fn with_prefault(mut self, prefault: bool) -> Self {
        self.prefault = prefault;
        self
    }

    /// Build trees on `n_threads` threads.
    pub fn with_n_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = Some(n_threads);
        self
    }

    /// Check that the configuration describes a usable index.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(ForestError::invalid_parameter(
                "dimensions must be greater than zero",
            ));
        }
        if self.n_threads == Some(0) {
            return Err(ForestError::invalid_parameter(
                "n_threads must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = IndexConfig::new(16, Metric::Manhattan)
            .with_scalar(ScalarType::F64)
            .with_seed(7)
            .with_verbose(true)
            .with_prefault(true)
            .with_n_threads(2);
        assert_eq!(config.dimensions, 16);
        assert_eq!(config.scalar, ScalarType::F64);
        assert_eq!(config.seed, 7);
        assert!(config.verbose && config.prefault);
        assert_eq!(config.n_threads, Some(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(IndexConfig::new(0, Metric::Angular).validate().is_err());
        assert!(IndexConfig::new(3, Metric::Angular)
            .with_n_threads(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let config: IndexConfig =
            serde_json::from_str(r#"{"dimensions": 8, "metric": "dot"}"#).unwrap();
        assert_eq!(config, IndexConfig::new(8, Metric::DotProduct));

        let json = serde_json::to_string(&config.clone().with_scalar(ScalarType::F64)).unwrap();
        assert!(json.contains("\"f64\""));
        let back: IndexConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scalar, ScalarType::F64);
    }
}
