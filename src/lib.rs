//! forge-forest: memory-mappable random projection forests in Rust.
//!
//! This crate builds forests of randomized space-partitioning trees over
//! fixed-dimension vectors and answers approximate nearest neighbor queries
//! by item id or by query vector. A built forest is a flat array of
//! fixed-size records that can be saved and memory-mapped back without any
//! deserialization.
//!
//! # Features
//!
//! - **Four Metrics**: Angular, Euclidean, Manhattan, Dot Product
//! - **Two Scalar Widths**: `f32` (SIMD kernels with runtime CPU detection) and `f64`
//! - **Zero-Copy Loading**: saved indexes are served from a read-only mapping
//! - **On-Disk Builds**: grow the index straight into a file
//! - **Parallel Builds**: deterministic multi-threaded tree construction with Rayon
//! - **Brute Force Index**: Exact nearest neighbor search (ground truth baseline)
//!
//! # Example
//!
//! ```
//! use forge_forest::EuclideanIndex;
//!
//! let mut index = EuclideanIndex::<f32>::new(4).unwrap();
//! index.add_item(0, &[0.0, 0.0, 0.0, 0.0]).unwrap();
//! index.add_item(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
//! index.add_item(2, &[10.0, 0.0, 0.0, 0.0]).unwrap();
//! index.build(Some(10)).unwrap();
//!
//! let results = index.get_nns_by_item(0, 2, None).unwrap();
//! assert_eq!(results[0].id.0, 0);
//! assert_eq!(results[1].id.0, 1);
//! ```

pub mod config;
pub mod constants;
pub mod dataset;
pub mod distance;
pub mod element;
pub mod error;
pub mod index;
pub mod metrics;
pub mod node;
pub mod persistence;
pub mod random;
pub mod storage;
pub mod types;

// Re-export commonly used types at crate root
pub use config::IndexConfig;
pub use dataset::{recall_at_k, Dataset};
pub use distance::{Angular, Distance, DotProduct, Euclidean, Manhattan, Metric};
pub use element::{Element, ScalarType};
pub use error::{ForestError, Result};
pub use index::{
    AngularIndex, AnyIndex, BruteForceIndex, DotProductIndex, EuclideanIndex, ForestIndex,
    ManhattanIndex, NearestNeighbors, SearchParams, SearchResult,
};
pub use metrics::{ForestStatistics, SearchStatistics};
pub use persistence::Persistable;
pub use random::{Kiss32Random, Kiss64Random, Random};
pub use storage::BackendKind;
pub use types::{ItemId, NodeIndex};
