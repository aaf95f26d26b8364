//! Index implementations for vector search.

pub mod brute_force;
pub(crate) mod builder;
pub mod dynamic;
pub mod forest;
pub mod search;
pub mod traits;

pub use brute_force::BruteForceIndex;
pub use dynamic::AnyIndex;
pub use forest::{AngularIndex, DotProductIndex, EuclideanIndex, ForestIndex, ManhattanIndex};
pub use search::SearchParams;
pub use traits::{unzip_results, NearestNeighbors, SearchResult};
