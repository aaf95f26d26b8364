//! Common traits for nearest-neighbor index implementations.
//!
//! These traits provide a unified interface over the forest and the exact
//! baseline, so evaluation code can work with either.

use crate::element::Element;
use crate::error::Result;
use crate::types::ItemId;

/// A search result containing an item id and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult<T = f32> {
    /// The id of the matched item.
    pub id: ItemId,
    /// The reported distance from the query.
    pub distance: T,
}

impl<T: Element> SearchResult<T> {
    /// Create a new SearchResult.
    #[inline]
    pub fn new(id: impl Into<ItemId>, distance: T) -> Self {
        Self {
            id: id.into(),
            distance,
        }
    }

    /// Create a SearchResult from a raw (u32, T) tuple.
    #[inline]
    pub fn from_tuple(tuple: (u32, T)) -> Self {
        Self {
            id: ItemId(tuple.0),
            distance: tuple.1,
        }
    }

    /// Convert to a raw (u32, T) tuple.
    #[inline]
    pub fn to_tuple(self) -> (u32, T) {
        (self.id.0, self.distance)
    }
}

impl<T: Element> From<(u32, T)> for SearchResult<T> {
    fn from(tuple: (u32, T)) -> Self {
        Self::from_tuple(tuple)
    }
}

impl<T: Element> From<SearchResult<T>> for (u32, T) {
    fn from(result: SearchResult<T>) -> Self {
        result.to_tuple()
    }
}

/// Split a result list into parallel id and distance vectors.
pub fn unzip_results<T: Element>(results: &[SearchResult<T>]) -> (Vec<u32>, Vec<T>) {
    results.iter().map(|r| r.to_tuple()).unzip()
}

/// Common interface for indexes that answer k-nearest-neighbor queries.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Queries take `&self` and are safe
/// to run from multiple threads at once.
pub trait NearestNeighbors<T: Element>: Send + Sync {
    /// The `k` items closest to `query`, closest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query length does not match the index.
    fn search(&self, query: &[T], k: usize) -> Result<Vec<SearchResult<T>>>;

    /// Return the number of items in the index.
    fn len(&self) -> usize;

    /// Return true if the index contains no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the dimensionality of vectors in this index.
    fn dimensions(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result() {
        let result = SearchResult::new(42u32, 0.5f32);
        assert_eq!(result.id, ItemId(42));
        assert_eq!(result.distance, 0.5);

        let tuple = result.to_tuple();
        assert_eq!(tuple, (42, 0.5));

        let from_tuple: SearchResult<f64> = (100, 1.5).into();
        assert_eq!(from_tuple.id.0, 100);
    }

    #[test]
    fn test_unzip_results() {
        let results = vec![SearchResult::new(3u32, 0.0f32), SearchResult::new(1u32, 2.0)];
        let (ids, distances) = unzip_results(&results);
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(distances, vec![0.0, 2.0]);
    }
}
