//! Runtime-selected forest.
//!
//! [`AnyIndex`] wraps one [`ForestIndex`] per (metric, scalar width) pair so
//! that both can be chosen from configuration or string tags. Vectors cross
//! the boundary as `f64` and are converted to the stored width.

use super::forest::{AngularIndex, DotProductIndex, EuclideanIndex, ForestIndex, ManhattanIndex};
use super::search::SearchParams;
use super::traits::{NearestNeighbors, SearchResult};
use crate::config::IndexConfig;
use crate::distance::{Distance, Metric};
use crate::element::{Element, ScalarType};
use crate::error::Result;
use crate::metrics::ForestStatistics;
use crate::persistence::Persistable;
use std::path::Path;

/// A forest whose metric and scalar width are chosen at runtime.
#[derive(Debug)]
pub enum AnyIndex {
    AngularF32(AngularIndex<f32>),
    AngularF64(AngularIndex<f64>),
    EuclideanF32(EuclideanIndex<f32>),
    EuclideanF64(EuclideanIndex<f64>),
    ManhattanF32(ManhattanIndex<f32>),
    ManhattanF64(ManhattanIndex<f64>),
    DotProductF32(DotProductIndex<f32>),
    DotProductF64(DotProductIndex<f64>),
}

macro_rules! dispatch {
    ($self:expr, $index:ident => $body:expr) => {
        match $self {
            AnyIndex::AngularF32($index) => $body,
            AnyIndex::AngularF64($index) => $body,
            AnyIndex::EuclideanF32($index) => $body,
            AnyIndex::EuclideanF64($index) => $body,
            AnyIndex::ManhattanF32($index) => $body,
            AnyIndex::ManhattanF64($index) => $body,
            AnyIndex::DotProductF32($index) => $body,
            AnyIndex::DotProductF64($index) => $body,
        }
    };
}

fn narrow<T: Element>(vector: &[f64]) -> Vec<T> {
    vector.iter().map(|&x| T::from_f64(x)).collect()
}

fn widen<T: Element>(results: Vec<SearchResult<T>>) -> Vec<SearchResult<f64>> {
    results
        .into_iter()
        .map(|r| SearchResult {
            id: r.id,
            distance: r.distance.to_f64(),
        })
        .collect()
}

fn add_item_to<T: Element, D: Distance>(
    index: &mut ForestIndex<T, D>,
    id: u32,
    vector: &[f64],
) -> Result<()> {
    index.add_item(id, &narrow::<T>(vector))
}

fn search_vector<T: Element, D: Distance>(
    index: &ForestIndex<T, D>,
    query: &[f64],
    params: &SearchParams,
) -> Result<Vec<SearchResult<f64>>> {
    index
        .get_nns_by_vector_with(&narrow::<T>(query), params)
        .map(widen)
}

impl AnyIndex {
    /// Create an empty index for `metric` over `scalar` components.
    pub fn new(dimensions: usize, metric: Metric, scalar: ScalarType) -> Result<Self> {
        Ok(match (metric, scalar) {
            (Metric::Angular, ScalarType::F32) => Self::AngularF32(ForestIndex::new(dimensions)?),
            (Metric::Angular, ScalarType::F64) => Self::AngularF64(ForestIndex::new(dimensions)?),
            (Metric::Euclidean, ScalarType::F32) => {
                Self::EuclideanF32(ForestIndex::new(dimensions)?)
            }
            (Metric::Euclidean, ScalarType::F64) => {
                Self::EuclideanF64(ForestIndex::new(dimensions)?)
            }
            (Metric::Manhattan, ScalarType::F32) => {
                Self::ManhattanF32(ForestIndex::new(dimensions)?)
            }
            (Metric::Manhattan, ScalarType::F64) => {
                Self::ManhattanF64(ForestIndex::new(dimensions)?)
            }
            (Metric::DotProduct, ScalarType::F32) => {
                Self::DotProductF32(ForestIndex::new(dimensions)?)
            }
            (Metric::DotProduct, ScalarType::F64) => {
                Self::DotProductF64(ForestIndex::new(dimensions)?)
            }
        })
    }

    /// Create an empty index from textual tags, e.g. `("angular", "float")`.
    ///
    /// # Errors
    /// `UnsupportedMetric` or `UnsupportedScalarType` for unknown tags.
    pub fn from_tags(dimensions: usize, metric: &str, scalar: &str) -> Result<Self> {
        let metric: Metric = metric.parse()?;
        let scalar: ScalarType = scalar.parse()?;
        Self::new(dimensions, metric, scalar)
    }

    /// Create an empty index from `config`, applying all of its settings.
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Ok(match (config.metric, config.scalar) {
            (Metric::Angular, ScalarType::F32) => Self::AngularF32(ForestIndex::with_config(config)?),
            (Metric::Angular, ScalarType::F64) => Self::AngularF64(ForestIndex::with_config(config)?),
            (Metric::Euclidean, ScalarType::F32) => {
                Self::EuclideanF32(ForestIndex::with_config(config)?)
            }
            (Metric::Euclidean, ScalarType::F64) => {
                Self::EuclideanF64(ForestIndex::with_config(config)?)
            }
            (Metric::Manhattan, ScalarType::F32) => {
                Self::ManhattanF32(ForestIndex::with_config(config)?)
            }
            (Metric::Manhattan, ScalarType::F64) => {
                Self::ManhattanF64(ForestIndex::with_config(config)?)
            }
            (Metric::DotProduct, ScalarType::F32) => {
                Self::DotProductF32(ForestIndex::with_config(config)?)
            }
            (Metric::DotProduct, ScalarType::F64) => {
                Self::DotProductF64(ForestIndex::with_config(config)?)
            }
        })
    }

    pub fn metric(&self) -> Metric {
        dispatch!(self, index => index.metric())
    }

    pub fn scalar(&self) -> ScalarType {
        dispatch!(self, index => index.scalar())
    }

    pub fn dimensions(&self) -> usize {
        dispatch!(self, index => index.dimensions())
    }

    /// Store `vector` as item `id`, converted to the index's scalar width.
    pub fn add_item(&mut self, id: u32, vector: &[f64]) -> Result<()> {
        dispatch!(self, index => add_item_to(index, id, vector))
    }

    pub fn reserve(&mut self, n_items: usize) -> Result<()> {
        dispatch!(self, index => index.reserve(n_items))
    }

    pub fn on_disk_build(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        dispatch!(self, index => index.on_disk_build(path))
    }

    pub fn build(&mut self, n_trees: Option<usize>) -> Result<()> {
        dispatch!(self, index => index.build(n_trees))
    }

    pub fn build_parallel(&mut self, n_trees: Option<usize>, n_threads: usize) -> Result<()> {
        dispatch!(self, index => index.build_parallel(n_trees, n_threads))
    }

    pub fn unbuild(&mut self) -> Result<()> {
        dispatch!(self, index => index.unbuild())
    }

    pub fn get_nns_by_item(
        &self,
        item: u32,
        n: usize,
        search_k: Option<usize>,
    ) -> Result<Vec<SearchResult<f64>>> {
        let params = SearchParams {
            search_k,
            ..SearchParams::new(n)
        };
        self.get_nns_by_item_with(item, &params)
    }

    pub fn get_nns_by_item_with(
        &self,
        item: u32,
        params: &SearchParams,
    ) -> Result<Vec<SearchResult<f64>>> {
        dispatch!(self, index => index.get_nns_by_item_with(item, params).map(widen))
    }

    pub fn get_nns_by_vector(
        &self,
        query: &[f64],
        n: usize,
        search_k: Option<usize>,
    ) -> Result<Vec<SearchResult<f64>>> {
        let params = SearchParams {
            search_k,
            ..SearchParams::new(n)
        };
        self.get_nns_by_vector_with(query, &params)
    }

    pub fn get_nns_by_vector_with(
        &self,
        query: &[f64],
        params: &SearchParams,
    ) -> Result<Vec<SearchResult<f64>>> {
        dispatch!(self, index => search_vector(index, query, params))
    }

    pub fn get_distance(&self, i: u32, j: u32) -> Result<f64> {
        dispatch!(self, index => index.get_distance(i, j).map(Element::to_f64))
    }

    /// Stored vector of item `id`, widened to `f64`.
    pub fn get_item_vector(&self, id: u32) -> Result<Vec<f64>> {
        dispatch!(self, index => index
            .get_item_vector(id)
            .map(|v| v.iter().map(|x| x.to_f64()).collect()))
    }

    pub fn n_items(&self) -> usize {
        dispatch!(self, index => index.n_items())
    }

    pub fn n_trees(&self) -> usize {
        dispatch!(self, index => index.n_trees())
    }

    pub fn is_built(&self) -> bool {
        dispatch!(self, index => index.is_built())
    }

    pub fn set_seed(&mut self, seed: u64) {
        dispatch!(self, index => index.set_seed(seed))
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        dispatch!(self, index => index.set_verbose(verbose))
    }

    pub fn statistics(&self) -> ForestStatistics {
        dispatch!(self, index => index.statistics())
    }
}

impl Persistable for AnyIndex {
    fn save(&mut self, path: impl AsRef<Path>, prefault: bool) -> Result<()> {
        let path = path.as_ref();
        dispatch!(self, index => index.save(path, prefault))
    }

    fn load(&mut self, path: impl AsRef<Path>, prefault: bool) -> Result<()> {
        let path = path.as_ref();
        dispatch!(self, index => index.load(path, prefault))
    }

    fn unload(&mut self) {
        dispatch!(self, index => index.unload())
    }
}

impl NearestNeighbors<f64> for AnyIndex {
    fn search(&self, query: &[f64], k: usize) -> Result<Vec<SearchResult<f64>>> {
        self.get_nns_by_vector(query, k, None)
    }

    fn len(&self) -> usize {
        self.n_items()
    }

    fn dimensions(&self) -> usize {
        AnyIndex::dimensions(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForestError;

    #[test]
    fn test_from_tags() {
        let index = AnyIndex::from_tags(4, "angular", "float").unwrap();
        assert_eq!(index.metric(), Metric::Angular);
        assert_eq!(index.scalar(), ScalarType::F32);

        let index = AnyIndex::from_tags(4, "dotProduct", "double").unwrap();
        assert!(matches!(index, AnyIndex::DotProductF64(_)));

        assert!(matches!(
            AnyIndex::from_tags(4, "hamming", "float"),
            Err(ForestError::UnsupportedMetric(_))
        ));
        assert!(matches!(
            AnyIndex::from_tags(4, "euclidean", "int32"),
            Err(ForestError::UnsupportedScalarType(_))
        ));
    }

    #[test]
    fn test_every_combination_answers_queries() {
        for metric in Metric::ALL {
            for scalar in [ScalarType::F32, ScalarType::F64] {
                let mut index = AnyIndex::new(3, metric, scalar).unwrap();
                index.add_item(0, &[1.0, 0.0, 0.0]).unwrap();
                index.add_item(1, &[0.9, 0.1, 0.0]).unwrap();
                index.add_item(2, &[-1.0, 0.0, 0.5]).unwrap();
                index.build(Some(3)).unwrap();

                assert_eq!(index.n_items(), 3);
                assert_eq!(index.n_trees(), 3);
                let results = index.get_nns_by_vector(&[1.0, 0.0, 0.0], 3, None).unwrap();
                assert_eq!(results.len(), 3, "{} {}", metric, scalar);
                assert_eq!(results[2].id.0, 2, "{} {}", metric, scalar);
            }
        }
    }

    #[test]
    fn test_vectors_are_converted() {
        let mut index = AnyIndex::new(2, Metric::Euclidean, ScalarType::F32).unwrap();
        index.add_item(0, &[0.5, 0.25]).unwrap();
        assert_eq!(index.get_item_vector(0).unwrap(), vec![0.5, 0.25]);
        assert!(matches!(
            index.add_item(1, &[0.5]),
            Err(ForestError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_from_config() {
        let config = IndexConfig::new(2, Metric::Manhattan)
            .with_scalar(ScalarType::F64)
            .with_seed(5);
        let index = AnyIndex::from_config(&config).unwrap();
        assert!(matches!(index, AnyIndex::ManhattanF64(ref inner) if inner.seed() == 5));
    }
}
