//! Random projection forest index.
//!
//! [`ForestIndex`] is the typed engine: scalar width `T`, metric policy `D`
//! and random source `R` are all resolved at compile time. Items are written
//! into the leaf region of an [`Arena`], [`build`](ForestIndex::build) grows
//! the trees behind them, and queries walk every tree at once through a
//! single priority queue.
//!
//! # Lifecycle
//!
//! ```text
//! new ─► add_item* ─► build ─► get_nns_* / save ─► unbuild ─► add_item* ...
//!                                    │
//!                                    └─► load / unload (persistence)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use forge_forest::{EuclideanIndex, SearchParams};
//!
//! let mut index = EuclideanIndex::<f32>::new(4)?;
//! index.add_item(0, &[0.0, 0.0, 0.0, 0.0])?;
//! index.add_item(1, &[1.0, 0.0, 0.0, 0.0])?;
//! index.add_item(2, &[10.0, 0.0, 0.0, 0.0])?;
//! index.build(Some(10))?;
//!
//! let results = index.get_nns_by_item(0, 2, None)?;
//! assert_eq!(results[0].id.0, 0);
//! assert_eq!(results[1].id.0, 1);
//! ```

use super::builder::{
    append_root_trailer, build_parallel, build_sequential, preprocess, BuildPlan,
};
use super::search::{QueryEngine, SearchParams};
use super::traits::{NearestNeighbors, SearchResult};
use crate::config::IndexConfig;
use crate::constants::random::DEFAULT_SEED;
use crate::distance::{Angular, Distance, DotProduct, Euclidean, Manhattan, Metric};
use crate::element::{Element, ScalarType};
use crate::error::{ForestError, Result};
use crate::metrics::{ForestStatistics, SearchStatistics, SearchStatsBuilder};
use crate::node::NodeLayout;
use crate::persistence::LoadedForest;
use crate::random::{Kiss32Random, Random};
use crate::storage::{Arena, BackendKind};
use crate::types::NodeIndex;
use std::marker::PhantomData;
use std::path::Path;
use std::time::Instant;

/// Forest of random projection trees over items of type `[T]`.
///
/// # Thread Safety
///
/// Queries take `&self` and may run concurrently; adding items, building and
/// loading take `&mut self`.
#[derive(Debug)]
pub struct ForestIndex<T: Element, D: Distance, R: Random = Kiss32Random> {
    layout: NodeLayout,
    arena: Arena,
    n_items: usize,
    /// Indices of the root copies in the trailer; empty until built.
    roots: Vec<usize>,
    seed: u64,
    verbose: bool,
    prefault: bool,
    n_threads: Option<usize>,
    _policy: PhantomData<fn() -> (T, D, R)>,
}

/// Angular forest.
pub type AngularIndex<T = f32> = ForestIndex<T, Angular>;
/// Euclidean forest.
pub type EuclideanIndex<T = f32> = ForestIndex<T, Euclidean>;
/// Manhattan forest.
pub type ManhattanIndex<T = f32> = ForestIndex<T, Manhattan>;
/// Maximum inner product forest.
pub type DotProductIndex<T = f32> = ForestIndex<T, DotProduct>;

impl<T: Element, D: Distance, R: Random> ForestIndex<T, D, R> {
    /// Create an empty in-memory index over `dimensions`-dimensional vectors.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(ForestError::invalid_parameter(
                "dimensions must be greater than zero",
            ));
        }
        let layout = NodeLayout::of::<T>(D::METRIC, dimensions);
        Ok(Self {
            layout,
            arena: Arena::new(layout),
            n_items: 0,
            roots: Vec::new(),
            seed: DEFAULT_SEED,
            verbose: false,
            prefault: false,
            n_threads: None,
            _policy: PhantomData,
        })
    }

    /// Create an empty index from `config`.
    ///
    /// # Errors
    /// Returns `ConfigMismatch` if the configured metric or scalar width is
    /// not the one of this index type, or the error of
    /// [`IndexConfig::validate`].
    pub fn with_config(config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        if config.metric != D::METRIC {
            return Err(ForestError::config_mismatch(format!(
                "config asks for metric {}, index type uses {}",
                config.metric,
                D::METRIC
            )));
        }
        if config.scalar != T::SCALAR {
            return Err(ForestError::config_mismatch(format!(
                "config asks for scalar {}, index type uses {}",
                config.scalar,
                T::SCALAR
            )));
        }

        let mut index = Self::new(config.dimensions)?;
        index.seed = config.seed;
        index.verbose = config.verbose;
        index.prefault = config.prefault;
        index.n_threads = config.n_threads;
        Ok(index)
    }

    fn check_mutable(&self) -> Result<()> {
        if self.arena.is_read_only() {
            return Err(ForestError::ReadOnly);
        }
        if self.is_built() {
            return Err(ForestError::IndexAlreadyBuilt);
        }
        Ok(())
    }

    fn check_dimensions(&self, vector: &[T]) -> Result<()> {
        if vector.len() != self.layout.dimensions {
            return Err(ForestError::dimension_mismatch(
                self.layout.dimensions,
                vector.len(),
            ));
        }
        Ok(())
    }

    fn check_item(&self, item: u32) -> Result<()> {
        if item as usize >= self.n_items {
            return Err(ForestError::item_out_of_range(item, self.n_items));
        }
        Ok(())
    }

    /// Store `vector` as item `id`, overwriting any previous vector.
    ///
    /// Ids need not be contiguous; slots of ids never added hold empty
    /// records that are never returned by queries.
    ///
    /// # Errors
    /// - `ReadOnly` on a loaded index, `IndexAlreadyBuilt` after `build`
    /// - `DimensionMismatch` if `vector` has the wrong length
    /// - `ItemIdTooLarge` if `id` does not fit a node reference
    /// - `OutOfMemory` if storage for the slot cannot be allocated
    pub fn add_item(&mut self, id: u32, vector: &[T]) -> Result<()> {
        self.check_mutable()?;
        self.check_dimensions(vector)?;
        if id > i32::MAX as u32 {
            return Err(ForestError::ItemIdTooLarge(u64::from(id)));
        }

        let slot = id as usize;
        if slot >= self.n_items {
            self.arena.resize(slot + 1)?;
            self.n_items = slot + 1;
        }
        let mut node = self.arena.node_mut::<T>(slot)?;
        node.set_n_descendants(1);
        node.set_extra(T::ZERO);
        node.vector_mut().copy_from_slice(vector);
        Ok(())
    }

    /// Make room for `n_items` items without further reallocation.
    pub fn reserve(&mut self, n_items: usize) -> Result<()> {
        self.arena
            .reserve(n_items.saturating_sub(self.arena.n_nodes()))
    }

    /// Write all nodes straight to `path` while building, instead of
    /// keeping them in memory.
    ///
    /// Must be called before any item is added. The file is created or
    /// truncated; after `build` it holds the complete index and can be
    /// loaded directly.
    pub fn on_disk_build(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.check_mutable()?;
        if self.n_items > 0 {
            return Err(ForestError::invalid_parameter(
                "on_disk_build must be called before adding items",
            ));
        }
        self.arena = Arena::on_disk(self.layout, path.as_ref())?;
        Ok(())
    }

    fn build_plan(&self, n_trees: Option<usize>) -> Result<BuildPlan> {
        self.check_mutable()?;
        if n_trees == Some(0) {
            return Err(ForestError::invalid_parameter(
                "n_trees must be greater than zero",
            ));
        }
        if self.n_items == 0 {
            return Err(ForestError::EmptyIndex);
        }
        Ok(BuildPlan {
            n_items: self.n_items,
            n_trees,
            seed: self.seed,
            verbose: self.verbose,
        })
    }

    /// Build `n_trees` trees, or with `None`, as many as fit a budget of
    /// nodes proportional to the item count.
    ///
    /// Uses the configured thread count if one was set with
    /// [`IndexConfig::with_n_threads`]; the result is the same either way.
    ///
    /// # Errors
    /// - `EmptyIndex` without items
    /// - `IndexAlreadyBuilt` / `ReadOnly` as for `add_item`
    /// - `InvalidParameter` for `Some(0)`
    /// - `OutOfMemory` if the trees do not fit in memory; the index is then
    ///   left unbuilt with its items
    pub fn build(&mut self, n_trees: Option<usize>) -> Result<()> {
        match self.n_threads {
            Some(n_threads) if n_threads > 1 => self.build_parallel(n_trees, n_threads),
            _ => {
                let plan = self.build_plan(n_trees)?;
                self.run_build(&plan, |arena, plan| {
                    build_sequential::<T, D, R>(arena, plan)
                })
            }
        }
    }

    /// Build trees on a pool of `n_threads` threads.
    ///
    /// Produces exactly the forest [`build`](Self::build) would with the
    /// same seed.
    pub fn build_parallel(&mut self, n_trees: Option<usize>, n_threads: usize) -> Result<()> {
        let plan = self.build_plan(n_trees)?;
        if n_threads == 0 {
            return Err(ForestError::invalid_parameter(
                "n_threads must be greater than zero",
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|err| {
                ForestError::invalid_parameter(format!("cannot start build threads: {}", err))
            })?;
        self.run_build(&plan, |arena, plan| {
            build_parallel::<T, D, R>(arena, plan, &pool)
        })
    }

    fn run_build<F>(&mut self, plan: &BuildPlan, grow: F) -> Result<()>
    where
        F: FnOnce(&mut Arena, &BuildPlan) -> Result<Vec<usize>>,
    {
        let start = Instant::now();
        let result = preprocess::<T, D>(&mut self.arena, self.n_items)
            .and_then(|()| grow(&mut self.arena, plan))
            .and_then(|roots| append_root_trailer(&mut self.arena, &roots))
            .and_then(|roots| self.arena.shrink_to_fit().map(|()| roots));

        match result {
            Ok(roots) => {
                self.roots = roots;
                if self.verbose {
                    tracing::info!(
                        n_trees = self.roots.len(),
                        n_nodes = self.arena.n_nodes(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "forest built"
                    );
                }
                Ok(())
            }
            Err(err) => {
                if let Err(rollback) = self.arena.truncate(self.n_items) {
                    tracing::warn!(error = %rollback, "failed to roll back partial build");
                }
                Err(err)
            }
        }
    }

    /// Drop every tree, keeping the items. Does nothing if not built.
    ///
    /// # Errors
    /// Returns `ReadOnly` on a loaded index.
    pub fn unbuild(&mut self) -> Result<()> {
        if !self.is_built() {
            return Ok(());
        }
        self.arena.truncate(self.n_items)?;
        self.roots.clear();
        tracing::debug!(n_items = self.n_items, "forest unbuilt");
        Ok(())
    }

    /// The `n` items closest to item `item`.
    ///
    /// `search_k` bounds the candidates inspected; `None` means
    /// `n * n_trees`. The item itself is included (at distance zero) unless
    /// excluded through [`SearchParams::excluding_self`].
    pub fn get_nns_by_item(
        &self,
        item: u32,
        n: usize,
        search_k: Option<usize>,
    ) -> Result<Vec<SearchResult<T>>> {
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
    ) -> Result<Vec<SearchResult<T>>> {
        let mut stats = SearchStatsBuilder::new();
        self.search_item(item, params, &mut stats)
    }

    /// [`get_nns_by_item_with`](Self::get_nns_by_item_with) plus statistics
    /// about the traversal.
    pub fn get_nns_by_item_with_stats(
        &self,
        item: u32,
        params: &SearchParams,
    ) -> Result<(Vec<SearchResult<T>>, SearchStatistics)> {
        let start = Instant::now();
        let mut stats = SearchStatsBuilder::new();
        let results = self.search_item(item, params, &mut stats)?;
        stats.set_query_time(start.elapsed());
        Ok((results, stats.build()))
    }

    fn search_item(
        &self,
        item: u32,
        params: &SearchParams,
        stats: &mut SearchStatsBuilder,
    ) -> Result<Vec<SearchResult<T>>> {
        self.check_item(item)?;
        let query = self.arena.node::<T>(item as usize).vector();
        let exclude = params.exclude_self.then_some(item);
        Ok(self.engine().search(query, params, exclude, stats))
    }

    /// The `n` items closest to `query`.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if `query` has the wrong length.
    pub fn get_nns_by_vector(
        &self,
        query: &[T],
        n: usize,
        search_k: Option<usize>,
    ) -> Result<Vec<SearchResult<T>>> {
        let params = SearchParams {
            search_k,
            ..SearchParams::new(n)
        };
        self.get_nns_by_vector_with(query, &params)
    }

    pub fn get_nns_by_vector_with(
        &self,
        query: &[T],
        params: &SearchParams,
    ) -> Result<Vec<SearchResult<T>>> {
        self.check_dimensions(query)?;
        let mut stats = SearchStatsBuilder::new();
        Ok(self.engine().search(query, params, None, &mut stats))
    }

    /// [`get_nns_by_vector_with`](Self::get_nns_by_vector_with) plus
    /// statistics about the traversal.
    pub fn get_nns_by_vector_with_stats(
        &self,
        query: &[T],
        params: &SearchParams,
    ) -> Result<(Vec<SearchResult<T>>, SearchStatistics)> {
        self.check_dimensions(query)?;
        let start = Instant::now();
        let mut stats = SearchStatsBuilder::new();
        let results = self.engine().search(query, params, None, &mut stats);
        stats.set_query_time(start.elapsed());
        Ok((results, stats.build()))
    }

    fn engine(&self) -> QueryEngine<'_, T, D> {
        QueryEngine::new(&self.arena, &self.roots, self.n_items)
    }

    /// Reported distance between items `i` and `j`.
    pub fn get_distance(&self, i: u32, j: u32) -> Result<T> {
        self.check_item(i)?;
        self.check_item(j)?;
        let a = self.arena.node::<T>(i as usize).vector();
        let b = self.arena.node::<T>(j as usize).vector();
        Ok(D::normalized_distance(D::distance(a, b)))
    }

    /// Stored vector of item `id`. Ids that were never added read as zeros.
    pub fn get_item_vector(&self, id: u32) -> Result<&[T]> {
        self.check_item(id)?;
        Ok(self.arena.node::<T>(id as usize).vector())
    }

    /// Number of item slots: the highest id added plus one.
    #[inline]
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.roots.len()
    }

    /// Total number of records, trees and root trailer included.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.arena.n_nodes()
    }

    #[inline]
    pub fn dimensions(&self) -> usize {
        self.layout.dimensions
    }

    #[inline]
    pub fn metric(&self) -> Metric {
        D::METRIC
    }

    #[inline]
    pub fn scalar(&self) -> ScalarType {
        T::SCALAR
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        !self.roots.is_empty()
    }

    /// True once loaded from a file; such an index only answers queries.
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.arena.is_read_only()
    }

    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    /// Arena positions of the tree roots.
    pub fn roots(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.roots.iter().copied().map(NodeIndex)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed of the next build. Tree `t` is grown from `seed + t`.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Report per-tree build progress at `info` level.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Whether loads populate the mapping up front by default.
    pub fn prefault(&self) -> bool {
        self.prefault
    }

    /// Summary of the forest's shape and storage.
    pub fn statistics(&self) -> ForestStatistics {
        let n_nodes = self.arena.n_nodes();
        let capacity = self.layout.bucket_capacity;
        let trees_end = n_nodes - self.roots.len();

        let (mut split_nodes, mut bucket_nodes) = (0, 0);
        for index in self.n_items.min(trees_end)..trees_end {
            if self.arena.node::<T>(index).n_descendants() > capacity {
                split_nodes += 1;
            } else {
                bucket_nodes += 1;
            }
        }

        ForestStatistics {
            metric: D::METRIC,
            scalar: T::SCALAR,
            dimensions: self.layout.dimensions,
            n_items: self.n_items,
            n_trees: self.roots.len(),
            n_nodes,
            split_nodes,
            bucket_nodes,
            stride: self.layout.stride,
            bucket_capacity: capacity,
            bytes: self.arena.bytes().len(),
            backend: self.arena.backend_kind(),
        }
    }

    pub(crate) fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Where the records currently live.
    pub fn backend(&self) -> BackendKind {
        self.arena.backend_kind()
    }

    /// Replace the contents of the index with a loaded forest.
    pub(crate) fn install(&mut self, loaded: LoadedForest) {
        self.arena = loaded.arena;
        self.n_items = loaded.forest.n_items;
        self.roots = loaded.forest.roots;
    }

    /// Back to an empty in-memory index with the same parameters.
    pub(crate) fn reset(&mut self) {
        self.arena = Arena::new(self.layout);
        self.n_items = 0;
        self.roots.clear();
    }
}

impl<T: Element, D: Distance, R: Random> NearestNeighbors<T> for ForestIndex<T, D, R> {
    fn search(&self, query: &[T], k: usize) -> Result<Vec<SearchResult<T>>> {
        self.get_nns_by_vector(query, k, None)
    }

    fn len(&self) -> usize {
        self.n_items
    }

    fn dimensions(&self) -> usize {
        self.layout.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::Kiss64Random;
    use crate::types::ItemId;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_vectors(n: usize, dims: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect()
    }

    fn filled<D: Distance>(vectors: &[Vec<f32>]) -> ForestIndex<f32, D> {
        let mut index = ForestIndex::<f32, D>::new(vectors[0].len()).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            index.add_item(i as u32, v).unwrap();
        }
        index
    }

    #[test]
    fn test_three_points_on_a_line() {
        let mut index = EuclideanIndex::<f32>::new(4).unwrap();
        index.add_item(0, &[0.0, 0.0, 0.0, 0.0]).unwrap();
        index.add_item(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add_item(2, &[10.0, 0.0, 0.0, 0.0]).unwrap();
        index.set_seed(42);
        index.build(Some(10)).unwrap();

        assert_eq!(index.n_trees(), 10);
        let results = index.get_nns_by_item(0, 2, Some(50)).unwrap();
        let ids: Vec<u32> = results.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(results[0].distance.abs() < 1e-6);
        assert!((results[1].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_new_rejects_zero_dimensions() {
        assert!(matches!(
            AngularIndex::<f32>::new(0),
            Err(ForestError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_with_config() {
        let config = IndexConfig::new(8, Metric::Manhattan)
            .with_seed(99)
            .with_verbose(true);
        let index = ManhattanIndex::<f32>::with_config(&config).unwrap();
        assert_eq!(index.seed(), 99);
        assert_eq!(index.dimensions(), 8);

        assert!(matches!(
            EuclideanIndex::<f32>::with_config(&config),
            Err(ForestError::ConfigMismatch(_))
        ));
        assert!(matches!(
            ManhattanIndex::<f64>::with_config(&config),
            Err(ForestError::ConfigMismatch(_))
        ));
    }

    #[test]
    fn test_add_item_errors() {
        let mut index = EuclideanIndex::<f32>::new(3).unwrap();
        assert!(matches!(
            index.add_item(0, &[1.0, 2.0]),
            Err(ForestError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(matches!(
            index.add_item(u32::MAX, &[1.0, 2.0, 3.0]),
            Err(ForestError::ItemIdTooLarge(_))
        ));
        assert_eq!(index.n_items(), 0);
    }

    #[test]
    fn test_add_item_fails_when_storage_cannot_grow() {
        let dims = 1_000_000;
        let mut index = EuclideanIndex::<f32>::new(dims).unwrap();
        let vector = vec![0.5f32; dims];
        assert!(matches!(
            index.add_item(i32::MAX as u32, &vector),
            Err(ForestError::OutOfMemory { .. })
        ));
        assert_eq!(index.n_items(), 0);

        index.add_item(0, &vector).unwrap();
        assert_eq!(index.n_items(), 1);
    }

    #[test]
    fn test_add_item_overwrites() {
        let mut index = EuclideanIndex::<f32>::new(2).unwrap();
        index.add_item(0, &[1.0, 1.0]).unwrap();
        index.add_item(0, &[2.0, 3.0]).unwrap();
        assert_eq!(index.n_items(), 1);
        assert_eq!(index.get_item_vector(0).unwrap(), &[2.0, 3.0]);
    }

    #[test]
    fn test_sparse_ids_are_never_returned() {
        let mut index = EuclideanIndex::<f32>::new(2).unwrap();
        index.add_item(0, &[0.0, 0.0]).unwrap();
        index.add_item(5, &[0.1, 0.0]).unwrap();
        assert_eq!(index.n_items(), 6);
        assert_eq!(index.get_item_vector(3).unwrap(), &[0.0, 0.0]);

        index.build(Some(2)).unwrap();
        let results = index.get_nns_by_vector(&[0.0, 0.0], 10, Some(100)).unwrap();
        let ids: Vec<ItemId> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![ItemId(0), ItemId(5)]);
    }

    #[test]
    fn test_build_errors() {
        let mut index = AngularIndex::<f32>::new(2).unwrap();
        assert!(matches!(index.build(None), Err(ForestError::EmptyIndex)));

        index.add_item(0, &[1.0, 0.0]).unwrap();
        assert!(matches!(
            index.build(Some(0)),
            Err(ForestError::InvalidParameter(_))
        ));

        index.build(Some(1)).unwrap();
        assert!(matches!(
            index.build(Some(1)),
            Err(ForestError::IndexAlreadyBuilt)
        ));
        assert!(matches!(
            index.add_item(1, &[0.0, 1.0]),
            Err(ForestError::IndexAlreadyBuilt)
        ));
    }

    #[test]
    fn test_unbuild_is_idempotent() {
        let vectors = random_vectors(200, 8, 1);
        let mut index = filled::<Angular>(&vectors);
        index.unbuild().unwrap();

        index.build(Some(3)).unwrap();
        let built_nodes = index.n_nodes();
        assert!(built_nodes > 200);

        index.unbuild().unwrap();
        index.unbuild().unwrap();
        assert!(!index.is_built());
        assert_eq!(index.n_nodes(), 200);
        assert_eq!(index.n_items(), 200);

        index.add_item(200, &vectors[0]).unwrap();
        index.build(Some(3)).unwrap();
        assert_eq!(index.n_items(), 201);
    }

    #[test]
    fn test_failed_build_rolls_back_to_items() {
        let vectors = random_vectors(120, 4, 9);
        let mut index = filled::<Euclidean>(&vectors);
        let plan = index.build_plan(Some(4)).unwrap();

        let err = index
            .run_build(&plan, |arena, plan| {
                build_sequential::<f32, Euclidean, Kiss32Random>(arena, plan)?;
                assert!(arena.n_nodes() > 120);
                Err(ForestError::out_of_memory(usize::MAX, arena.layout().stride))
            })
            .unwrap_err();
        assert!(matches!(err, ForestError::OutOfMemory { .. }));
        assert!(!index.is_built());
        assert_eq!(index.n_trees(), 0);
        assert_eq!(index.n_nodes(), 120);
        assert_eq!(index.get_item_vector(7).unwrap(), &vectors[7][..]);

        index.build(Some(4)).unwrap();
        assert_eq!(index.n_trees(), 4);
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let vectors = random_vectors(300, 6, 2);
        let mut a = filled::<Euclidean>(&vectors);
        let mut b = filled::<Euclidean>(&vectors);
        a.build(Some(5)).unwrap();
        b.build(Some(5)).unwrap();
        assert_eq!(a.arena().bytes(), b.arena().bytes());

        let first = a.arena().bytes().to_vec();
        a.unbuild().unwrap();
        a.build(Some(5)).unwrap();
        assert_eq!(a.arena().bytes(), &first[..]);

        let mut c = filled::<Euclidean>(&vectors);
        c.set_seed(1);
        c.build(Some(5)).unwrap();
        assert_ne!(c.arena().bytes(), &first[..]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let vectors = random_vectors(400, 10, 3);
        let mut sequential = filled::<Angular>(&vectors);
        let mut parallel = filled::<Angular>(&vectors);
        sequential.build(None).unwrap();
        parallel.build_parallel(None, 4).unwrap();
        assert_eq!(sequential.n_trees(), parallel.n_trees());
        assert_eq!(sequential.arena().bytes(), parallel.arena().bytes());
    }

    #[test]
    fn test_configured_threads_match_sequential() {
        let vectors = random_vectors(150, 4, 4);
        let config = IndexConfig::new(4, Metric::Euclidean).with_n_threads(3);
        let mut threaded = EuclideanIndex::<f32>::with_config(&config).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            threaded.add_item(i as u32, v).unwrap();
        }
        let mut sequential = filled::<Euclidean>(&vectors);
        threaded.build(Some(7)).unwrap();
        sequential.build(Some(7)).unwrap();
        assert_eq!(threaded.arena().bytes(), sequential.arena().bytes());
    }

    #[test]
    fn test_self_is_nearest() {
        let vectors = random_vectors(500, 16, 5);
        let mut index = filled::<Euclidean>(&vectors);
        index.build(Some(10)).unwrap();

        for item in [0u32, 17, 250, 499] {
            let results = index.get_nns_by_item(item, 1, None).unwrap();
            assert_eq!(results[0].id.0, item);
            assert!(results[0].distance.abs() < 1e-6);
        }
    }

    #[test]
    fn test_exclude_self() {
        let vectors = random_vectors(100, 4, 6);
        let mut index = filled::<Manhattan>(&vectors);
        index.build(Some(5)).unwrap();

        let params = SearchParams::new(5).with_search_k(500).excluding_self();
        let results = index.get_nns_by_item_with(10, &params).unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.id.0 != 10));
    }

    #[test]
    fn test_query_errors_and_unbuilt() {
        let mut index = EuclideanIndex::<f32>::new(2).unwrap();
        assert!(matches!(
            index.get_nns_by_item(0, 1, None),
            Err(ForestError::ItemOutOfRange { .. })
        ));

        index.add_item(0, &[1.0, 0.0]).unwrap();
        assert!(index.get_nns_by_item(0, 1, None).unwrap().is_empty());
        assert!(index.get_nns_by_vector(&[1.0, 0.0], 1, None).unwrap().is_empty());
        assert!(matches!(
            index.get_nns_by_vector(&[1.0], 1, None),
            Err(ForestError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            index.get_nns_by_item(1, 1, None),
            Err(ForestError::ItemOutOfRange { id: 1, n_items: 1 })
        ));
    }

    #[test]
    fn test_get_distance() {
        let mut index = EuclideanIndex::<f64>::new(2).unwrap();
        index.add_item(0, &[0.0, 0.0]).unwrap();
        index.add_item(1, &[3.0, 4.0]).unwrap();
        assert!((index.get_distance(0, 1).unwrap() - 5.0).abs() < 1e-12);
        assert!(index.get_distance(0, 2).is_err());

        let mut angular = AngularIndex::<f32>::new(2).unwrap();
        angular.add_item(0, &[1.0, 0.0]).unwrap();
        angular.add_item(1, &[0.0, 5.0]).unwrap();
        assert!((angular.get_distance(0, 1).unwrap() - 2.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_dot_product_ranks_by_inner_product() {
        let mut index = DotProductIndex::<f32>::new(2).unwrap();
        index.add_item(0, &[1.0, 0.0]).unwrap();
        index.add_item(1, &[2.0, 0.0]).unwrap();
        index.add_item(2, &[0.0, 3.0]).unwrap();
        index.build(Some(2)).unwrap();

        let results = index.get_nns_by_vector(&[1.0, 0.0], 3, Some(20)).unwrap();
        let ids: Vec<u32> = results.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        assert!((results[0].distance - 2.0).abs() < 1e-6);
        assert!((results[1].distance - 1.0).abs() < 1e-6);
        assert!(results[2].distance.abs() < 1e-6);
    }

    #[test]
    fn test_identical_vectors_terminate() {
        let vectors = vec![vec![0.5f32; 8]; 300];
        let mut index = filled::<Angular>(&vectors);
        index.build(Some(3)).unwrap();
        let results = index.get_nns_by_item(0, 10, Some(900)).unwrap();
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.distance.abs() < 1e-6));
    }

    #[test]
    fn test_statistics() {
        let vectors = random_vectors(250, 4, 7);
        let mut index = filled::<Euclidean>(&vectors);
        index.build(Some(4)).unwrap();

        let stats = index.statistics();
        assert_eq!(stats.n_items, 250);
        assert_eq!(stats.n_trees, 4);
        assert_eq!(stats.backend, BackendKind::Owned);
        assert_eq!(
            stats.n_items + stats.split_nodes + stats.bucket_nodes + stats.n_trees,
            stats.n_nodes
        );
        assert!(stats.split_nodes >= 4);
        assert_eq!(stats.bytes, stats.n_nodes * stats.stride);
    }

    #[test]
    fn test_roots_point_at_trailer() {
        let vectors = random_vectors(60, 3, 8);
        let mut index = filled::<Euclidean>(&vectors);
        index.build(Some(3)).unwrap();
        let n_nodes = index.n_nodes();
        let roots: Vec<NodeIndex> = index.roots().collect();
        assert_eq!(
            roots,
            vec![
                NodeIndex(n_nodes - 3),
                NodeIndex(n_nodes - 2),
                NodeIndex(n_nodes - 1)
            ]
        );
    }

    #[test]
    fn test_kiss64_source() {
        let vectors = random_vectors(120, 5, 9);
        let mut index = ForestIndex::<f32, Euclidean, Kiss64Random>::new(5).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            index.add_item(i as u32, v).unwrap();
        }
        index.build(Some(4)).unwrap();
        assert_eq!(index.get_nns_by_item(7, 1, None).unwrap()[0].id.0, 7);
    }

    #[test]
    fn test_nearest_neighbors_trait() {
        let vectors = random_vectors(50, 3, 10);
        let mut index = filled::<Euclidean>(&vectors);
        index.build(Some(2)).unwrap();

        let searcher: &dyn NearestNeighbors<f32> = &index;
        assert_eq!(searcher.len(), 50);
        assert_eq!(searcher.dimensions(), 3);
        assert!(searcher.search(&vectors[0], 3).unwrap().len() <= 3);
    }
}
