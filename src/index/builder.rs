//! Forest construction.
//!
//! Each tree is grown into its own [`TreeBuffer`], reading item vectors from
//! the frozen leaf region of the arena, and is appended to the arena only
//! once complete. Inside a buffer, node `l` is referred to as `n_items + l`;
//! committing a tree at arena position `p` shifts those references by
//! `p - n_items`. Item references (leaf slots and bucket contents) never move.
//!
//! Tree `t` draws from a random source seeded with `seed + t`, so a forest
//! depends only on the seed and the items, not on how many threads built it.

use crate::constants::build::{
    AUTO_NODES_PER_ITEM, MAX_SPLIT_ATTEMPTS, SPLIT_IMBALANCE_FALLBACK, SPLIT_IMBALANCE_RETRY,
};
use crate::constants::storage::{GROWTH_FACTOR, MIN_CAPACITY};
use crate::distance::{Distance, Hyperplane, Point, Side};
use crate::element::Element;
use crate::error::{ForestError, Result};
use crate::node::{NodeLayout, NodeMut, NodeRef};
use crate::random::Random;
use crate::storage::{Arena, RecordBuffer};
use rayon::prelude::*;
use std::marker::PhantomData;

/// Records of one tree, built off-arena.
#[derive(Debug)]
pub(crate) struct TreeBuffer {
    records: RecordBuffer,
    layout: NodeLayout,
    len: usize,
    /// Provisional reference of the tree's root.
    root: usize,
}

impl TreeBuffer {
    fn new(layout: NodeLayout) -> Self {
        Self {
            records: RecordBuffer::new(layout.stride),
            layout,
            len: 0,
            root: 0,
        }
    }

    fn allocate(&mut self) -> Result<usize> {
        let index = self.len;
        if index >= self.records.capacity() {
            self.records
                .grow_to((index + 1).max(index * GROWTH_FACTOR).max(MIN_CAPACITY))?;
        }
        self.len += 1;
        Ok(index)
    }

    fn node_mut<T: Element>(&mut self, local: usize) -> NodeMut<'_, T> {
        let range = self.layout.record(local);
        NodeMut::new(&mut self.records.bytes_mut()[range], &self.layout)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn bytes(&self) -> &[u8] {
        &self.records.bytes()[..self.len * self.layout.stride]
    }

    /// Rewrite provisional references for a tree placed at arena index
    /// `n_items + offset`.
    fn relocate<T: Element>(&mut self, n_items: usize, offset: usize) {
        if offset == 0 {
            return;
        }
        let capacity = self.layout.bucket_capacity;
        for local in 0..self.len {
            let mut node = self.node_mut::<T>(local);
            let view = node.view();
            if view.n_descendants() <= capacity {
                continue;
            }
            let [left, right] = view.children();
            let shift = |c: usize| (if c >= n_items { c + offset } else { c }) as i32;
            node.set_children(shift(left), shift(right));
        }
        if self.root >= n_items {
            self.root += offset;
        }
    }
}

/// Larger side's share of a split.
#[inline]
fn split_imbalance(left: usize, right: usize) -> f64 {
    let total = (left + right) as f64;
    if total == 0.0 {
        return 1.0;
    }
    left.max(right) as f64 / total
}

/// Grows one tree over the leaf region of an arena.
struct TreeBuilder<'a, T, D, R> {
    arena: &'a Arena,
    n_items: usize,
    rng: R,
    buffer: TreeBuffer,
    _policy: PhantomData<(T, D)>,
}

impl<'a, T: Element, D: Distance, R: Random> TreeBuilder<'a, T, D, R> {
    fn new(arena: &'a Arena, n_items: usize, seed: u64) -> Self {
        Self {
            arena,
            n_items,
            rng: R::from_seed_value(seed),
            buffer: TreeBuffer::new(*arena.layout()),
            _policy: PhantomData,
        }
    }

    fn leaf(&self, item: u32) -> NodeRef<'a, T> {
        self.arena.node::<T>(item as usize)
    }

    fn build(mut self) -> Result<TreeBuffer> {
        // Slots of ids that were never added stay out of the trees.
        let indices: Vec<u32> = (0..self.n_items as u32)
            .filter(|&i| self.leaf(i).n_descendants() >= 1)
            .collect();
        let root = self.make_tree(&indices, true)?;
        self.buffer.root = root;
        Ok(self.buffer)
    }

    /// Build the subtree over `indices` and return its reference.
    fn make_tree(&mut self, indices: &[u32], is_root: bool) -> Result<usize> {
        let n = indices.len();
        if n == 1 && !is_root {
            return Ok(indices[0] as usize);
        }

        let capacity = self.buffer.layout.bucket_capacity;
        if n <= capacity && (!is_root || self.n_items <= capacity || n == 1) {
            let local = self.buffer.allocate()?;
            let ids: Vec<i32> = indices.iter().map(|&i| i as i32).collect();
            let mut node = self.buffer.node_mut::<T>(local);
            node.set_bucket(&ids);
            if is_root {
                node.set_n_descendants(self.n_items as i32);
            }
            return Ok(self.n_items + local);
        }

        let points: Vec<Point<'a, T>> = indices.iter().map(|&i| self.leaf(i).point()).collect();
        let (plane, left, right) = self.split(indices, &points);

        // Smaller side first.
        let flip = left.len() > right.len();
        let mut children = [0usize; 2];
        for side in 0..2 {
            let which = side ^ usize::from(flip);
            let part = if which == 0 { &left } else { &right };
            children[which] = self.make_tree(part, false)?;
        }

        let n_descendants = if is_root { self.n_items } else { n };
        let local = self.buffer.allocate()?;
        let mut node = self.buffer.node_mut::<T>(local);
        node.set_n_descendants(n_descendants as i32);
        node.set_children(children[0] as i32, children[1] as i32);
        node.set_extra(plane.offset);
        node.vector_mut().copy_from_slice(&plane.normal);
        Ok(self.n_items + local)
    }

    /// Choose a plane and partition `indices` by it.
    fn split(
        &mut self,
        indices: &[u32],
        points: &[Point<'a, T>],
    ) -> (Hyperplane<T>, Vec<u32>, Vec<u32>) {
        let mut left = Vec::with_capacity(indices.len() / 2 + 1);
        let mut right = Vec::with_capacity(indices.len() / 2 + 1);
        let mut plane = D::create_split(points, &mut self.rng);

        for attempt in 0..MAX_SPLIT_ATTEMPTS {
            if attempt > 0 {
                plane = D::create_split(points, &mut self.rng);
            }
            left.clear();
            right.clear();
            for (&id, point) in indices.iter().zip(points) {
                match D::side(&plane.normal, plane.offset, point.vector, point.extra) {
                    Side::Left => left.push(id),
                    Side::Right => right.push(id),
                }
            }
            if split_imbalance(left.len(), right.len()) < SPLIT_IMBALANCE_RETRY {
                break;
            }
        }

        if split_imbalance(left.len(), right.len()) > SPLIT_IMBALANCE_FALLBACK {
            tracing::trace!(
                items = indices.len(),
                left = left.len(),
                right = right.len(),
                "no separating plane found, alternating split"
            );
            plane.normal.iter_mut().for_each(|x| *x = T::ZERO);
            plane.offset = T::ZERO;
            left.clear();
            right.clear();
            for (position, &id) in indices.iter().enumerate() {
                if position % 2 == 0 {
                    left.push(id);
                } else {
                    right.push(id);
                }
            }
        }

        (plane, left, right)
    }
}

/// Build one tree over the first `n_items` records of `arena`.
pub(crate) fn build_tree<T, D, R>(arena: &Arena, n_items: usize, seed: u64) -> Result<TreeBuffer>
where
    T: Element,
    D: Distance,
    R: Random,
{
    TreeBuilder::<T, D, R>::new(arena, n_items, seed).build()
}

/// Append a finished tree to `arena` and return its root's index.
pub(crate) fn commit_tree<T: Element>(
    arena: &mut Arena,
    n_items: usize,
    mut tree: TreeBuffer,
) -> Result<usize> {
    let offset = arena.n_nodes() - n_items;
    if arena.n_nodes() + tree.len() > i32::MAX as usize {
        return Err(ForestError::invalid_parameter(
            "forest exceeds the 2^31 node references of the file format",
        ));
    }
    tree.relocate::<T>(n_items, offset);
    arena.append(tree.bytes())?;
    Ok(tree.root)
}

/// Store per-item extra components computed by the metric, if any.
pub(crate) fn preprocess<T: Element, D: Distance>(arena: &mut Arena, n_items: usize) -> Result<()> {
    let extras = {
        let vectors: Vec<&[T]> = (0..n_items).map(|i| arena.node::<T>(i).vector()).collect();
        D::preprocess(&vectors)
    };
    if let Some(extras) = extras {
        for (item, extra) in extras.into_iter().enumerate() {
            arena.node_mut::<T>(item)?.set_extra(extra);
        }
    }
    Ok(())
}

/// Knobs of one forest build.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuildPlan {
    pub n_items: usize,
    /// `None` builds until the node budget is reached.
    pub n_trees: Option<usize>,
    pub seed: u64,
    pub verbose: bool,
}

impl BuildPlan {
    fn wants_more(&self, arena: &Arena, built: usize) -> bool {
        match self.n_trees {
            Some(n) => built < n,
            None => arena.n_nodes() < AUTO_NODES_PER_ITEM * self.n_items,
        }
    }

    fn log_tree(&self, tree: usize, arena: &Arena) {
        if self.verbose {
            tracing::info!(tree, n_nodes = arena.n_nodes(), "tree built");
        }
    }
}

/// Build trees one after another on the calling thread.
pub(crate) fn build_sequential<T, D, R>(arena: &mut Arena, plan: &BuildPlan) -> Result<Vec<usize>>
where
    T: Element,
    D: Distance,
    R: Random,
{
    let mut roots = Vec::new();
    while plan.wants_more(arena, roots.len()) {
        let t = roots.len() as u64;
        let tree = build_tree::<T, D, R>(arena, plan.n_items, plan.seed.wrapping_add(t))?;
        roots.push(commit_tree::<T>(arena, plan.n_items, tree)?);
        plan.log_tree(roots.len() - 1, arena);
    }
    Ok(roots)
}

/// Build trees on `pool`, committing them in tree order.
///
/// Produces exactly the trees `build_sequential` would. Without a fixed tree
/// count, trees are built in batches of the pool size and surplus trees of
/// the last batch are discarded.
pub(crate) fn build_parallel<T, D, R>(
    arena: &mut Arena,
    plan: &BuildPlan,
    pool: &rayon::ThreadPool,
) -> Result<Vec<usize>>
where
    T: Element,
    D: Distance,
    R: Random,
{
    let batch = match plan.n_trees {
        Some(n) => n.max(1),
        None => pool.current_num_threads().max(1),
    };

    let mut roots = Vec::new();
    while plan.wants_more(arena, roots.len()) {
        let first = roots.len();
        let count = match plan.n_trees {
            Some(n) => n - first,
            None => batch,
        };

        let shared: &Arena = arena;
        let trees: Vec<TreeBuffer> = pool.install(|| {
            (first..first + count)
                .into_par_iter()
                .map(|t| {
                    build_tree::<T, D, R>(shared, plan.n_items, plan.seed.wrapping_add(t as u64))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        for tree in trees {
            if !plan.wants_more(arena, roots.len()) {
                break;
            }
            roots.push(commit_tree::<T>(arena, plan.n_items, tree)?);
            plan.log_tree(roots.len() - 1, arena);
        }
    }
    Ok(roots)
}

/// Append a copy of every root record and return the copies' indices.
pub(crate) fn append_root_trailer(arena: &mut Arena, roots: &[usize]) -> Result<Vec<usize>> {
    let stride = arena.layout().stride;
    let mut trailer = Vec::with_capacity(roots.len() * stride);
    for &root in roots {
        let record = arena.record(root).ok_or_else(|| {
            ForestError::invalid_parameter(format!("root {} is not in the arena", root))
        })?;
        trailer.extend_from_slice(record);
    }
    let first = arena.append(&trailer)?;
    Ok((first..first + roots.len()).collect())
}
