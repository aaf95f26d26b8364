//! On-disk layout of a forest.
//!
//! ```text
//! [leaf records: n_items x stride][split + bucket records][root trailer: n_trees x stride]
//! ```
//!
//! There is no header. Stride, metric and scalar width come from the index
//! the file is loaded into; everything else is recovered from the records:
//! the last record is a copy of the last root, so its `n_descendants` is the
//! item count, and the trailer is the run of records at the end whose
//! `n_descendants` equals it.

use crate::element::Element;
use crate::error::{ForestError, Result};
use crate::storage::Arena;

/// Check that a file of `len` bytes holds a whole, non-zero number of
/// `stride`-byte records, and return that number.
pub fn validate_size(len: usize, stride: usize) -> Result<usize> {
    if len == 0 {
        return Err(ForestError::invalid_format("index file is empty"));
    }
    if len % stride != 0 {
        return Err(ForestError::invalid_format(format!(
            "file size {} is not a multiple of the node size {}; \
             wrong dimensions, metric or scalar type?",
            len, stride
        )));
    }
    Ok(len / stride)
}

/// Where the forest lives inside a loaded arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestLayout {
    pub n_items: usize,
    pub roots: Vec<usize>,
}

/// Recover the item count and the root trailer from the records of `arena`.
///
/// Counting backwards from the last record, let `L` be the length of the run
/// of records (all at indices `>= n_items`) whose `n_descendants` equals
/// `n_items`. When every tree is a single record (a root bucket, or with at
/// most two items present a root over two leaves) the run is the trees
/// followed by their copies, so there are `L / 2` trees. Otherwise the run is
/// the last tree's root followed by the copies, giving `L - 1`.
pub fn locate_roots<T: Element>(arena: &Arena) -> Result<ForestLayout> {
    let n_nodes = arena.n_nodes();
    if n_nodes == 0 {
        return Err(ForestError::invalid_format("index file holds no nodes"));
    }

    let n_items = arena.node::<T>(n_nodes - 1).n_descendants();
    if n_items == 0 || n_items >= n_nodes {
        return Err(ForestError::invalid_format(format!(
            "trailer reports {} items in a file of {} nodes",
            n_items, n_nodes
        )));
    }

    let run = (n_items..n_nodes)
        .rev()
        .take_while(|&i| arena.node::<T>(i).n_descendants() == n_items)
        .count();

    let capacity = arena.layout().bucket_capacity;
    let n_trees = if n_items <= capacity {
        if run % 2 != 0 {
            return Err(ForestError::invalid_format(format!(
                "odd root run of {} records for a single-bucket forest",
                run
            )));
        }
        run / 2
    } else if run % 2 == 0 && halves_match(arena, n_nodes - run, run / 2) {
        run / 2
    } else {
        run.saturating_sub(1)
    };
    if n_trees == 0 {
        return Err(ForestError::invalid_format("no trees found in index file"));
    }

    let roots: Vec<usize> = (n_nodes - n_trees..n_nodes).collect();
    for &root in &roots {
        let node = arena.node::<T>(root);
        if node.n_descendants() > capacity {
            let [left, right] = node.children();
            if left >= root || right >= root {
                return Err(ForestError::invalid_format(format!(
                    "root {} references a later node",
                    root
                )));
            }
        }
    }

    Ok(ForestLayout { n_items, roots })
}

/// True if the `half` records from `first` equal the `half` records after
/// them.
fn halves_match(arena: &Arena, first: usize, half: usize) -> bool {
    (first..first + half).all(|i| arena.record(i) == arena.record(i + half))
}
