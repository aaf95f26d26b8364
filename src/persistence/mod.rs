//! Persistence layer for saving and loading forests.
//!
//! A saved forest is the raw arena: fixed-size node records, back to back,
//! in native byte order. Loading maps the file read-only and serves queries
//! straight from the page cache; nothing is deserialized.
//!
//! # File Format
//!
//! See [`format`] for the layout and for how the roots are recovered.
//!
//! # Example
//!
//! ```ignore
//! use forge_forest::persistence::Persistable;
//!
//! // Save an index; it is reloaded read-only from the file.
//! index.save("items.ann", false)?;
//!
//! // Load into an index created with the same dimensions and metric.
//! let mut other = EuclideanIndex::<f32>::new(64)?;
//! other.load("items.ann", true)?;
//! ```

pub mod format;

pub use format::{locate_roots, validate_size, ForestLayout};

use crate::distance::Distance;
use crate::element::Element;
use crate::error::{ForestError, Result};
use crate::index::ForestIndex;
use crate::node::NodeLayout;
use crate::random::Random;
use crate::storage::{Arena, BackendKind};
use std::io::Write;
use std::path::Path;

/// Trait for indexes that can be persisted to disk.
pub trait Persistable {
    /// Write the index to `path`, then reload it read-only from that file.
    ///
    /// # Arguments
    /// * `path` - Path to save the index to
    /// * `prefault` - Populate the reloaded mapping up front
    ///
    /// # Errors
    /// Returns an error if the index is not built or the file cannot be
    /// written or mapped.
    fn save(&mut self, path: impl AsRef<Path>, prefault: bool) -> Result<()>;

    /// Replace the contents of the index with the file at `path`, mapped
    /// read-only.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or is inconsistent with
    /// the index parameters. The index is unchanged on error.
    fn load(&mut self, path: impl AsRef<Path>, prefault: bool) -> Result<()>;

    /// Release any mapping and return to an empty in-memory index.
    fn unload(&mut self);
}

/// A validated, mapped forest ready to be installed into an index.
#[derive(Debug)]
pub(crate) struct LoadedForest {
    pub arena: Arena,
    pub forest: ForestLayout,
}

/// Write `bytes` to `path` and sync them to disk.
pub(crate) fn write_index(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "index written");
    Ok(())
}

/// Map `path` read-only with `layout` and recover its forest.
pub(crate) fn map_index<T: Element>(
    layout: NodeLayout,
    path: &Path,
    prefault: bool,
) -> Result<LoadedForest> {
    let len = std::fs::metadata(path)?.len() as usize;
    validate_size(len, layout.stride)?;
    let arena = Arena::map(layout, path, prefault)?;
    let forest = locate_roots::<T>(&arena)?;
    tracing::debug!(
        path = %path.display(),
        n_items = forest.n_items,
        n_trees = forest.roots.len(),
        "index loaded"
    );
    Ok(LoadedForest { arena, forest })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

impl<T: Element, D: Distance, R: Random> Persistable for ForestIndex<T, D, R> {
    fn save(&mut self, path: impl AsRef<Path>, prefault: bool) -> Result<()> {
        let path = path.as_ref();
        if !self.is_built() {
            return Err(ForestError::IndexNotBuilt);
        }

        let own_file = self.arena().path().is_some_and(|p| same_file(p, path));
        match self.arena().backend_kind() {
            BackendKind::OnDisk if own_file => self.arena().flush()?,
            // Already this very file; rewriting it would truncate the mapping.
            BackendKind::Mapped if own_file => {}
            _ => write_index(path, self.arena().bytes())?,
        }

        let loaded = map_index::<T>(*self.arena().layout(), path, prefault)?;
        self.install(loaded);
        Ok(())
    }

    fn load(&mut self, path: impl AsRef<Path>, prefault: bool) -> Result<()> {
        let loaded = map_index::<T>(*self.arena().layout(), path.as_ref(), prefault)?;
        self.install(loaded);
        Ok(())
    }

    fn unload(&mut self) {
        self.reset();
        tracing::debug!("index unloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Euclidean;
    use tempfile::tempdir;

    fn small_index() -> ForestIndex<f32, Euclidean> {
        let mut index = ForestIndex::<f32, Euclidean>::new(3).unwrap();
        for i in 0..50u32 {
            let x = i as f32;
            index.add_item(i, &[x, x * 0.5, -x]).unwrap();
        }
        index.build(Some(4)).unwrap();
        index
    }

    #[test]
    fn test_write_and_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forest.ann");
        let index = small_index();
        write_index(&path, index.arena().bytes()).unwrap();

        let loaded = map_index::<f32>(*index.arena().layout(), &path, false).unwrap();
        assert_eq!(loaded.forest.n_items, 50);
        assert_eq!(loaded.forest.roots.len(), 4);
        assert_eq!(loaded.arena.bytes(), index.arena().bytes());
    }

    #[test]
    fn test_save_requires_build() {
        let dir = tempdir().unwrap();
        let mut index = ForestIndex::<f32, Euclidean>::new(3).unwrap();
        index.add_item(0, &[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            index.save(dir.path().join("x.ann"), false),
            Err(ForestError::IndexNotBuilt)
        ));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forest.ann");
        let index = small_index();
        let bytes = index.arena().bytes();
        std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

        let mut other = ForestIndex::<f32, Euclidean>::new(3).unwrap();
        assert!(matches!(
            other.load(&path, false),
            Err(ForestError::InvalidFormat(_))
        ));
        assert_eq!(other.n_items(), 0);
    }

    #[test]
    fn test_resave_mapped_index_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forest.ann");
        let mut index = small_index();
        index.save(&path, false).unwrap();
        let before = std::fs::read(&path).unwrap();

        index.save(&path, false).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(index.n_trees(), 4);
    }
}
