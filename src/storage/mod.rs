//! Node arena: `n_nodes` fixed-size records behind one of three backends.
//!
//! - [`BackendKind::Owned`]: a growable heap buffer, used while building in
//!   memory.
//! - [`BackendKind::OnDisk`]: a writable file mapping, used by on-disk builds.
//! - [`BackendKind::Mapped`]: a read-only mapping of a saved index.
//!
//! Records are addressed by index in O(1): record `i` starts at
//! `i * stride`. Mutation of a mapped arena fails with
//! [`ForestError::ReadOnly`].

mod file;
mod owned;

pub(crate) use owned::RecordBuffer;

use crate::constants::storage::{GROWTH_FACTOR, MIN_CAPACITY};
use crate::element::Element;
use crate::error::{ForestError, Result};
use crate::node::{NodeLayout, NodeMut, NodeRef};
use file::{DiskRecords, MappedRecords};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Which backend holds the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Owned,
    OnDisk,
    Mapped,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Owned => "owned",
            BackendKind::OnDisk => "on-disk",
            BackendKind::Mapped => "mapped",
        })
    }
}

#[derive(Debug)]
enum Backend {
    Owned(RecordBuffer),
    OnDisk(DiskRecords),
    Mapped(MappedRecords),
}

/// Ordered store of node records.
#[derive(Debug)]
pub struct Arena {
    layout: NodeLayout,
    n_nodes: usize,
    backend: Backend,
}

impl Arena {
    /// Empty in-memory arena.
    pub fn new(layout: NodeLayout) -> Self {
        Self {
            layout,
            n_nodes: 0,
            backend: Backend::Owned(RecordBuffer::new(layout.stride)),
        }
    }

    /// Empty arena writing through to `path`, which is created or truncated.
    pub fn on_disk(layout: NodeLayout, path: &Path) -> Result<Self> {
        let records = DiskRecords::create(path, layout.stride)?;
        tracing::debug!(path = %path.display(), stride = layout.stride, "on-disk arena created");
        Ok(Self {
            layout,
            n_nodes: 0,
            backend: Backend::OnDisk(records),
        })
    }

    /// Read-only arena over the file at `path`.
    ///
    /// The node count is the file length divided by the stride; checking that
    /// the file is a whole number of records is up to the caller.
    pub fn map(layout: NodeLayout, path: &Path, prefault: bool) -> Result<Self> {
        let records = MappedRecords::open(path, prefault)?;
        let n_nodes = records.bytes().len() / layout.stride;
        tracing::debug!(
            path = %path.display(),
            bytes = records.bytes().len(),
            n_nodes,
            prefault,
            "index file mapped"
        );
        Ok(Self {
            layout,
            n_nodes,
            backend: Backend::Mapped(records),
        })
    }

    #[inline]
    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_nodes == 0
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self.backend {
            Backend::Owned(_) => BackendKind::Owned,
            Backend::OnDisk(_) => BackendKind::OnDisk,
            Backend::Mapped(_) => BackendKind::Mapped,
        }
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        matches!(self.backend, Backend::Mapped(_))
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Owned(_) => None,
            Backend::OnDisk(records) => Some(records.path()),
            Backend::Mapped(records) => Some(records.path()),
        }
    }

    /// Capacity in records.
    pub fn capacity(&self) -> usize {
        match &self.backend {
            Backend::Owned(buffer) => buffer.capacity(),
            Backend::OnDisk(records) => records.capacity(),
            Backend::Mapped(_) => self.n_nodes,
        }
    }

    /// Make room for at least `additional` more records.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let wanted = self.n_nodes.saturating_add(additional);
        if wanted > self.capacity() {
            self.grow_to(wanted)?;
        }
        Ok(())
    }

    fn ensure_capacity(&mut self, records: usize) -> Result<()> {
        let capacity = self.capacity();
        if records <= capacity {
            return Ok(());
        }
        let target = records.max(capacity * GROWTH_FACTOR).max(MIN_CAPACITY);
        self.grow_to(target)
    }

    fn grow_to(&mut self, records: usize) -> Result<()> {
        let from = self.capacity();
        match &mut self.backend {
            Backend::Owned(buffer) => buffer.grow_to(records)?,
            Backend::OnDisk(disk) => disk.grow_to(records)?,
            Backend::Mapped(_) => return Err(ForestError::ReadOnly),
        }
        tracing::debug!(
            backend = %self.backend_kind(),
            from,
            to = records,
            "arena grown"
        );
        Ok(())
    }

    fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        match &mut self.backend {
            Backend::Owned(buffer) => Ok(buffer.bytes_mut()),
            Backend::OnDisk(records) => Ok(records.bytes_mut()),
            Backend::Mapped(_) => Err(ForestError::ReadOnly),
        }
    }

    fn raw_bytes(&self) -> &[u8] {
        match &self.backend {
            Backend::Owned(buffer) => buffer.bytes(),
            Backend::OnDisk(records) => records.bytes(),
            Backend::Mapped(records) => records.bytes(),
        }
    }

    /// Set the node count to `n`, appending zeroed records or dropping
    /// trailing ones.
    pub fn resize(&mut self, n: usize) -> Result<()> {
        if self.is_read_only() {
            return Err(ForestError::ReadOnly);
        }
        if n <= self.n_nodes {
            self.n_nodes = n;
            return Ok(());
        }

        self.ensure_capacity(n)?;
        let stride = self.layout.stride;
        let start = self.n_nodes * stride;
        self.bytes_mut()?[start..n * stride].fill(0);
        self.n_nodes = n;
        Ok(())
    }

    /// Append one zeroed record and return its index.
    pub fn allocate(&mut self) -> Result<usize> {
        let index = self.n_nodes;
        self.resize(index + 1)?;
        Ok(index)
    }

    /// Append whole records copied from `records` and return the index of
    /// the first one.
    pub fn append(&mut self, records: &[u8]) -> Result<usize> {
        if self.is_read_only() {
            return Err(ForestError::ReadOnly);
        }
        let stride = self.layout.stride;
        debug_assert_eq!(records.len() % stride, 0);

        let first = self.n_nodes;
        let n = first + records.len() / stride;
        self.ensure_capacity(n)?;
        self.bytes_mut()?[first * stride..n * stride].copy_from_slice(records);
        self.n_nodes = n;
        Ok(first)
    }

    /// Drop every record at index `n` and beyond.
    pub fn truncate(&mut self, n: usize) -> Result<()> {
        if self.is_read_only() {
            return Err(ForestError::ReadOnly);
        }
        self.n_nodes = self.n_nodes.min(n);
        Ok(())
    }

    /// Release spare capacity. On-disk arenas cut their file to the exact
    /// index size.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        let n = self.n_nodes;
        match &mut self.backend {
            Backend::Owned(buffer) => buffer.shrink_to(n),
            Backend::OnDisk(records) => records.finish(n)?,
            Backend::Mapped(_) => {}
        }
        Ok(())
    }

    /// Flush an on-disk arena to its file.
    pub fn flush(&self) -> Result<()> {
        match &self.backend {
            Backend::OnDisk(records) => records.flush(),
            _ => Ok(()),
        }
    }

    /// The bytes of all `n_nodes` records.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.raw_bytes()[..self.n_nodes * self.layout.stride]
    }

    /// Raw bytes of record `index`, if it exists.
    #[inline]
    pub fn record(&self, index: usize) -> Option<&[u8]> {
        if index < self.n_nodes {
            Some(&self.raw_bytes()[self.layout.record(index)])
        } else {
            None
        }
    }

    /// Typed view of record `index`, if it exists.
    #[inline]
    pub fn get<T: Element>(&self, index: usize) -> Option<NodeRef<'_, T>> {
        self.record(index)
            .map(|bytes| NodeRef::new(bytes, &self.layout))
    }

    /// Typed view of record `index`.
    ///
    /// # Panics
    /// Panics if `index >= n_nodes()`.
    #[inline]
    pub fn node<T: Element>(&self, index: usize) -> NodeRef<'_, T> {
        assert!(
            index < self.n_nodes,
            "node {} out of bounds ({} nodes)",
            index,
            self.n_nodes
        );
        NodeRef::new(&self.raw_bytes()[self.layout.record(index)], &self.layout)
    }

    /// Typed write view of record `index`.
    pub fn node_mut<T: Element>(&mut self, index: usize) -> Result<NodeMut<'_, T>> {
        if index >= self.n_nodes {
            return Err(ForestError::invalid_parameter(format!(
                "node {} out of bounds ({} nodes)",
                index, self.n_nodes
            )));
        }
        let range = self.layout.record(index);
        let layout = &self.layout;
        let bytes = match &mut self.backend {
            Backend::Owned(buffer) => buffer.bytes_mut(),
            Backend::OnDisk(records) => records.bytes_mut(),
            Backend::Mapped(_) => return Err(ForestError::ReadOnly),
        };
        Ok(NodeMut::new(&mut bytes[range], layout))
    }
}
