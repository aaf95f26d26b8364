//! Fixed-size node records.
//!
//! Every node in the arena is one `stride`-byte record laid out like the
//! equivalent C struct (native endianness, `i32` references):
//!
//! | metric | layout |
//! |---|---|
//! | angular | `i32 n_descendants; i32 children[2]; T v[f]` |
//! | euclidean, manhattan | `i32 n_descendants; T bias; i32 children[2]; T v[f]` |
//! | dot | `i32 n_descendants; i32 children[2]; T dot_factor; T v[f]` |
//!
//! A record is a leaf (`n_descendants == 1`, the item's vector in `v`), a
//! bucket (`n_descendants <= K`, item ids written from `children` onwards)
//! or a split (plane normal in `v`, the two children in `children`).

use crate::constants::storage::REF_SIZE;
use crate::distance::{Metric, Point};
use crate::element::{cast_slice, cast_slice_mut, Element, ScalarType};
use std::marker::PhantomData;

#[inline]
const fn align_up(offset: usize, to: usize) -> usize {
    (offset + to - 1) / to * to
}

/// Byte offsets and sizes of a node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    pub metric: Metric,
    pub scalar: ScalarType,
    pub dimensions: usize,
    /// Size of one record in bytes.
    pub stride: usize,
    pub children_offset: usize,
    /// Offset of the bias (Minkowski) or dot factor (dot product) field.
    pub extra_offset: Option<usize>,
    pub vector_offset: usize,
    /// Number of item ids a bucket record can hold (`K`).
    pub bucket_capacity: usize,
}

impl NodeLayout {
    pub fn new(metric: Metric, scalar: ScalarType, dimensions: usize) -> Self {
        let t = scalar.size();
        let (children_offset, extra_offset, vector_offset) = match metric {
            Metric::Angular => (REF_SIZE, None, align_up(3 * REF_SIZE, t)),
            Metric::Euclidean | Metric::Manhattan => {
                let bias = align_up(REF_SIZE, t);
                let children = bias + t;
                (children, Some(bias), align_up(children + 2 * REF_SIZE, t))
            }
            Metric::DotProduct => {
                let dot_factor = align_up(3 * REF_SIZE, t);
                (REF_SIZE, Some(dot_factor), dot_factor + t)
            }
        };
        let stride = vector_offset + dimensions * t;

        Self {
            metric,
            scalar,
            dimensions,
            stride,
            children_offset,
            extra_offset,
            vector_offset,
            bucket_capacity: (stride - children_offset) / REF_SIZE,
        }
    }

    /// Layout for the static types of a typed index.
    pub fn of<T: Element>(metric: Metric, dimensions: usize) -> Self {
        Self::new(metric, T::SCALAR, dimensions)
    }

    /// Byte range of record `index`.
    #[inline]
    pub fn record(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.stride;
        start..start + self.stride
    }
}

#[inline]
fn read_ref(bytes: &[u8], offset: usize) -> i32 {
    cast_slice::<i32>(&bytes[offset..offset + REF_SIZE])[0]
}

#[inline]
fn write_ref(bytes: &mut [u8], offset: usize, value: i32) {
    cast_slice_mut::<i32>(&mut bytes[offset..offset + REF_SIZE])[0] = value;
}

/// Read view of one record.
#[derive(Clone, Copy)]
pub struct NodeRef<'a, T> {
    bytes: &'a [u8],
    layout: &'a NodeLayout,
    _scalar: PhantomData<T>,
}

impl<'a, T: Element> NodeRef<'a, T> {
    /// View `bytes` (exactly one record) through `layout`.
    pub fn new(bytes: &'a [u8], layout: &'a NodeLayout) -> Self {
        debug_assert_eq!(bytes.len(), layout.stride);
        debug_assert_eq!(layout.scalar, T::SCALAR);
        Self {
            bytes,
            layout,
            _scalar: PhantomData,
        }
    }

    #[inline]
    pub fn n_descendants(&self) -> usize {
        read_ref(self.bytes, 0).max(0) as usize
    }

    #[inline]
    pub fn children(&self) -> [usize; 2] {
        let base = self.layout.children_offset;
        [
            read_ref(self.bytes, base).max(0) as usize,
            read_ref(self.bytes, base + REF_SIZE).max(0) as usize,
        ]
    }

    /// Item ids of a bucket record holding `n_descendants` ids.
    #[inline]
    pub fn bucket_items(&self) -> &'a [i32] {
        let m = self.n_descendants().min(self.layout.bucket_capacity);
        let start = self.layout.children_offset;
        cast_slice::<i32>(&self.bytes[start..start + m * REF_SIZE])
    }

    /// Item vector of a leaf, or plane normal of a split.
    #[inline]
    pub fn vector(&self) -> &'a [T] {
        cast_slice::<T>(&self.bytes[self.layout.vector_offset..])
    }

    /// Bias or dot factor; zero for layouts without one.
    #[inline]
    pub fn extra(&self) -> T {
        match self.layout.extra_offset {
            Some(offset) => {
                cast_slice::<T>(&self.bytes[offset..offset + std::mem::size_of::<T>()])[0]
            }
            None => T::ZERO,
        }
    }

    /// The record as a split-machinery point.
    #[inline]
    pub fn point(&self) -> Point<'a, T> {
        Point {
            vector: self.vector(),
            extra: self.extra(),
        }
    }

    /// Raw record bytes.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Write view of one record.
pub struct NodeMut<'a, T> {
    bytes: &'a mut [u8],
    layout: &'a NodeLayout,
    _scalar: PhantomData<T>,
}

impl<'a, T: Element> NodeMut<'a, T> {
    pub fn new(bytes: &'a mut [u8], layout: &'a NodeLayout) -> Self {
        debug_assert_eq!(bytes.len(), layout.stride);
        debug_assert_eq!(layout.scalar, T::SCALAR);
        Self {
            bytes,
            layout,
            _scalar: PhantomData,
        }
    }

    pub fn view(&self) -> NodeRef<'_, T> {
        NodeRef::new(self.bytes, self.layout)
    }

    #[inline]
    pub fn set_n_descendants(&mut self, n: i32) {
        write_ref(self.bytes, 0, n);
    }

    #[inline]
    pub fn set_children(&mut self, left: i32, right: i32) {
        let base = self.layout.children_offset;
        write_ref(self.bytes, base, left);
        write_ref(self.bytes, base + REF_SIZE, right);
    }

    /// Write a bucket: `n_descendants` followed by the ids. The caller sets a
    /// different `n_descendants` afterwards for root buckets.
    pub fn set_bucket(&mut self, items: &[i32]) {
        debug_assert!(items.len() <= self.layout.bucket_capacity);
        self.set_n_descendants(items.len() as i32);
        let start = self.layout.children_offset;
        cast_slice_mut::<i32>(&mut self.bytes[start..start + items.len() * REF_SIZE])
            .copy_from_slice(items);
    }

    #[inline]
    pub fn vector_mut(&mut self) -> &mut [T] {
        cast_slice_mut::<T>(&mut self.bytes[self.layout.vector_offset..])
    }

    /// Set the bias or dot factor. A no-op for layouts without one.
    #[inline]
    pub fn set_extra(&mut self, value: T) {
        if let Some(offset) = self.layout.extra_offset {
            cast_slice_mut::<T>(&mut self.bytes[offset..offset + std::mem::size_of::<T>()])[0] =
                value;
        }
    }

    /// Overwrite the whole record.
    pub fn copy_from(&mut self, record: &[u8]) {
        self.bytes.copy_from_slice(record);
    }
}
