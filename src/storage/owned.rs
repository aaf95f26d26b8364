//! Heap-backed record buffer.

use crate::error::{ForestError, Result};

/// Zero-initialized, 8-byte-aligned growable storage for fixed-size records.
///
/// Backed by `Vec<u64>` so that every record offset that is a multiple of the
/// scalar width is properly aligned for `i32`, `f32` and `f64` views.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordBuffer {
    words: Vec<u64>,
    stride: usize,
}

impl RecordBuffer {
    pub fn new(stride: usize) -> Self {
        Self {
            words: Vec::new(),
            stride,
        }
    }

    /// Capacity in records.
    #[inline]
    pub fn capacity(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.words.len() * 8 / self.stride
        }
    }

    /// Grow to hold at least `records` records. New space is zeroed.
    ///
    /// Fails with `OutOfMemory` instead of aborting when the allocation
    /// cannot be made; the buffer is unchanged in that case.
    pub fn grow_to(&mut self, records: usize) -> Result<()> {
        let words = records
            .checked_mul(self.stride)
            .map(|bytes| bytes.div_ceil(8))
            .ok_or_else(|| ForestError::out_of_memory(records, self.stride))?;
        if words > self.words.len() {
            self.words
                .try_reserve_exact(words - self.words.len())
                .map_err(|_| ForestError::out_of_memory(records, self.stride))?;
            self.words.resize(words, 0);
        }
        Ok(())
    }

    /// Release space beyond `records` records.
    pub fn shrink_to(&mut self, records: usize) {
        let words = (records * self.stride).div_ceil(8);
        self.words.truncate(words);
        self.words.shrink_to_fit();
    }

    /// Bytes of all `capacity()` records.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        let len = self.capacity() * self.stride;
        // SAFETY: `words` owns at least `len` initialized bytes and u8 has no
        // alignment requirement.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr() as *const u8, len) }
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.capacity() * self.stride;
        // SAFETY: as in `bytes`, and the borrow is unique.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr() as *mut u8, len) }
    }
}
