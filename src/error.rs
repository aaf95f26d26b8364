//! Error types for forge-forest operations.
//!
//! Every fallible operation on an index returns [`Result`]. Errors are local to
//! the call that produced them; an index that returned an error is left in the
//! state it had before the call.

use std::io;
use thiserror::Error;

/// Result type alias using [`ForestError`].
pub type Result<T> = std::result::Result<T, ForestError>;

/// Errors that can occur while building, persisting or querying a forest.
#[derive(Error, Debug)]
pub enum ForestError {
    /// Vector length does not match the index dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the index.
        expected: usize,
        /// Length of the vector provided.
        actual: usize,
    },

    /// Invalid parameter value provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Item id is not present in the index.
    #[error("item {id} out of range: index holds {n_items} items")]
    ItemOutOfRange {
        /// Requested item id.
        id: u64,
        /// Number of item slots in the index.
        n_items: usize,
    },

    /// Item id does not fit the 32-bit node references of the file format.
    #[error("item id {0} exceeds the maximum supported id {max}", max = i32::MAX)]
    ItemIdTooLarge(u64),

    /// Build requested on an index with no items.
    #[error("empty index: add items before calling build()")]
    EmptyIndex,

    /// Mutation requested on an index that has already been built.
    #[error("index already built: call unbuild() before adding items or rebuilding")]
    IndexAlreadyBuilt,

    /// Operation requires a built index.
    #[error("index not built: call build() first")]
    IndexNotBuilt,

    /// Mutation requested on a read-only memory-mapped index.
    #[error("index is memory-mapped read-only: unload() it first")]
    ReadOnly,

    /// Node storage could not be grown to the requested number of records.
    #[error("cannot allocate {records} records of {stride} bytes")]
    OutOfMemory {
        /// Record count that was requested.
        records: usize,
        /// Size of one record in bytes.
        stride: usize,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Index file is inconsistent with the parameters it was loaded with.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Unknown or unsupported distance metric tag.
    #[error("unsupported metric: {0}")]
    UnsupportedMetric(String),

    /// Unknown or unsupported scalar type tag.
    #[error("unsupported scalar type: {0}")]
    UnsupportedScalarType(String),

    /// Configuration does not describe the index type it was applied to.
    #[error("config mismatch: {0}")]
    ConfigMismatch(String),
}

impl ForestError {
    /// Creates a new `DimensionMismatch` error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates a new `ItemOutOfRange` error.
    pub fn item_out_of_range(id: impl Into<u64>, n_items: usize) -> Self {
        Self::ItemOutOfRange {
            id: id.into(),
            n_items,
        }
    }

    /// Creates a new `OutOfMemory` error.
    pub fn out_of_memory(records: usize, stride: usize) -> Self {
        Self::OutOfMemory { records, stride }
    }

    /// Creates a new `InvalidFormat` error.
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Creates a new `ConfigMismatch` error.
    pub fn config_mismatch(msg: impl Into<String>) -> Self {
        Self::ConfigMismatch(msg.into())
    }

    /// True for errors caused by how the index was used rather than by the
    /// environment or the file contents.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. }
                | Self::InvalidParameter(_)
                | Self::ItemOutOfRange { .. }
                | Self::ItemIdTooLarge(_)
                | Self::EmptyIndex
                | Self::IndexAlreadyBuilt
                | Self::IndexNotBuilt
                | Self::ReadOnly
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForestError::dimension_mismatch(128, 256);
        assert_eq!(err.to_string(), "dimension mismatch: expected 128, got 256");

        let err = ForestError::item_out_of_range(7u32, 5);
        assert_eq!(err.to_string(), "item 7 out of range: index holds 5 items");

        let err = ForestError::EmptyIndex;
        assert_eq!(
            err.to_string(),
            "empty index: add items before calling build()"
        );

        let err = ForestError::ItemIdTooLarge(1 << 40);
        assert!(err.to_string().contains("2147483647"));

        let err = ForestError::out_of_memory(1 << 20, 24);
        assert_eq!(err.to_string(), "cannot allocate 1048576 records of 24 bytes");
        assert!(!err.is_usage_error());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: ForestError = io_err.into();
        assert!(matches!(err, ForestError::Io(_)));
        assert!(!err.is_usage_error());
    }

    #[test]
    fn test_usage_classification() {
        assert!(ForestError::ReadOnly.is_usage_error());
        assert!(ForestError::IndexAlreadyBuilt.is_usage_error());
        assert!(!ForestError::invalid_format("short file").is_usage_error());
        assert!(!ForestError::UnsupportedMetric("hamming".into()).is_usage_error());
    }
}
