//! Core newtypes for type-safe forest operations.
//!
//! Item ids and node indices are both small integers; keeping them apart at
//! the type level prevents passing an arena position where an item id is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an item stored in a forest.
///
/// Item ids double as the arena position of the item's leaf record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ItemId(pub u32);

impl ItemId {
    /// Create a new ItemId.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get the id as an arena position.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl From<u32> for ItemId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<ItemId> for u32 {
    #[inline]
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl From<ItemId> for u64 {
    #[inline]
    fn from(id: ItemId) -> Self {
        u64::from(id.0)
    }
}

/// Position of a record inside the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeIndex(pub usize);

impl NodeIndex {
    /// Get the raw usize value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id() {
        let id = ItemId::new(42);
        assert_eq!(id.as_u32(), 42);
        assert_eq!(id.as_usize(), 42);
        assert_eq!(format!("{}", id), "ItemId(42)");

        let id2: ItemId = 100u32.into();
        assert_eq!(u32::from(id2), 100);
        assert_eq!(u64::from(id2), 100);
    }

    #[test]
    fn test_ordering() {
        assert!(ItemId::new(1) < ItemId::new(2));
        assert!(NodeIndex(3) > NodeIndex(2));
        assert_eq!(NodeIndex(9).to_string(), "#9");
    }
}
