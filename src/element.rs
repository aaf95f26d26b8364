//! Scalar widths supported by the forest.
//!
//! [`Element`] is sealed and implemented for `f32` and `f64` only. Node
//! records are reinterpreted in place from mapped file bytes, which is sound
//! because every bit pattern is a valid value of either type.

use crate::distance::{scalar, simd};
use crate::error::ForestError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};
use std::str::FromStr;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
}

/// Plain data that can be viewed directly inside node records.
pub trait Pod: Copy + sealed::Sealed + 'static {}

impl Pod for f32 {}
impl Pod for f64 {}
impl Pod for i32 {}

/// Reinterpret an aligned byte slice as a slice of `P`.
///
/// # Panics
/// Panics if `bytes` is not aligned for `P` or its length is not a multiple
/// of `size_of::<P>()`. Arena records are laid out so this never happens.
#[inline]
pub(crate) fn cast_slice<P: Pod>(bytes: &[u8]) -> &[P] {
    // SAFETY: `P` is one of i32/f32/f64, for which every bit pattern is valid.
    let (head, body, tail) = unsafe { bytes.align_to::<P>() };
    assert!(
        head.is_empty() && tail.is_empty(),
        "misaligned node record"
    );
    body
}

/// Mutable counterpart of [`cast_slice`].
#[inline]
pub(crate) fn cast_slice_mut<P: Pod>(bytes: &mut [u8]) -> &mut [P] {
    // SAFETY: see `cast_slice`.
    let (head, body, tail) = unsafe { bytes.align_to_mut::<P>() };
    assert!(
        head.is_empty() && tail.is_empty(),
        "misaligned node record"
    );
    body
}

/// Runtime tag for the scalar width of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// 32-bit floats.
    #[default]
    F32,
    /// 64-bit floats.
    F64,
}

impl ScalarType {
    /// Width of one component in bytes.
    pub const fn size(self) -> usize {
        match self {
            ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }

    /// Canonical tag.
    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = ForestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f32" | "float" | "float32" => Ok(ScalarType::F32),
            "f64" | "double" | "float64" => Ok(ScalarType::F64),
            _ => Err(ForestError::UnsupportedScalarType(s.to_string())),
        }
    }
}

/// A floating point component type.
pub trait Element:
    Pod
    + Default
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
{
    /// Runtime tag of this width.
    const SCALAR: ScalarType;
    const ZERO: Self;
    const ONE: Self;
    const TWO: Self;
    const INFINITY: Self;

    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn from_usize(value: usize) -> Self;
    fn sqrt(self) -> Self;
    fn abs(self) -> Self;
    fn total_cmp(&self, other: &Self) -> Ordering;

    #[inline]
    fn max(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// sum(a[i] * b[i])
    fn dot(a: &[Self], b: &[Self]) -> Self;

    /// sum((a[i] - b[i])^2)
    fn euclidean_squared(a: &[Self], b: &[Self]) -> Self;

    /// sum(|a[i] - b[i]|)
    fn manhattan(a: &[Self], b: &[Self]) -> Self;
}

impl Element for f32 {
    const SCALAR: ScalarType = ScalarType::F32;
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const TWO: Self = 2.0;
    const INFINITY: Self = f32::INFINITY;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn from_usize(value: usize) -> Self {
        value as f32
    }

    #[inline]
    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }

    #[inline]
    fn abs(self) -> Self {
        f32::abs(self)
    }

    #[inline]
    fn total_cmp(&self, other: &Self) -> Ordering {
        f32::total_cmp(self, other)
    }

    #[inline]
    fn dot(a: &[Self], b: &[Self]) -> Self {
        simd::dot_product(a, b)
    }

    #[inline]
    fn euclidean_squared(a: &[Self], b: &[Self]) -> Self {
        simd::euclidean_distance_squared(a, b)
    }

    #[inline]
    fn manhattan(a: &[Self], b: &[Self]) -> Self {
        simd::manhattan_distance(a, b)
    }
}

impl Element for f64 {
    const SCALAR: ScalarType = ScalarType::F64;
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const TWO: Self = 2.0;
    const INFINITY: Self = f64::INFINITY;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_usize(value: usize) -> Self {
        value as f64
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }

    #[inline]
    fn total_cmp(&self, other: &Self) -> Ordering {
        f64::total_cmp(self, other)
    }

    #[inline]
    fn dot(a: &[Self], b: &[Self]) -> Self {
        scalar::dot_product(a, b)
    }

    #[inline]
    fn euclidean_squared(a: &[Self], b: &[Self]) -> Self {
        scalar::euclidean_distance_squared(a, b)
    }

    #[inline]
    fn manhattan(a: &[Self], b: &[Self]) -> Self {
        scalar::manhattan_distance(a, b)
    }
}
