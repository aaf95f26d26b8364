//! Scalar (non-SIMD) vector kernels.
//!
//! These are the implementations used for `f64` indexes, the fallback for
//! `f32` on CPUs without a SIMD path, and the baselines the SIMD kernels are
//! tested against.

use crate::element::Element;

/// Compute the dot product of two vectors.
///
/// Returns sum(a[i] * b[i])
#[inline]
pub fn dot_product<T: Element>(a: &[T], b: &[T]) -> T {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let mut sum = T::ZERO;
    for (&x, &y) in a.iter().zip(b.iter()) {
        sum += x * y;
    }
    sum
}

/// Compute the squared Euclidean distance between two vectors.
///
/// Returns sum((a[i] - b[i])^2)
#[inline]
pub fn euclidean_distance_squared<T: Element>(a: &[T], b: &[T]) -> T {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let mut sum = T::ZERO;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let diff = x - y;
        sum += diff * diff;
    }
    sum
}

/// Compute the Manhattan (L1) distance between two vectors.
///
/// Returns sum(|a[i] - b[i]|)
#[inline]
pub fn manhattan_distance<T: Element>(a: &[T], b: &[T]) -> T {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let mut sum = T::ZERO;
    for (&x, &y) in a.iter().zip(b.iter()) {
        sum += (x - y).abs();
    }
    sum
}

/// Euclidean norm of a vector.
#[inline]
pub fn norm<T: Element>(v: &[T]) -> T {
    T::dot(v, v).sqrt()
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
#[inline]
pub fn normalize<T: Element>(v: &mut [T]) {
    let norm = norm(v);
    if norm > T::ZERO {
        for x in v.iter_mut() {
            *x = *x / norm;
        }
    }
}

/// Compute the cosine similarity between two vectors.
///
/// Range: [-1.0, 1.0]; zero vectors have similarity 0.
#[inline]
pub fn cosine_similarity<T: Element>(a: &[T], b: &[T]) -> T {
    let denom = (T::dot(a, a) * T::dot(b, b)).sqrt();
    if denom > T::ZERO {
        T::dot(a, b) / denom
    } else {
        T::ZERO
    }
}
