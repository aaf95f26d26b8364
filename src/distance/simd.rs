//! SIMD `f32` kernels with runtime CPU detection.
//!
//! - **AVX2+FMA** (x86_64): 8 lanes, two accumulators to hide FMA latency
//! - **NEON** (aarch64): 4 lanes, always available
//! - **Scalar**: fallback for every other target
//!
//! The dispatching functions at the bottom are what `f32` indexes call.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

#[cfg_attr(target_arch = "aarch64", allow(unused_imports))]
use super::scalar;

// =============================================================================
// AVX2 + FMA (x86_64)
// =============================================================================

/// Sum the 8 lanes of an AVX register.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn horizontal_sum_avx(v: __m256) -> f32 {
    let low = _mm256_castps256_ps128(v);
    let high = _mm256_extractf128_ps(v, 1);
    let quad = _mm_add_ps(low, high);
    let dual = _mm_add_ps(quad, _mm_movehl_ps(quad, quad));
    let single = _mm_add_ss(dual, _mm_shuffle_ps(dual, dual, 0x1));
    _mm_cvtss_f32(single)
}

/// Dot product using AVX2 and FMA.
///
/// # Safety
/// The caller must ensure the CPU supports AVX2 and FMA.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
#[inline]
pub unsafe fn dot_product_avx2(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let (pa, pb) = (a.as_ptr(), b.as_ptr());
    let mut acc0 = _mm256_setzero_ps();
    let mut acc1 = _mm256_setzero_ps();
    let mut i = 0;

    while i + 16 <= len {
        acc0 = _mm256_fmadd_ps(_mm256_loadu_ps(pa.add(i)), _mm256_loadu_ps(pb.add(i)), acc0);
        acc1 = _mm256_fmadd_ps(
            _mm256_loadu_ps(pa.add(i + 8)),
            _mm256_loadu_ps(pb.add(i + 8)),
            acc1,
        );
        i += 16;
    }
    if i + 8 <= len {
        acc0 = _mm256_fmadd_ps(_mm256_loadu_ps(pa.add(i)), _mm256_loadu_ps(pb.add(i)), acc0);
        i += 8;
    }

    let mut total = horizontal_sum_avx(_mm256_add_ps(acc0, acc1));
    while i < len {
        total += a[i] * b[i];
        i += 1;
    }
    total
}

/// Squared Euclidean distance using AVX2 and FMA.
///
/// # Safety
/// The caller must ensure the CPU supports AVX2 and FMA.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
#[inline]
pub unsafe fn euclidean_distance_squared_avx2(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let (pa, pb) = (a.as_ptr(), b.as_ptr());
    let mut acc0 = _mm256_setzero_ps();
    let mut acc1 = _mm256_setzero_ps();
    let mut i = 0;

    while i + 16 <= len {
        let d0 = _mm256_sub_ps(_mm256_loadu_ps(pa.add(i)), _mm256_loadu_ps(pb.add(i)));
        let d1 = _mm256_sub_ps(_mm256_loadu_ps(pa.add(i + 8)), _mm256_loadu_ps(pb.add(i + 8)));
        acc0 = _mm256_fmadd_ps(d0, d0, acc0);
        acc1 = _mm256_fmadd_ps(d1, d1, acc1);
        i += 16;
    }
    if i + 8 <= len {
        let d0 = _mm256_sub_ps(_mm256_loadu_ps(pa.add(i)), _mm256_loadu_ps(pb.add(i)));
        acc0 = _mm256_fmadd_ps(d0, d0, acc0);
        i += 8;
    }

    let mut total = horizontal_sum_avx(_mm256_add_ps(acc0, acc1));
    while i < len {
        let diff = a[i] - b[i];
        total += diff * diff;
        i += 1;
    }
    total
}

/// Manhattan distance using AVX2.
///
/// # Safety
/// The caller must ensure the CPU supports AVX2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
pub unsafe fn manhattan_distance_avx2(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let (pa, pb) = (a.as_ptr(), b.as_ptr());
    // Clearing the sign bit is |x|.
    let sign = _mm256_set1_ps(-0.0);
    let mut acc = _mm256_setzero_ps();
    let mut i = 0;

    while i + 8 <= len {
        let diff = _mm256_sub_ps(_mm256_loadu_ps(pa.add(i)), _mm256_loadu_ps(pb.add(i)));
        acc = _mm256_add_ps(acc, _mm256_andnot_ps(sign, diff));
        i += 8;
    }

    let mut total = horizontal_sum_avx(acc);
    while i < len {
        total += (a[i] - b[i]).abs();
        i += 1;
    }
    total
}

// =============================================================================
// NEON (aarch64)
// =============================================================================

/// Dot product using NEON.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn dot_product_neon(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let mut i = 0;
    let mut acc = unsafe { vdupq_n_f32(0.0) };

    while i + 4 <= len {
        unsafe {
            let va = vld1q_f32(a.as_ptr().add(i));
            let vb = vld1q_f32(b.as_ptr().add(i));
            acc = vfmaq_f32(acc, va, vb);
        }
        i += 4;
    }

    let mut total = unsafe { vaddvq_f32(acc) };
    while i < len {
        total += a[i] * b[i];
        i += 1;
    }
    total
}

/// Squared Euclidean distance using NEON.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn euclidean_distance_squared_neon(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let mut i = 0;
    let mut acc = unsafe { vdupq_n_f32(0.0) };

    while i + 4 <= len {
        unsafe {
            let diff = vsubq_f32(vld1q_f32(a.as_ptr().add(i)), vld1q_f32(b.as_ptr().add(i)));
            acc = vfmaq_f32(acc, diff, diff);
        }
        i += 4;
    }

    let mut total = unsafe { vaddvq_f32(acc) };
    while i < len {
        let diff = a[i] - b[i];
        total += diff * diff;
        i += 1;
    }
    total
}

/// Manhattan distance using NEON absolute difference.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn manhattan_distance_neon(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let mut i = 0;
    let mut acc = unsafe { vdupq_n_f32(0.0) };

    while i + 4 <= len {
        unsafe {
            let abs = vabdq_f32(vld1q_f32(a.as_ptr().add(i)), vld1q_f32(b.as_ptr().add(i)));
            acc = vaddq_f32(acc, abs);
        }
        i += 4;
    }

    let mut total = unsafe { vaddvq_f32(acc) };
    while i < len {
        total += (a[i] - b[i]).abs();
        i += 1;
    }
    total
}

// =============================================================================
// Dispatch
// =============================================================================

#[cfg(target_arch = "x86_64")]
#[inline]
fn has_avx2_fma() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

/// Dot product, using the fastest kernel available on this CPU.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if has_avx2_fma() {
            return unsafe { dot_product_avx2(a, b) };
        }
        scalar::dot_product(a, b)
    }

    #[cfg(target_arch = "aarch64")]
    {
        dot_product_neon(a, b)
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        scalar::dot_product(a, b)
    }
}

/// Squared Euclidean distance, using the fastest kernel available on this CPU.
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if has_avx2_fma() {
            return unsafe { euclidean_distance_squared_avx2(a, b) };
        }
        scalar::euclidean_distance_squared(a, b)
    }

    #[cfg(target_arch = "aarch64")]
    {
        euclidean_distance_squared_neon(a, b)
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        scalar::euclidean_distance_squared(a, b)
    }
}

/// Manhattan distance, using the fastest kernel available on this CPU.
#[inline]
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return unsafe { manhattan_distance_avx2(a, b) };
        }
        scalar::manhattan_distance(a, b)
    }

    #[cfg(target_arch = "aarch64")]
    {
        manhattan_distance_neon(a, b)
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        scalar::manhattan_distance(a, b)
    }
}
