//! Distance metrics and split-plane construction.
//!
//! Kernels come in scalar and SIMD flavors (`scalar`, `simd`); the
//! [`Element`] trait picks the fastest one for each scalar width. On top of
//! the kernels, every metric is a zero-sized policy type implementing
//! [`Distance`]: how to score a pair, how to normalize that score for the
//! caller, which side of a split plane a vector falls on, and how to pick a
//! split plane for a set of points.

mod angular;
mod dot;
mod minkowski;
pub mod scalar;
pub mod simd;
pub(crate) mod split;

pub use angular::Angular;
pub use dot::DotProduct;
pub use minkowski::{Euclidean, Manhattan};

use crate::element::Element;
use crate::error::ForestError;
use crate::random::Random;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Runtime tag of a distance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Cosine-style distance `sqrt(2 - 2 cos(u, v))`.
    Angular,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Manhattan (L1) distance, also known as taxicab distance.
    Manhattan,
    /// Maximum inner product; the reported distance is `dot(u, v)`.
    #[serde(alias = "dot")]
    DotProduct,
}

impl Metric {
    /// Every supported metric.
    pub const ALL: [Metric; 4] = [
        Metric::Angular,
        Metric::Euclidean,
        Metric::Manhattan,
        Metric::DotProduct,
    ];

    /// Canonical tag.
    pub const fn name(self) -> &'static str {
        match self {
            Metric::Angular => "angular",
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
            Metric::DotProduct => "dot",
        }
    }

    /// Ranking score of `a` against `b`; smaller is closer.
    #[inline]
    pub fn distance<T: Element>(&self, a: &[T], b: &[T]) -> T {
        match self {
            Metric::Angular => Angular::distance(a, b),
            Metric::Euclidean => Euclidean::distance(a, b),
            Metric::Manhattan => Manhattan::distance(a, b),
            Metric::DotProduct => DotProduct::distance(a, b),
        }
    }

    /// Convert a ranking score into the distance reported to callers.
    #[inline]
    pub fn normalized_distance<T: Element>(&self, distance: T) -> T {
        match self {
            Metric::Angular => Angular::normalized_distance(distance),
            Metric::Euclidean => Euclidean::normalized_distance(distance),
            Metric::Manhattan => Manhattan::normalized_distance(distance),
            Metric::DotProduct => DotProduct::normalized_distance(distance),
        }
    }

    /// Reported distance between two vectors.
    ///
    /// # Panics
    /// Panics if the vectors have different dimensions.
    #[inline]
    pub fn compute<T: Element>(&self, a: &[T], b: &[T]) -> T {
        assert_eq!(a.len(), b.len(), "Vector dimensions must match");
        self.normalized_distance(self.distance(a, b))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ForestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "angular" => Ok(Metric::Angular),
            "euclidean" => Ok(Metric::Euclidean),
            "manhattan" => Ok(Metric::Manhattan),
            "dot" | "dotproduct" | "dot_product" => Ok(Metric::DotProduct),
            _ => Err(ForestError::UnsupportedMetric(s.to_string())),
        }
    }
}

/// A vector as seen by the split machinery: its components plus the extra
/// per-node scalar (the dot factor for [`DotProduct`], zero otherwise).
#[derive(Debug, Clone, Copy)]
pub struct Point<'a, T> {
    pub vector: &'a [T],
    pub extra: T,
}

impl<'a, T: Element> Point<'a, T> {
    /// A point with no extra component.
    pub fn plain(vector: &'a [T]) -> Self {
        Self {
            vector,
            extra: T::ZERO,
        }
    }
}

/// A split plane: unit normal plus the metric's offset (bias or dot factor).
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperplane<T> {
    pub normal: Vec<T>,
    pub offset: T,
}

/// Which child a vector descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Negative margins go left, everything else right.
    #[inline]
    pub fn from_margin<T: Element>(margin: T) -> Self {
        if margin >= T::ZERO {
            Side::Right
        } else {
            Side::Left
        }
    }
}

/// Metric policy used by the forest.
pub trait Distance: Copy + Default + fmt::Debug + Send + Sync + 'static {
    /// Runtime tag of this metric.
    const METRIC: Metric;

    /// Whether two-means works on unit-normalized centroids.
    const COSINE: bool = false;

    /// Ranking score of `x` against `y`; smaller is closer.
    fn distance<T: Element>(x: &[T], y: &[T]) -> T;

    /// Convert a ranking score into the distance reported to callers.
    fn normalized_distance<T: Element>(distance: T) -> T;

    /// Signed distance of `y` (with extra component `y_extra`) from the plane
    /// `(normal, offset)`.
    fn margin<T: Element>(normal: &[T], offset: T, y: &[T], y_extra: T) -> T;

    /// Distance used while clustering points into two means.
    #[inline]
    fn split_distance<T: Element>(x: &Point<'_, T>, y: &Point<'_, T>) -> T {
        Self::distance(x.vector, y.vector)
    }

    /// Pick a plane separating `points` into two groups.
    fn create_split<T: Element, R: Random>(points: &[Point<'_, T>], rng: &mut R) -> Hyperplane<T>;

    /// Per-item extra components to store before building, given every
    /// item's vector. `None` when the metric keeps no extra component.
    #[inline]
    fn preprocess<T: Element>(_vectors: &[&[T]]) -> Option<Vec<T>> {
        None
    }

    /// Which side of the plane `y` falls on.
    #[inline]
    fn side<T: Element>(normal: &[T], offset: T, y: &[T], y_extra: T) -> Side {
        Side::from_margin(Self::margin(normal, offset, y, y_extra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::Kiss32Random;

    #[test]
    fn test_metric_parsing() {
        assert_eq!("angular".parse::<Metric>().unwrap(), Metric::Angular);
        assert_eq!("Euclidean".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert_eq!("manhattan".parse::<Metric>().unwrap(), Metric::Manhattan);
        assert_eq!("dot".parse::<Metric>().unwrap(), Metric::DotProduct);
        assert_eq!("dotProduct".parse::<Metric>().unwrap(), Metric::DotProduct);
        assert_eq!("dot_product".parse::<Metric>().unwrap(), Metric::DotProduct);
        assert!(matches!(
            "hamming".parse::<Metric>(),
            Err(ForestError::UnsupportedMetric(_))
        ));
    }

    #[test]
    fn test_metric_name_roundtrip() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
        }
    }

    #[test]
    fn test_metric_euclidean() {
        let a = vec![0.0f32, 0.0];
        let b = vec![3.0f32, 4.0];
        assert!((Metric::Euclidean.distance(&a, &b) - 25.0).abs() < 1e-5);
        assert!((Metric::Euclidean.compute(&a, &b) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_metric_dot_product_reported_positive() {
        let a = vec![1.0f64, 2.0];
        let b = vec![3.0f64, 1.0];
        assert!((Metric::DotProduct.distance(&a, &b) + 5.0).abs() < 1e-12);
        assert!((Metric::DotProduct.compute(&a, &b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_metric_manhattan() {
        let a = vec![0.0f32, 0.0];
        let b = vec![3.0f32, -4.0];
        assert!((Metric::Manhattan.compute(&a, &b) - 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_metric_angular_orthogonal() {
        let a = vec![1.0f32, 0.0];
        let b = vec![0.0f32, 2.0];
        assert!((Metric::Angular.distance(&a, &b) - 2.0).abs() < 1e-6);
        assert!((Metric::Angular.compute(&a, &b) - 2.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_side_from_margin() {
        assert_eq!(Side::from_margin(0.0f32), Side::Right);
        assert_eq!(Side::from_margin(0.5f64), Side::Right);
        assert_eq!(Side::from_margin(-1e-9f64), Side::Left);
    }

    fn split_separates<D: Distance>() {
        let a: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![10.0 + i as f64 * 0.01, 10.0, 0.0])
            .collect();
        let b: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![-10.0, -10.0 - i as f64 * 0.01, 0.5])
            .collect();
        // Two seeds force the two means into different clusters.
        let points = vec![Point::plain(&a[0]), Point::plain(&b[0])];

        let mut rng = Kiss32Random::new(3);
        let plane = D::create_split(&points, &mut rng);
        let norm = f64::dot(&plane.normal, &plane.normal).sqrt();
        assert!((norm - 1.0).abs() < 1e-9);

        let side_a = D::side(&plane.normal, plane.offset, &a[0], 0.0);
        assert!(a
            .iter()
            .all(|v| D::side(&plane.normal, plane.offset, v, 0.0) == side_a));
        assert!(b
            .iter()
            .all(|v| D::side(&plane.normal, plane.offset, v, 0.0) != side_a));
    }

    #[test]
    fn test_splits_separate_clusters() {
        split_separates::<Angular>();
        split_separates::<Euclidean>();
        split_separates::<Manhattan>();
    }
}
