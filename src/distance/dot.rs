use super::angular::cosine_score;
use super::split::{two_means, unit_normal};
use super::{Distance, Hyperplane, Metric, Point};
use crate::element::Element;
use crate::random::Random;

/// Maximum inner product search.
///
/// Ranked by `-dot(u, v)` and reported as `dot(u, v)`. Before building, every
/// item is lifted into `f + 1` dimensions with the extra component
/// `sqrt(max_norm^2 - |v|^2)`, which puts all items on a common sphere.
/// Splitting then becomes an angular problem in the lifted space; queries are
/// lifted with a zero extra component, which leaves inner products unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DotProduct;

impl Distance for DotProduct {
    const METRIC: Metric = Metric::DotProduct;
    const COSINE: bool = true;

    #[inline]
    fn distance<T: Element>(x: &[T], y: &[T]) -> T {
        -T::dot(x, y)
    }

    #[inline]
    fn normalized_distance<T: Element>(distance: T) -> T {
        -distance
    }

    #[inline]
    fn margin<T: Element>(normal: &[T], offset: T, y: &[T], y_extra: T) -> T {
        T::dot(normal, y) + offset * y_extra
    }

    #[inline]
    fn split_distance<T: Element>(x: &Point<'_, T>, y: &Point<'_, T>) -> T {
        let pp = T::dot(x.vector, x.vector) + x.extra * x.extra;
        let qq = T::dot(y.vector, y.vector) + y.extra * y.extra;
        let pq = T::dot(x.vector, y.vector) + x.extra * y.extra;
        cosine_score(pp, qq, pq)
    }

    fn create_split<T: Element, R: Random>(points: &[Point<'_, T>], rng: &mut R) -> Hyperplane<T> {
        let (p, q) = two_means::<T, Self, R>(points, rng, Self::COSINE);
        let normal = unit_normal(&p, &q, rng);
        Hyperplane {
            normal: normal.vector,
            offset: normal.extra,
        }
    }

    fn preprocess<T: Element>(vectors: &[&[T]]) -> Option<Vec<T>> {
        let squared: Vec<T> = vectors.iter().map(|v| T::dot(v, v)).collect();
        let max = squared.iter().copied().fold(T::ZERO, T::max);
        Some(
            squared
                .into_iter()
                .map(|sq| (max - sq).max(T::ZERO).sqrt())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores() {
        let a = [1.0f64, 2.0];
        let b = [3.0f64, -1.0];
        assert_eq!(DotProduct::distance(&a, &b), -1.0);
        assert_eq!(DotProduct::normalized_distance(-1.0f64), 1.0);
    }

    #[test]
    fn test_preprocess_lifts_to_common_norm() {
        let a = [3.0f64, 4.0];
        let b = [1.0f64, 0.0];
        let c = [0.0f64, 0.0];
        let vectors: Vec<&[f64]> = vec![&a[..], &b[..], &c[..]];
        let extras = DotProduct::preprocess(&vectors).unwrap();
        assert_eq!(extras[0], 0.0);
        for (v, e) in vectors.iter().zip(&extras) {
            let lifted = f64::dot(v, v) + e * e;
            assert!((lifted - 25.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_margin_uses_extra_component() {
        let n = [1.0f32, 0.0];
        assert_eq!(DotProduct::margin(&n, 0.5, &[2.0, 9.0], 4.0), 4.0);
        assert_eq!(DotProduct::margin(&n, 0.5, &[2.0, 9.0], 0.0), 2.0);
    }

    #[test]
    fn test_split_distance_in_lifted_space() {
        let v = [1.0f64, 0.0];
        let x = Point { vector: &v[..], extra: 0.0 };
        let y = Point { vector: &v[..], extra: 1.0 };
        // cos = 1 / sqrt(2)
        let expected = 2.0 - 2.0 / 2.0f64.sqrt();
        assert!((DotProduct::split_distance(&x, &y) - expected).abs() < 1e-12);
    }
}
