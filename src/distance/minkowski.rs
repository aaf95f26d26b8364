use super::split::{two_means, unit_normal};
use super::{Distance, Hyperplane, Metric, Point};
use crate::element::Element;
use crate::random::Random;

/// Split plane through the midpoint of the two means, with
/// `bias = -dot(normal, (p + q) / 2)`.
fn bisecting_split<T, D, R>(points: &[Point<'_, T>], rng: &mut R) -> Hyperplane<T>
where
    T: Element,
    D: Distance,
    R: Random,
{
    let (p, q) = two_means::<T, D, R>(points, rng, false);
    let normal = unit_normal(&p, &q, rng).vector;

    let mut bias = T::ZERO;
    for ((&n, &a), &b) in normal.iter().zip(&p.vector).zip(&q.vector) {
        bias += n * (a + b) / T::TWO;
    }
    Hyperplane {
        normal,
        offset: -bias,
    }
}

/// Euclidean (L2) distance. Ranked by the squared distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Euclidean;

impl Distance for Euclidean {
    const METRIC: Metric = Metric::Euclidean;

    #[inline]
    fn distance<T: Element>(x: &[T], y: &[T]) -> T {
        T::euclidean_squared(x, y)
    }

    #[inline]
    fn normalized_distance<T: Element>(distance: T) -> T {
        distance.max(T::ZERO).sqrt()
    }

    #[inline]
    fn margin<T: Element>(normal: &[T], offset: T, y: &[T], _y_extra: T) -> T {
        offset + T::dot(normal, y)
    }

    fn create_split<T: Element, R: Random>(points: &[Point<'_, T>], rng: &mut R) -> Hyperplane<T> {
        bisecting_split::<T, Self, R>(points, rng)
    }
}

/// Manhattan (L1) distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Manhattan;

impl Distance for Manhattan {
    const METRIC: Metric = Metric::Manhattan;

    #[inline]
    fn distance<T: Element>(x: &[T], y: &[T]) -> T {
        T::manhattan(x, y)
    }

    #[inline]
    fn normalized_distance<T: Element>(distance: T) -> T {
        distance.max(T::ZERO)
    }

    #[inline]
    fn margin<T: Element>(normal: &[T], offset: T, y: &[T], _y_extra: T) -> T {
        offset + T::dot(normal, y)
    }

    fn create_split<T: Element, R: Random>(points: &[Point<'_, T>], rng: &mut R) -> Hyperplane<T> {
        bisecting_split::<T, Self, R>(points, rng)
    }
}
