use super::split::{two_means, unit_normal};
use super::{Distance, Hyperplane, Metric, Point};
use crate::element::Element;
use crate::random::Random;

/// Angular distance: the Euclidean distance between unit-normalized vectors.
///
/// The ranking score is `2 - 2 cos(u, v)`, reported as its square root.
/// Zero vectors are at score 2 from everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Angular;

/// `2 - 2 pq / sqrt(pp qq)`, or 2 when either norm is zero.
#[inline]
pub(super) fn cosine_score<T: Element>(pp: T, qq: T, pq: T) -> T {
    let ppqq = pp * qq;
    if ppqq > T::ZERO {
        T::TWO - T::TWO * pq / ppqq.sqrt()
    } else {
        T::TWO
    }
}

impl Distance for Angular {
    const METRIC: Metric = Metric::Angular;
    const COSINE: bool = true;

    #[inline]
    fn distance<T: Element>(x: &[T], y: &[T]) -> T {
        cosine_score(T::dot(x, x), T::dot(y, y), T::dot(x, y))
    }

    #[inline]
    fn normalized_distance<T: Element>(distance: T) -> T {
        distance.max(T::ZERO).sqrt()
    }

    #[inline]
    fn margin<T: Element>(normal: &[T], _offset: T, y: &[T], _y_extra: T) -> T {
        T::dot(normal, y)
    }

    fn create_split<T: Element, R: Random>(points: &[Point<'_, T>], rng: &mut R) -> Hyperplane<T> {
        let (p, q) = two_means::<T, Self, R>(points, rng, Self::COSINE);
        let normal = unit_normal(&p, &q, rng);
        Hyperplane {
            normal: normal.vector,
            offset: T::ZERO,
        }
    }
}
