//! Two-means clustering used to choose split planes.

use super::{Distance, Point};
use crate::constants::build::TWO_MEANS_ITERATIONS;
use crate::element::Element;
use crate::random::Random;

/// An owned point: a running centroid or a split normal.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Centroid<T> {
    pub vector: Vec<T>,
    pub extra: T,
}

impl<T: Element> Centroid<T> {
    fn from_point(point: &Point<'_, T>) -> Self {
        Self {
            vector: point.vector.to_vec(),
            extra: point.extra,
        }
    }

    fn as_point(&self) -> Point<'_, T> {
        Point {
            vector: &self.vector,
            extra: self.extra,
        }
    }

    /// Scale to unit length, extra component included. Zero stays zero.
    pub fn normalize(&mut self) {
        let norm = augmented_norm(&self.as_point());
        if norm > T::ZERO {
            for x in self.vector.iter_mut() {
                *x = *x / norm;
            }
            self.extra = self.extra / norm;
        }
    }

    /// Fold `point / norm` into the running mean of `count` samples.
    fn absorb(&mut self, point: &Point<'_, T>, norm: T, count: usize) {
        let weight = T::from_usize(count);
        let next = T::from_usize(count + 1);
        for (c, &x) in self.vector.iter_mut().zip(point.vector) {
            *c = (*c * weight + x / norm) / next;
        }
        self.extra = (self.extra * weight + point.extra / norm) / next;
    }
}

/// Length of `(vector, extra)`.
#[inline]
pub(crate) fn augmented_norm<T: Element>(point: &Point<'_, T>) -> T {
    (T::dot(point.vector, point.vector) + point.extra * point.extra).sqrt()
}

/// Cluster `points` around two centroids.
///
/// Starts from two distinct random points, then repeatedly samples a point
/// and pulls the nearer centroid towards it. Distances are weighted by the
/// centroid's sample count so a crowded centroid does not swallow everything.
pub(crate) fn two_means<T, D, R>(
    points: &[Point<'_, T>],
    rng: &mut R,
    cosine: bool,
) -> (Centroid<T>, Centroid<T>)
where
    T: Element,
    D: Distance,
    R: Random,
{
    let count = points.len();
    debug_assert!(count >= 2, "two_means needs at least two points");

    let i = rng.index(count);
    let j = if count > 1 {
        let j = rng.index(count - 1);
        j + usize::from(j >= i)
    } else {
        i
    };

    let mut p = Centroid::from_point(&points[i]);
    let mut q = Centroid::from_point(&points[j]);
    if cosine {
        p.normalize();
        q.normalize();
    }

    let (mut ic, mut jc) = (1usize, 1usize);
    for _ in 0..TWO_MEANS_ITERATIONS {
        let point = &points[rng.index(count)];
        let di = T::from_usize(ic) * D::split_distance(&p.as_point(), point);
        let dj = T::from_usize(jc) * D::split_distance(&q.as_point(), point);
        let norm = if cosine {
            augmented_norm(point)
        } else {
            T::ONE
        };
        if !(norm > T::ZERO) {
            continue;
        }

        if di < dj {
            p.absorb(point, norm, ic);
            ic += 1;
        } else if dj < di {
            q.absorb(point, norm, jc);
            jc += 1;
        }
    }
    (p, q)
}

/// Unit normal pointing from `q` towards `p`.
///
/// Coincident centroids give a zero difference; a random Gaussian direction
/// is used instead so the split still partitions the points.
pub(crate) fn unit_normal<T: Element, R: Random>(
    p: &Centroid<T>,
    q: &Centroid<T>,
    rng: &mut R,
) -> Centroid<T> {
    let mut normal = Centroid {
        vector: p
            .vector
            .iter()
            .zip(&q.vector)
            .map(|(&a, &b)| a - b)
            .collect(),
        extra: p.extra - q.extra,
    };

    if !(augmented_norm(&normal.as_point()) > T::ZERO) {
        tracing::trace!(
            dimensions = normal.vector.len(),
            "coincident centroids, drawing a random split normal"
        );
        for x in normal.vector.iter_mut() {
            *x = T::from_f64(rng.gaussian());
        }
        normal.extra = T::ZERO;
    }

    normal.normalize();
    normal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{Angular, Euclidean};
    use crate::random::Kiss32Random;

    #[test]
    fn test_two_means_finds_clusters() {
        let near: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 * 0.01, 0.0]).collect();
        let far: Vec<Vec<f64>> = (0..10).map(|i| vec![100.0 + i as f64 * 0.01, 0.0]).collect();
        let points: Vec<Point<'_, f64>> = vec![Point::plain(&near[0]), Point::plain(&far[0])];

        let mut rng = Kiss32Random::new(11);
        let (p, q) = two_means::<f64, Euclidean, _>(&points, &mut rng, false);
        let (lo, hi) = if p.vector[0] < q.vector[0] { (p, q) } else { (q, p) };
        assert!(lo.vector[0] < 1.0);
        assert!(hi.vector[0] > 99.0);
    }

    #[test]
    fn test_cosine_centroids_are_unit() {
        let a = vec![3.0f32, 4.0];
        let b = vec![0.0f32, -2.0];
        let points = vec![Point::plain(&a[..]), Point::plain(&b[..])];

        let mut rng = Kiss32Random::new(5);
        let (p, q) = two_means::<f32, Angular, _>(&points, &mut rng, true);
        for c in [&p, &q] {
            let norm = augmented_norm(&c.as_point());
            assert!((norm - 1.0).abs() < 1e-4, "norm = {}", norm);
        }
    }

    #[test]
    fn test_unit_normal_falls_back_to_random_direction() {
        let c = Centroid {
            vector: vec![1.0f64, 1.0, 1.0],
            extra: 0.0,
        };
        let mut rng = Kiss32Random::new(1);
        let normal = unit_normal(&c, &c.clone(), &mut rng);
        let norm = augmented_norm(&normal.as_point());
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_normal_direction() {
        let p = Centroid {
            vector: vec![2.0f64, 0.0],
            extra: 0.0,
        };
        let q = Centroid {
            vector: vec![0.0f64, 0.0],
            extra: 0.0,
        };
        let mut rng = Kiss32Random::new(1);
        let normal = unit_normal(&p, &q, &mut rng);
        assert_eq!(normal.vector, vec![1.0, 0.0]);
    }
}
