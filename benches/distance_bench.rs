//! Benchmarks for distance function implementations.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use forge_forest::dataset::Dataset;
use forge_forest::distance::{scalar, simd};
use forge_forest::Metric;

fn benchmark_distances(c: &mut Criterion) {
    let dimensions = vec![64, 128, 256, 512, 768, 1024];

    for dim in &dimensions {
        let pair = Dataset::generate(2, 0, *dim, 1);
        let (v1, v2) = (&pair.vectors[0], &pair.vectors[1]);

        let mut group = c.benchmark_group(format!("euclidean_squared_{}", dim));

        group.bench_function("scalar", |b| {
            b.iter(|| scalar::euclidean_distance_squared(black_box(v1), black_box(v2)))
        });

        group.bench_function("simd", |b| {
            b.iter(|| simd::euclidean_distance_squared(black_box(v1), black_box(v2)))
        });

        group.finish();
    }

    // Throughput benchmark: 10K vectors at 128 dimensions
    let dataset = Dataset::generate(10_000, 1, 128, 2);
    let query = &dataset.queries[0];

    for metric in Metric::ALL {
        c.bench_function(&format!("{}_throughput_10k_128d", metric), |b| {
            b.iter(|| {
                let sum: f32 = dataset
                    .vectors
                    .iter()
                    .map(|v| metric.distance(black_box(query), black_box(v)))
                    .sum();
                black_box(sum)
            })
        });
    }

    // Additional benchmarks for dot product and manhattan
    let pair = Dataset::generate(2, 0, 128, 3);
    let (v1, v2) = (&pair.vectors[0], &pair.vectors[1]);

    let mut group = c.benchmark_group("dot_product_128");
    group.bench_function("scalar", |b| {
        b.iter(|| scalar::dot_product(black_box(v1), black_box(v2)))
    });
    group.bench_function("simd", |b| {
        b.iter(|| simd::dot_product(black_box(v1), black_box(v2)))
    });
    group.finish();

    let mut group = c.benchmark_group("manhattan_128");
    group.bench_function("scalar", |b| {
        b.iter(|| scalar::manhattan_distance(black_box(v1), black_box(v2)))
    });
    group.bench_function("simd", |b| {
        b.iter(|| simd::manhattan_distance(black_box(v1), black_box(v2)))
    });
    group.finish();
}

criterion_group!(benches, benchmark_distances);
criterion_main!(benches);
