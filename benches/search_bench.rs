use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ivfserve::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dimension).map(|_| rng.random_range(-1.0..1.0)).collect())
        .collect()
}

fn build(config: IndexConfig, vectors: &[Vec<f32>]) -> IndexSnapshot {
    let mut builder = IndexBuilder::with_capacity(config, vectors.len()).unwrap();
    builder.add_batch(vectors).unwrap();
    builder.build().unwrap()
}

fn bench_search(c: &mut Criterion) {
    let dimension = 64;
    let vectors = random_vectors(20_000, dimension, 1);
    let queries = random_vectors(16, dimension, 2);

    let flat = build(IndexConfig::new(dimension), &vectors);
    let partitioned = build(
        IndexConfig::new(dimension).partitioned(IvfParams::new(64, 8)),
        &vectors,
    );

    let mut group = c.benchmark_group("search_top10");
    group.bench_function("flat", |b| {
        let params = SearchParams::new(10);
        b.iter(|| {
            for query in &queries {
                black_box(flat.search(black_box(query), &params).unwrap());
            }
        })
    });

    for n_probe in [1, 8, 32] {
        group.bench_with_input(
            BenchmarkId::new("partitioned", n_probe),
            &n_probe,
            |b, &n_probe| {
                let params = SearchParams::new(10).with_n_probe(n_probe);
                b.iter(|| {
                    for query in &queries {
                        black_box(partitioned.search(black_box(query), &params).unwrap());
                    }
                })
            },
        );
    }
    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let vectors = random_vectors(5_000, 32, 3);
    c.bench_function("train_16_partitions", |b| {
        b.iter(|| {
            build(
                IndexConfig::new(32).partitioned(IvfParams::new(16, 4)),
                black_box(&vectors),
            )
        })
    });
}

criterion_group!(benches, bench_search, bench_training);
criterion_main!(benches);
