// Criterion benchmarks for the semantic search core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use semantic_search::core::{hash_embedding, l2_squared, FlatIndex};

const DIM: usize = 1536;

fn pseudo_vector(seed: usize, dim: usize) -> Vec<f32> {
    (0..dim)
        .map(|i| (((seed * 31 + i * 17) % 97) as f32 / 97.0) - 0.5)
        .collect()
}

fn build_index(size: usize) -> FlatIndex {
    let mut index = FlatIndex::new(DIM);
    for id in 0..size {
        index
            .add(id as i64, &pseudo_vector(id, DIM))
            .expect("dimension matches");
    }
    index
}

fn bench_l2_squared(c: &mut Criterion) {
    let a = pseudo_vector(1, DIM);
    let b = pseudo_vector(2, DIM);

    c.bench_function("l2_squared_1536", |bench| {
        bench.iter(|| l2_squared(black_box(&a), black_box(&b)))
    });
}

fn bench_flat_index_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_index_search");
    let query = pseudo_vector(12345, DIM);

    for size in [100usize, 1_000, 10_000] {
        let index = build_index(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &index, |bench, index| {
            bench.iter(|| index.search(black_box(&query), black_box(3)))
        });
    }

    group.finish();
}

fn bench_hash_embedding(c: &mut Criterion) {
    let text = "Rust guarantees memory safety without a garbage collector, \
                and its ownership model makes concurrent code easier to reason about.";

    c.bench_function("hash_embedding_1536", |bench| {
        bench.iter(|| hash_embedding(black_box(text), DIM))
    });
}

criterion_group!(benches, bench_l2_squared, bench_flat_index_search, bench_hash_embedding);
criterion_main!(benches);
