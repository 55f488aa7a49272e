//! Benchmarks for fluid-index using criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fluid_index::WeightedIndex;

fn index_insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("wbtree_insert");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut index = WeightedIndex::new();
                for i in 0..size {
                    index.insert(i);
                }
                black_box(index)
            });
        });
    }

    group.finish();
}

fn index_remove_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("wbtree_remove");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut index: WeightedIndex<i32> = (0..size).collect();
                for i in (0..size).step_by(3) {
                    index.remove(&i);
                }
                black_box(index)
            });
        });
    }

    group.finish();
}

fn index_rank_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("wbtree_rank");

    for size in [100, 1000, 10000].iter() {
        let index: WeightedIndex<i32> = (0..*size).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                for i in (0..100).map(|x| x * size / 100) {
                    black_box(index.rank(&i).ok());
                    black_box(index.at(i as usize).ok());
                }
            });
        });
    }

    group.finish();
}

fn index_iter_benchmark(c: &mut Criterion) {
    let index: WeightedIndex<i32> = (0..100000).collect();

    c.bench_function("wbtree_iter_100000", |b| {
        b.iter(|| black_box(index.iter().fold(0i64, |acc, &x| acc + x as i64)))
    });
}

criterion_group!(
    benches,
    index_insert_benchmark,
    index_remove_benchmark,
    index_rank_benchmark,
    index_iter_benchmark
);
criterion_main!(benches);
