//! Benchmarks for fluid-incremental.
//!
//! Target: translating a single-item batch < 1μs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fluid_incremental::{
    filter_change, Aggregator, ChangeWindow, IncrementalSum, SelectState, SetChange, SetOperator, Side,
};
use std::collections::HashSet;

fn bench_set_operator(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_operator");
    let other: HashSet<i64> = (0..10000).step_by(2).collect();

    for size in [1, 10, 100, 1000] {
        let change = SetChange::add((0..size).collect::<Vec<i64>>());

        for op in [SetOperator::Union, SetOperator::Intersection, SetOperator::SymmetricExcept] {
            group.bench_with_input(BenchmarkId::new(op.name(), size), &change, |b, change| {
                b.iter(|| op.translate(Side::Left, black_box(change), |x| other.contains(x)))
            });
        }
    }

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");

    for size in [1, 10, 100, 1000] {
        let change = SetChange::add((0..size).collect::<Vec<i64>>());

        group.bench_with_input(BenchmarkId::new("filter_gt_50", size), &change, |b, change| {
            b.iter(|| filter_change(black_box(change), |&x| x > 50))
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");

    for size in [10, 100, 1000] {
        let add = SetChange::add((0..size).collect::<Vec<i64>>());
        let remove = SetChange::remove((0..size).collect::<Vec<i64>>());

        group.bench_with_input(BenchmarkId::new("mod_16_add_remove", size), &size, |b, _| {
            b.iter(|| {
                let mut state = SelectState::new();
                black_box(state.apply(&add, |x| x % 16));
                black_box(state.apply(&remove, |x| x % 16))
            })
        });
    }

    group.finish();
}

fn bench_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("window");

    for batches in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("coalesce", batches), &batches, |b, &batches| {
            b.iter(|| {
                let mut window = ChangeWindow::new();
                for i in 0..batches {
                    window.push(&SetChange::add(vec![i, i + 1]));
                    window.push(&SetChange::remove(vec![i]));
                }
                black_box(window.drain())
            })
        });
    }

    group.finish();
}

fn bench_sum(c: &mut Criterion) {
    let change = SetChange::add((0..1000).collect::<Vec<i64>>());

    c.bench_function("sum_1000", |b| {
        b.iter(|| {
            let mut sum = IncrementalSum::<i64>::new();
            sum.apply(black_box(&change)).ok();
            black_box(sum.value())
        })
    });
}

criterion_group!(benches, bench_set_operator, bench_filter, bench_select, bench_window, bench_sum);
criterion_main!(benches);
