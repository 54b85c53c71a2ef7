//! Criterion benchmarks for paramsweep_core
//!
//! Run with: cargo bench -p paramsweep_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use paramsweep_core::{
    BoxError, ConfigTree, LeafConfiguration, ParameterOptions, SampleEngine, Statistic,
    WorkerPool, format_data, unformat_data,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};

fn create_tree(axis_len: usize, num_axes: usize) -> ConfigTree {
    let mut tree = ConfigTree::new("bench");
    for axis in 0..num_axes {
        let values: Vec<f64> = (0..axis_len).map(|i| i as f64 * 0.1).collect();
        tree.insert(&format!("model.p{axis}"), values, ParameterOptions::default())
            .unwrap();
    }
    tree.insert("model.name", "ising", ParameterOptions::default())
        .unwrap();
    tree
}

fn gaussian(config: &LeafConfiguration, seed: u64) -> Result<f64, BoxError> {
    let mu = config.get_f64("model.p0").unwrap_or_default();
    let mut rng = SmallRng::seed_from_u64(seed);
    Ok(Normal::new(mu, 1.0)?.sample(&mut rng))
}

fn bench_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("expansion");

    for axis_len in [4usize, 8, 16].iter() {
        let tree = create_tree(*axis_len, 3);
        group.bench_with_input(BenchmarkId::new("axis_len", axis_len), axis_len, |b, _| {
            b.iter(|| black_box(&tree).enumerate().count())
        });
    }

    group.finish();
}

fn bench_shaping(c: &mut Criterion) {
    let flat: Vec<f64> = (0..4096).map(|i| i as f64).collect();

    c.bench_function("format_unformat_4096", |b| {
        b.iter(|| {
            let grid = format_data(&[16, 16, 16], black_box(flat.clone())).unwrap();
            unformat_data(&grid)
        })
    });
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");
    let tree = create_tree(2, 1);
    let leaf = tree.leaf_at(1).unwrap();

    for workers in [1usize, 2, 4].iter() {
        let pool = WorkerPool::new(*workers).unwrap();
        group.bench_with_input(BenchmarkId::new("workers", workers), workers, |b, _| {
            b.iter(|| {
                let engine = SampleEngine::new(&gaussian, &pool, 42);
                engine.statistic(black_box(&leaf), 10_000).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_statistic_merge(c: &mut Criterion) {
    let left = Statistic::from_samples(&(0..1000).map(f64::from).collect::<Vec<_>>());
    let right = Statistic::from_samples(&(1000..1500).map(f64::from).collect::<Vec<_>>());

    c.bench_function("statistic_merge", |b| {
        b.iter(|| black_box(&left).merge(black_box(&right)))
    });
}

criterion_group!(
    benches,
    bench_expansion,
    bench_shaping,
    bench_sampling,
    bench_statistic_merge,
);
criterion_main!(benches);
