//! Lasso solver and tracking benchmarks
//!
//! - Coordinate-descent fit on synthetic data of increasing size
//! - Multi-feature fit where most coefficients are driven to zero
//! - Latest-run resolution over a populated in-memory store

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rastreo::data::{Dataset, SyntheticLinear};
use rastreo::experiment::{MemoryTrackingStore, RunRecord, TrackingStore};
use rastreo::model::{Lasso, LassoParams};
use rastreo::tracking::latest_run_id;

/// `n_features` uniform columns; only the first two influence the target
fn sparse_dataset(n_samples: usize, n_features: usize) -> Dataset {
    let mut rng = StdRng::seed_from_u64(7);
    let features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_samples).map(|_| rng.random::<f64>() * 10.0).collect())
        .collect();
    let targets = (0..n_samples)
        .map(|i| 3.0 * features[0][i] - 2.0 * features[1][i] + 5.0 + rng.random::<f64>())
        .collect();
    Dataset::new(features, targets).unwrap()
}

/// Benchmark single-feature fits
fn bench_fit_single_feature(c: &mut Criterion) {
    let mut group = c.benchmark_group("lasso_fit_single_feature");
    let lasso = Lasso::new(LassoParams::new(0.5, 1000));

    for n_samples in [100, 1_000, 10_000] {
        let data = SyntheticLinear {
            n_samples,
            ..SyntheticLinear::default()
        }
        .generate()
        .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n_samples), &data, |b, data| {
            b.iter(|| black_box(lasso.fit(black_box(data)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark sparse multi-feature fits
fn bench_fit_sparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("lasso_fit_sparse");
    let lasso = Lasso::new(LassoParams::new(0.1, 1000));

    for n_features in [10, 50] {
        let data = sparse_dataset(2_000, n_features);
        group.bench_with_input(BenchmarkId::from_parameter(n_features), &data, |b, data| {
            b.iter(|| black_box(lasso.fit(black_box(data)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark latest-run lookup
fn bench_latest_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("latest_run_id");

    for n_runs in [10_i64, 1_000] {
        let store = MemoryTrackingStore::new();
        let exp = store.create_experiment("bench").unwrap();
        for i in 0..n_runs {
            let run = RunRecord::builder(format!("run-{i}"), exp.experiment_id())
                .started_at(Utc.timestamp_millis_opt(i).unwrap())
                .build();
            store.put_run(&run).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(n_runs), &store, |b, store| {
            b.iter(|| black_box(latest_run_id(store, "bench").unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit_single_feature, bench_fit_sparse, bench_latest_run);
criterion_main!(benches);
