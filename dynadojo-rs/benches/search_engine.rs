//! Benchmarks for the sample-complexity search engine.
//!
//! - Search overhead against synthetic error curves (no training)
//! - Least-squares runs through a memoized cell session
//! - Trajectory generation of the reference linear system

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynadojo_rs::models::{LeastSquaresConfig, LeastSquaresModel};
use dynadojo_rs::session::{Cell, CellSession, CellSettings};
use dynadojo_rs::system::{instantiate, System};
use dynadojo_rs::systems::{LinearSystem, LinearSystemConfig};
use dynadojo_rs::{search, Evaluation, ModelSpec, Result, SearchParams};

/// Search over `1 / n` for targets reached at increasing sizes.
fn bench_search_synthetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_synthetic");

    for n_target in [10_usize, 100, 1_000, 10_000] {
        let params = SearchParams {
            target_error: 1.0 / n_target as f64,
            n_precision: 1,
            n_window: 0,
            n_max: 100_000,
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(n_target),
            &params,
            |b, params| {
                b.iter(|| {
                    let mut oracle = |n: usize, _window: usize| -> Result<Evaluation> {
                        Ok(Evaluation {
                            error: 1.0 / n as f64,
                            cost: 0.0,
                        })
                    };
                    let outcome = search(&mut oracle, black_box(params), 1);
                    black_box(outcome)
                });
            },
        );
    }

    group.finish();
}

fn settings() -> CellSettings {
    CellSettings {
        timesteps: 20,
        control_horizons: 1,
        max_control_cost: 0.0,
        test_examples: 20,
        test_timesteps: 20,
        noisy: false,
        ood: false,
        n_max: 1_000,
    }
}

/// Uncached least-squares runs of growing size.
fn bench_model_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_run");
    group.sample_size(20);

    let spec = ModelSpec::<LeastSquaresModel>::new(LeastSquaresConfig::default());
    for latent_dim in [2_usize, 8] {
        let cell = Cell {
            rep: 0,
            latent_dim,
            embed_dim: latent_dim,
            system_seed: Some(1),
            model_seed: Some(2),
        };
        group.bench_with_input(
            BenchmarkId::new("least_squares", latent_dim),
            &cell,
            |b, cell| {
                b.iter(|| {
                    let mut session: CellSession<'_, LinearSystem, _> = CellSession::new(
                        *cell,
                        settings(),
                        &LinearSystemConfig::default(),
                        &spec,
                        50,
                    )
                    .expect("session");
                    black_box(session.model_run(50, 0).expect("run"))
                });
            },
        );
    }

    group.finish();
}

/// Trajectory generation throughput.
fn bench_make_trainset(c: &mut Criterion) {
    let mut group = c.benchmark_group("make_trainset");

    for latent_dim in [2_usize, 16, 64] {
        let mut system: LinearSystem =
            instantiate(latent_dim, latent_dim, &LinearSystemConfig::default(), Some(0))
                .expect("system");
        group.bench_function(BenchmarkId::from_parameter(latent_dim), |b| {
            b.iter(|| black_box(system.make_trainset(black_box(100), 50, false)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_search_synthetic,
    bench_model_run,
    bench_make_trainset
);
criterion_main!(benches);
