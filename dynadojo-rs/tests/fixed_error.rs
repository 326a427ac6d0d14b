//! Integration tests for the sample-complexity search challenge.

mod common;

use approx::assert_relative_eq;
use common::{Curve, CurveAct, CurveConfig, CurveModel, CurveSystem};
use dynadojo_rs::prelude::*;
use dynadojo_rs::session::{Cell, CellSession, CellSettings};

fn challenge(curve_config: FixedErrorConfig, latent_dims: Vec<usize>) -> FixedError<CurveSystem> {
    let config = ChallengeConfig::default()
        .with_latent_dims(latent_dims)
        .with_timesteps(10)
        .with_test_set(3, 10);
    FixedError::new(config, curve_config, ())
}

fn search_config() -> FixedErrorConfig {
    FixedErrorConfig::new(0.1).with_n_precision(1).with_n_max(100)
}

fn spec(curve: Curve) -> ModelSpec<CurveModel> {
    ModelSpec::new(CurveConfig::new(curve))
}

fn settings(n_max: usize) -> CellSettings {
    CellSettings {
        timesteps: 10,
        control_horizons: 1,
        max_control_cost: 2.0,
        test_examples: 3,
        test_timesteps: 10,
        noisy: false,
        ood: false,
        n_max,
    }
}

fn cell() -> Cell {
    Cell {
        rep: 0,
        latent_dim: 2,
        embed_dim: 2,
        system_seed: None,
        model_seed: None,
    }
}

#[test]
fn test_inverse_curve_finds_ten_per_latent_dim() {
    let table = challenge(search_config(), vec![2, 4])
        .evaluate(&spec(Curve::Inverse), &EvaluateOptions::default())
        .unwrap();

    let targets = table.search_targets();
    assert_eq!(targets.len(), 2);
    for target in &targets {
        let n = target.n_target.found().expect("target reachable");
        assert!(n.abs_diff(10) <= 1, "L={} found {n}", target.latent_dim);
    }
    assert_eq!(targets[0].latent_dim, 2);
    assert_eq!(targets[1].latent_dim, 4);
}

#[test]
fn test_every_evaluated_size_leaves_one_row() {
    let table = challenge(search_config(), vec![2])
        .evaluate(&spec(Curve::Inverse), &EvaluateOptions::default())
        .unwrap();

    let ns: Vec<_> = table.iter().map(|r| r.n).collect();
    assert_eq!(ns, vec![1, 2, 4, 8, 16, 12, 10, 9]);
    for row in &table {
        assert_relative_eq!(row.error, 1.0 / row.n as f64);
        let search = row.search.expect("search rows are annotated");
        assert_eq!(search.n_target, SearchOutcome::Found(10));
        assert_eq!(search.n_precision, 1);
    }
}

#[test]
fn test_flat_curve_is_unreachable() {
    let table = challenge(search_config(), vec![2])
        .evaluate(&spec(Curve::Constant(1.0)), &EvaluateOptions::default())
        .unwrap();

    let target = table.search_targets()[0];
    assert_eq!(target.n_target, SearchOutcome::Unreachable);
    assert_eq!(target.n_target.sentinel(), -1.0);
    assert!(table.iter().all(|r| r.n <= 100));
}

#[test]
fn test_bowl_above_target_is_local_minimum() {
    let curve = Curve::Bowl {
        center: 20.0,
        scale: 400.0,
        floor: 0.5,
    };
    let table = challenge(search_config(), vec![2])
        .evaluate(&spec(curve), &EvaluateOptions::default())
        .unwrap();

    let target = table.search_targets()[0];
    assert_eq!(target.n_target, SearchOutcome::LocalMinimum);
    assert!(target.n_target.sentinel().is_infinite());
}

#[test]
fn test_n_start_is_recorded() {
    let config = search_config().with_n_starts(vec![3, 5]);
    let table = challenge(config, vec![2, 4])
        .evaluate(&spec(Curve::Inverse), &EvaluateOptions::default())
        .unwrap();

    let first_probe = |latent_dim: usize| table.cell(0, latent_dim).next().map(|r| r.n);
    assert_eq!(first_probe(2), Some(3));
    assert_eq!(first_probe(4), Some(5));
    assert!(table.cell(0, 4).all(|r| r.search.map(|s| s.n_start) == Some(5)));
}

#[test]
fn test_memoized_run_is_bit_identical() {
    let spec = spec(Curve::Inverse);
    let mut session: CellSession<'_, CurveSystem, _> =
        CellSession::new(cell(), settings(100), &(), &spec, 10).unwrap();

    let first = session.model_run(7, 0).unwrap();
    let second = session.model_run(7, 0).unwrap();
    assert_eq!(first.error.to_bits(), second.error.to_bits());
    assert_eq!(session.rows().len(), 1);
}

#[test]
fn test_window_takes_median_over_clamped_range() {
    let spec = spec(Curve::Inverse);
    let mut session: CellSession<'_, CurveSystem, _> =
        CellSession::new(cell(), settings(100), &(), &spec, 10).unwrap();

    // [max(1, 1 - 2), 1 + 2] = [1, 3]
    let low = session.model_run(1, 2).unwrap();
    assert_relative_eq!(low.error, 0.5);

    // [96, min(102, 100)] = [96, 100]
    let high = session.model_run(99, 3).unwrap();
    assert_relative_eq!(high.error, 1.0 / 98.0);

    // the window center was already trained and stays memoized
    let exact = session.model_run(99, 0).unwrap();
    assert_relative_eq!(exact.error, 1.0 / 99.0);
    assert_eq!(session.rows().len(), 3 + 5);
}

#[test]
fn test_windowed_search_still_converges() {
    let config = search_config().with_n_window(1);
    let table = challenge(config, vec![2])
        .evaluate(&spec(Curve::Inverse), &EvaluateOptions::default())
        .unwrap();

    let n = table.search_targets()[0].n_target.found().unwrap();
    assert!(n.abs_diff(10) <= 1, "found {n}");
    let mut ns: Vec<_> = table.iter().map(|r| r.n).collect();
    let total = ns.len();
    ns.sort_unstable();
    ns.dedup();
    assert_eq!(ns.len(), total, "no size is trained twice");
}

#[test]
fn test_budget_violation_aborts_evaluation() {
    let config = ChallengeConfig::default()
        .with_latent_dims(vec![2])
        .with_timesteps(10)
        .with_control_horizons(3)
        .with_max_control_cost_per_dim(1.0)
        .with_test_set(3, 10);
    let challenge: FixedError<CurveSystem> = FixedError::new(config, search_config(), ());
    let spec = spec(Curve::Inverse).with_act(CurveAct {
        per_horizon_cost: 1.5,
    });

    let err = challenge
        .evaluate(&spec, &EvaluateOptions::default())
        .unwrap_err();
    assert!(matches!(err, DojoError::ControlBudgetExceeded { .. }));
}

#[test]
fn test_misshapen_prediction_aborts_evaluation() {
    let spec: ModelSpec<CurveModel> = ModelSpec::new(CurveConfig {
        curve: Curve::Inverse,
        misshapen: true,
    });
    let err = challenge(search_config(), vec![2])
        .evaluate(&spec, &EvaluateOptions::default())
        .unwrap_err();
    assert!(err.is_contract_violation());
}

#[test]
fn test_parallel_and_serial_runs_agree() {
    let challenge = challenge(search_config(), vec![1, 2, 3]);
    let serial = challenge
        .evaluate(
            &spec(Curve::Inverse),
            &EvaluateOptions::default().with_num_threads(1),
        )
        .unwrap();
    let parallel = challenge
        .evaluate(
            &spec(Curve::Inverse),
            &EvaluateOptions::default().with_num_threads(3),
        )
        .unwrap();

    let key = |t: &ResultTable| {
        t.iter()
            .map(|r| (r.latent_dim, r.n, r.error.to_bits()))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&serial), key(&parallel));
}
