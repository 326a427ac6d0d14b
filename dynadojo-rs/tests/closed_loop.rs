//! Closed-loop training against the control budget.

mod common;

use approx::assert_relative_eq;
use common::{Curve, CurveAct, CurveConfig, CurveModel, CurveSystem};
use dynadojo_rs::prelude::*;
use dynadojo_rs::system::instantiate;
use dynadojo_rs::trainer::{fit_closed_loop, ClosedLoopConfig};

fn loop_config(control_horizons: usize) -> ClosedLoopConfig {
    ClosedLoopConfig {
        timesteps: 5,
        control_horizons,
        // two latent dims at one unit per dim
        max_control_cost: 2.0,
        noisy: false,
    }
}

fn setup(per_horizon_cost: f64) -> (CurveSystem, CurveModel, ModelSpec<CurveModel>) {
    let spec = ModelSpec::new(CurveConfig::new(Curve::Inverse))
        .with_act(CurveAct { per_horizon_cost });
    let system: CurveSystem = instantiate(2, 2, &(), Some(0)).unwrap();
    let model = spec.build(2, 5, 2.0, None).unwrap();
    (system, model, spec)
}

#[test]
fn test_budget_met_exactly_is_accepted() {
    let (mut system, mut model, spec) = setup(1.0);
    let x = system.make_trainset(4, 5, false).unwrap();

    let outcome =
        fit_closed_loop(&mut system, &mut model, &spec, x.view(), &loop_config(3)).unwrap();
    assert_eq!(outcome.horizon_costs.len(), 2);
    assert_relative_eq!(outcome.total_cost, 2.0);
    // initial fit plus one refit per control round
    assert_eq!(model.fits(), 3);
}

#[test]
fn test_budget_overrun_is_an_error() {
    let (mut system, mut model, spec) = setup(1.5);
    let x = system.make_trainset(4, 5, false).unwrap();

    let err =
        fit_closed_loop(&mut system, &mut model, &spec, x.view(), &loop_config(3)).unwrap_err();
    match err {
        DojoError::ControlBudgetExceeded { total, budget } => {
            assert_relative_eq!(total, 3.0);
            assert_relative_eq!(budget, 2.0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_zero_horizons_fit_once() {
    let (mut system, mut model, spec) = setup(10.0);
    let x = system.make_trainset(4, 5, false).unwrap();

    let outcome =
        fit_closed_loop(&mut system, &mut model, &spec, x.view(), &loop_config(0)).unwrap();
    assert_eq!(outcome.total_cost, 0.0);
    assert!(outcome.horizon_costs.is_empty());
    assert_eq!(model.fits(), 1);
}

#[test]
fn test_controlled_sweep_stays_within_budget() {
    let config = ChallengeConfig::default()
        .with_latent_dims(vec![2])
        .with_timesteps(5)
        .with_control_horizons(3)
        .with_max_control_cost_per_dim(1.0)
        .with_test_set(2, 5);
    let spec = ModelSpec::<CurveModel>::new(CurveConfig::new(Curve::Inverse)).with_act(
        CurveAct {
            per_horizon_cost: 1.0,
        },
    );
    let challenge: SampleSweep<CurveSystem> =
        SampleSweep::fixed_complexity(config, SampleSweepConfig::new(vec![2, 4]), ());

    let table = challenge
        .evaluate(&spec, &EvaluateOptions::default())
        .unwrap();
    assert_eq!(table.len(), 2);
    for row in &table {
        assert_relative_eq!(row.cost, 2.0);
        assert_relative_eq!(row.error, 1.0 / row.n as f64);
    }
}
