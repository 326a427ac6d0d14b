//! Closed-loop training with control-cost accounting.
//!
//! One run trains a freshly built model over `control_horizons` rounds:
//!
//! ```text
//! horizon 0      fit(x)
//! horizon j ≥ 1  u = act(x)            cost += calc_control_cost(u)
//!                x = make_data(x[:, T-1], u)
//!                fit(x)
//! ```
//!
//! Once every horizon has run, the accumulated control cost must not exceed the
//! run's budget. Exceeding it means the experiment promised a budget the model
//! cannot respect, so the run fails with [`DojoError::ControlBudgetExceeded`].

use ndarray::ArrayView3;
use tracing::debug;

use crate::error::{DojoError, Result};
use crate::model::{Model, ModelSpec};
use crate::system::System;
use crate::trajectory::{last_states, Trajectories};

/// Parameters of one closed-loop training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedLoopConfig {
    /// Length of every generated training trajectory.
    pub timesteps: usize,
    /// Number of training rounds; `0` behaves like `1`.
    pub control_horizons: usize,
    /// Total control cost the run may spend.
    pub max_control_cost: f64,
    /// Whether generated trajectories carry observation noise.
    pub noisy: bool,
}

/// What a closed-loop run spent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosedLoopOutcome {
    /// Control cost summed over all horizons.
    pub total_cost: f64,
    /// Cost of each controlled horizon (horizons 1..H).
    pub horizon_costs: Vec<f64>,
}

/// Trains `model` on `x`, then on controlled continuations of it.
///
/// Mutates the fit state of `model` across horizons and advances the random
/// state of `system`.
///
/// # Errors
///
/// Propagates any collaborator error, fails with
/// [`DojoError::ShapeMismatch`] on contract violations, and with
/// [`DojoError::ControlBudgetExceeded`] when the accumulated cost exceeds
/// `config.max_control_cost`.
pub fn fit_closed_loop<S: System, M: Model>(
    system: &mut S,
    model: &mut M,
    spec: &ModelSpec<M>,
    x: ArrayView3<'_, f64>,
    config: &ClosedLoopConfig,
) -> Result<ClosedLoopOutcome> {
    let mut outcome = ClosedLoopOutcome::default();
    model.fit(x, &spec.fit)?;

    let mut current: Option<Trajectories> = None;
    for horizon in 1..config.control_horizons.max(1) {
        let batch = match &current {
            Some(c) => c.view(),
            None => x.reborrow(),
        };
        let control = model.act(batch, &spec.act)?;
        let cost = system.calc_control_cost(control.view())?;
        outcome.total_cost += cost;
        outcome.horizon_costs.push(cost);

        let next = system.make_data(
            last_states(batch),
            Some(control.view()),
            config.timesteps,
            config.noisy,
        )?;
        model.fit(next.view(), &spec.fit)?;
        debug!(
            horizon,
            cost,
            total_cost = outcome.total_cost,
            "control horizon complete"
        );
        current = Some(next);
    }

    if outcome.total_cost > config.max_control_cost {
        return Err(DojoError::ControlBudgetExceeded {
            total: outcome.total_cost,
            budget: config.max_control_cost,
        });
    }
    Ok(outcome)
}
