//! Per-cell evaluation session.
//!
//! A [`CellSession`] owns everything one `(rep, latent_dim, embed_dim)` cell
//! needs and nothing another cell could touch: its system, the held-out test
//! sets, the growable trajectory pool, the run memo and the result rows. The
//! search engine drives it through [`ErrorOracle`]; the sample sweeps call
//! [`CellSession::model_run`] directly.
//!
//! Each training-set size is trained at most once per session. Later requests
//! for the same size, including those made while smoothing over a window,
//! return the memoized result and append no row.

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::model::{Model, ModelSpec};
use crate::pool::TrajectoryPool;
use crate::results::{ResultRow, ResultTable};
use crate::search::{ErrorOracle, Evaluation};
use crate::system::{instantiate, System};
use crate::timing::Timer;
use crate::trainer::{fit_closed_loop, ClosedLoopConfig};
use crate::trajectory::{first_states, Trajectories};

/// Identity and seeds of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Repetition index.
    pub rep: usize,
    /// True state dimension.
    pub latent_dim: usize,
    /// Observed state dimension.
    pub embed_dim: usize,
    /// Seed of the cell's system.
    pub system_seed: Option<u64>,
    /// Seed of every model built in the cell.
    pub model_seed: Option<u64>,
}

/// Training and testing setup shared by every run in a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSettings {
    /// Length of training trajectories.
    pub timesteps: usize,
    /// Closed-loop rounds per run.
    pub control_horizons: usize,
    /// Control budget of one run.
    pub max_control_cost: f64,
    /// Held-out trajectories per test set.
    pub test_examples: usize,
    /// Length of held-out trajectories.
    pub test_timesteps: usize,
    /// Noisy training data.
    pub noisy: bool,
    /// Decide on the out-of-distribution error.
    pub ood: bool,
    /// Upper clamp of smoothing windows.
    pub n_max: usize,
}

/// State owned by one cell while it is evaluated.
pub struct CellSession<'a, S: System, M: Model> {
    cell: Cell,
    settings: CellSettings,
    spec: &'a ModelSpec<M>,
    system: S,
    test: Trajectories,
    ood_test: Trajectories,
    pool: TrajectoryPool,
    memo: HashMap<usize, Evaluation>,
    rows: ResultTable,
}

impl<'a, S: System, M: Model> CellSession<'a, S, M> {
    /// Builds the cell's system, its test sets and an initial pool.
    ///
    /// Both test sets are always generated, in-distribution first, so the
    /// training data does not depend on whether OOD testing is enabled.
    pub fn new(
        cell: Cell,
        settings: CellSettings,
        system_config: &S::Config,
        spec: &'a ModelSpec<M>,
        initial_pool: usize,
    ) -> Result<Self> {
        let mut system: S = instantiate(
            cell.latent_dim,
            cell.embed_dim,
            system_config,
            cell.system_seed,
        )?;
        let test = system.make_testset(settings.test_examples, settings.test_timesteps, true)?;
        let ood_test =
            system.make_testset(settings.test_examples, settings.test_timesteps, false)?;
        let pool =
            TrajectoryPool::new(&mut system, initial_pool, settings.timesteps, settings.noisy)?;

        Ok(Self {
            cell,
            settings,
            spec,
            system,
            test,
            ood_test,
            pool,
            memo: HashMap::new(),
            rows: ResultTable::new(),
        })
    }

    /// The cell this session evaluates.
    #[must_use]
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Trajectories currently held by the pool.
    #[must_use]
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Rows appended so far.
    #[must_use]
    pub fn rows(&self) -> &ResultTable {
        &self.rows
    }

    /// Consumes the session, returning its rows.
    #[must_use]
    pub fn into_rows(self) -> ResultTable {
        self.rows
    }

    /// Evaluates training-set size `n`.
    ///
    /// With `window > 0`, evaluates every size in
    /// `[max(1, n - window), min(n + window, n_max)]` and returns the median
    /// error and the median cost over that range.
    pub fn model_run(&mut self, n: usize, window: usize) -> Result<Evaluation> {
        if window == 0 {
            return self.run_single(n);
        }
        let lo = n.saturating_sub(window).max(1);
        let hi = (n + window).min(self.settings.n_max).max(lo);
        let mut errors = Vec::with_capacity(hi - lo + 1);
        let mut costs = Vec::with_capacity(hi - lo + 1);
        for k in lo..=hi {
            let evaluation = self.run_single(k)?;
            errors.push(evaluation.error);
            costs.push(evaluation.cost);
        }
        Ok(Evaluation {
            error: median(&mut errors),
            cost: median(&mut costs),
        })
    }

    fn run_single(&mut self, n: usize) -> Result<Evaluation> {
        if let Some(cached) = self.memo.get(&n) {
            return Ok(*cached);
        }

        let timer = Timer::start();
        let settings = self.settings;
        let mut model = self.spec.build(
            self.cell.embed_dim,
            settings.timesteps,
            settings.max_control_cost,
            self.cell.model_seed,
        )?;
        let x = self.pool.request(&mut self.system, n)?;
        let outcome = fit_closed_loop(
            &mut self.system,
            &mut model,
            self.spec,
            x,
            &ClosedLoopConfig {
                timesteps: settings.timesteps,
                control_horizons: settings.control_horizons,
                max_control_cost: settings.max_control_cost,
                noisy: settings.noisy,
            },
        )?;

        let error = test_error(&self.system, &model, &self.test, settings.test_timesteps)?;
        let ood_error = if settings.ood {
            Some(test_error(
                &self.system,
                &model,
                &self.ood_test,
                settings.test_timesteps,
            )?)
        } else {
            None
        };
        let duration = timer.elapsed();

        debug!(
            rep = self.cell.rep,
            latent_dim = self.cell.latent_dim,
            embed_dim = self.cell.embed_dim,
            n,
            timesteps = settings.timesteps,
            control_horizons = settings.control_horizons,
            cost = outcome.total_cost,
            error,
            ?ood_error,
            system_seed = ?self.cell.system_seed,
            model_seed = ?self.cell.model_seed,
            "model run"
        );

        let row = ResultRow {
            rep: self.cell.rep,
            run_id: None,
            latent_dim: self.cell.latent_dim,
            embed_dim: self.cell.embed_dim,
            timesteps: settings.timesteps,
            n,
            error,
            ood_error,
            cost: outcome.total_cost,
            duration,
            search: None,
        };
        let evaluation = Evaluation {
            error: row.decision_error(),
            cost: outcome.total_cost,
        };
        self.rows.push(row);
        self.memo.insert(n, evaluation);
        Ok(evaluation)
    }
}

impl<S: System, M: Model> ErrorOracle for CellSession<'_, S, M> {
    fn evaluate(&mut self, n: usize, window: usize) -> Result<Evaluation> {
        self.model_run(n, window)
    }
}

/// Prediction loss of `model` on `test`, starting from its initial states.
pub(crate) fn test_error<S: System, M: Model>(
    system: &S,
    model: &M,
    test: &Trajectories,
    timesteps: usize,
) -> Result<f64> {
    let pred = model.predict(first_states(test.view()), timesteps)?;
    system.calc_loss(pred.view(), test.view())
}

/// Median with even-length inputs averaging the two middle values.
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
