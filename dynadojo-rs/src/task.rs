//! Generic parameter-sweep driver.
//!
//! A [`Task`] evaluates a model family over the cartesian product
//! N × L × E × T × C (sample count, latent dim, embedding dim, timesteps,
//! control budget), repeated `reps` times. Combinations with `E < L` are
//! skipped. Each repetition lazily builds one system and reconfigures it as the
//! dimensions change; every combination gets a fresh model, a fresh training
//! set, closed-loop training and a fresh test set.
//!
//! With a seed, every repetition draws a `(system_seed, model_seed)` pair from a
//! ChaCha8 stream of that seed.
//!
//! Rows carry a run identifier that keeps increasing across `evaluate` calls
//! on the same task.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::TaskConfig;
use crate::error::Result;
use crate::model::{Model, ModelSpec};
use crate::progress;
use crate::results::{ResultRow, ResultTable};
use crate::session::test_error;
use crate::system::{instantiate, System};
use crate::timing::Timer;
use crate::trainer::{fit_closed_loop, ClosedLoopConfig};

/// Sweep driver over a system family.
pub struct Task<S: System> {
    config: TaskConfig,
    system_config: S::Config,
    next_run_id: u64,
    progress: bool,
}

impl<S: System> Task<S> {
    /// Creates a task.
    #[must_use]
    pub fn new(config: TaskConfig, system_config: S::Config) -> Self {
        Self {
            config,
            system_config,
            next_run_id: 0,
            progress: false,
        }
    }

    /// Shows a progress bar while evaluating.
    #[must_use]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Sweep dimensions.
    #[must_use]
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Evaluates every valid combination in every repetition.
    ///
    /// `in_dist = false` scores models on an out-of-distribution test set;
    /// the loss is then reported in both `error` and `ood_error`.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration and propagates the first run failure.
    pub fn evaluate<M: Model>(
        &mut self,
        spec: &ModelSpec<M>,
        in_dist: bool,
        noisy: bool,
    ) -> Result<ResultTable> {
        self.config.validate()?;
        let config = self.config.clone();
        info!(
            combinations = config.combinations(),
            reps = config.reps,
            in_dist,
            noisy,
            "evaluating task"
        );

        let pb = progress::bar(config.reps * config.combinations(), self.progress, "runs")?;
        let mut table = ResultTable::new();
        for (rep, (system_seed, model_seed)) in rep_seeds(config.seed, config.reps)
            .into_iter()
            .enumerate()
        {
            let mut system: Option<S> = None;

            for &n in &config.sample_sizes {
                for &latent_dim in &config.latent_dims {
                    for &embed_dim in &config.embed_dims {
                        for &timesteps in &config.timesteps {
                            for &max_control_cost in &config.control_costs {
                                pb.inc(1);
                                if embed_dim < latent_dim {
                                    continue;
                                }
                                let mut sys = match system.take() {
                                    Some(sys) => sys.reconfigure(latent_dim, embed_dim)?,
                                    None => instantiate(
                                        latent_dim,
                                        embed_dim,
                                        &self.system_config,
                                        system_seed,
                                    )?,
                                };

                                let timer = Timer::start();
                                let mut model =
                                    spec.build(embed_dim, timesteps, max_control_cost, model_seed)?;
                                let x = sys.make_trainset(n, timesteps, noisy)?;
                                let outcome = fit_closed_loop(
                                    &mut sys,
                                    &mut model,
                                    spec,
                                    x.view(),
                                    &ClosedLoopConfig {
                                        timesteps,
                                        control_horizons: config.control_horizons,
                                        max_control_cost,
                                        noisy,
                                    },
                                )?;
                                let test = sys.make_testset(
                                    config.test_examples,
                                    config.test_timesteps,
                                    in_dist,
                                )?;
                                let error =
                                    test_error(&sys, &model, &test, config.test_timesteps)?;

                                let run_id = self.next_run_id;
                                self.next_run_id += 1;
                                debug!(
                                    run_id,
                                    rep,
                                    n,
                                    latent_dim,
                                    embed_dim,
                                    timesteps,
                                    cost = outcome.total_cost,
                                    error,
                                    "task run"
                                );
                                table.push(ResultRow {
                                    rep,
                                    run_id: Some(run_id),
                                    latent_dim,
                                    embed_dim,
                                    timesteps,
                                    n,
                                    error,
                                    ood_error: (!in_dist).then_some(error),
                                    cost: outcome.total_cost,
                                    duration: timer.elapsed(),
                                    search: None,
                                });
                                system = Some(sys);
                            }
                        }
                    }
                }
            }
        }
        pb.finish_and_clear();
        Ok(table)
    }
}

/// One `(system_seed, model_seed)` pair per repetition.
fn rep_seeds(seed: Option<u64>, reps: usize) -> Vec<(Option<u64>, Option<u64>)> {
    let Some(seed) = seed else {
        return vec![(None, None); reps];
    };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..reps)
        .map(|_| {
            (
                Some(u64::from(rng.random::<u32>())),
                Some(u64::from(rng.random::<u32>())),
            )
        })
        .collect()
}
