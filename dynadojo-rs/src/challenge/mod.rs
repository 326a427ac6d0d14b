//! Challenges: controlled experiments over system complexity and sample size.
//!
//! A challenge splits an experiment into independent cells, one per
//! `(rep, latent_dim, embed_dim)` triple, and evaluates a model family in every
//! cell. [`Challenge::evaluate`] is the shared driver:
//!
//! 1. Enumerate cells in the order rep → latent dim → embed dim, skipping any
//!    with `embed_dim < latent_dim`.
//! 2. With a master seed, derive a `(system_seed, model_seed)` pair for every
//!    enumerated cell from one ChaCha8 stream, before filtering, so a filtered
//!    run reproduces the matching cells of the unfiltered one.
//! 3. Drop cells rejected by the rep / latent / pair filters.
//! 4. Run [`Challenge::system_run`] on every remaining cell in a rayon pool.
//!    Cells share no system, pool or memo.
//! 5. Concatenate the cells' rows in enumeration order.
//!
//! Available challenges:
//!
//! - [`SampleSweep`]: fixed complexity (sweep N) or fixed train size (sweep L)
//! - [`FixedError`]: search every cell for the smallest N reaching a target error

mod fixed_error;
mod sweep;

pub use fixed_error::FixedError;
pub use sweep::{SampleSweep, SweepKind};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::info;

use crate::config::{ChallengeConfig, EvaluateOptions};
use crate::error::Result;
use crate::model::{Model, ModelSpec};
use crate::progress;
use crate::results::ResultTable;
use crate::session::{Cell, CellSettings};
use crate::system::System;

/// A controlled experiment evaluated cell by cell.
pub trait Challenge: Sync {
    /// System family the challenge instantiates.
    type System: System;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Dimensions and training setup.
    fn config(&self) -> &ChallengeConfig;

    /// Parameters of every system the challenge builds.
    fn system_config(&self) -> &<Self::System as System>::Config;

    /// Checks the challenge's own parameters.
    fn validate(&self) -> Result<()> {
        self.config().validate()
    }

    /// Evaluates one cell, returning its rows.
    fn system_run<M: Model>(
        &self,
        cell: Cell,
        spec: &ModelSpec<M>,
        options: &EvaluateOptions,
    ) -> Result<ResultTable>;

    /// Every cell selected by `options`, in enumeration order.
    fn cells(&self, options: &EvaluateOptions) -> Vec<Cell> {
        let config = self.config();
        let mut rng = options.seed.map(ChaCha8Rng::seed_from_u64);
        let mut cells = Vec::new();
        for rep in 0..config.reps {
            for &latent_dim in &config.latent_dims {
                let embed_dims = config
                    .embed_dims
                    .clone()
                    .unwrap_or_else(|| vec![latent_dim]);
                for embed_dim in embed_dims {
                    if embed_dim < latent_dim {
                        continue;
                    }
                    let (system_seed, model_seed) = match rng.as_mut() {
                        Some(rng) => (
                            Some(u64::from(rng.random::<u32>())),
                            Some(u64::from(rng.random::<u32>())),
                        ),
                        None => (None, None),
                    };
                    if options.selects(rep, latent_dim) {
                        cells.push(Cell {
                            rep,
                            latent_dim,
                            embed_dim,
                            system_seed,
                            model_seed,
                        });
                    }
                }
            }
        }
        cells
    }

    /// Evaluates every selected cell and concatenates their rows.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, and propagates the first cell failure
    /// (including budget and shape contract violations).
    fn evaluate<M: Model>(
        &self,
        spec: &ModelSpec<M>,
        options: &EvaluateOptions,
    ) -> Result<ResultTable> {
        self.validate()?;
        options.validate()?;
        let cells = self.cells(options);
        info!(
            challenge = self.name(),
            cells = cells.len(),
            seed = ?options.seed,
            "evaluating challenge"
        );

        let pb = progress::bar(cells.len(), options.progress, "cells")?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.num_threads.unwrap_or(0))
            .build()?;
        let tables = pool.install(|| {
            cells
                .par_iter()
                .map(|cell| {
                    let table = self.system_run(*cell, spec, options);
                    pb.inc(1);
                    table
                })
                .collect::<Result<Vec<_>>>()
        })?;
        pb.finish_and_clear();

        Ok(ResultTable::concat(tables))
    }
}

/// Settings of every run in a cell of `config`.
pub(crate) fn cell_settings(
    config: &ChallengeConfig,
    cell: &Cell,
    options: &EvaluateOptions,
    n_max: usize,
) -> CellSettings {
    CellSettings {
        timesteps: config.timesteps,
        control_horizons: config.control_horizons,
        max_control_cost: config.max_control_cost(cell.latent_dim),
        test_examples: config.test_examples,
        test_timesteps: config.test_timesteps,
        noisy: options.noisy,
        ood: options.ood,
        n_max,
    }
}
