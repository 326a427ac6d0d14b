//! Sample complexity at a fixed target error.
//!
//! Every cell searches for the smallest training-set size whose test error
//! reaches `target_error`, using the exponential-then-binary search of
//! [`crate::search`] over a memoized [`CellSession`]. Every size the search
//! probes leaves a row; all rows of a cell carry the cell's answer.

use tracing::info;

use super::{cell_settings, Challenge};
use crate::config::{ChallengeConfig, EvaluateOptions, FixedErrorConfig};
use crate::error::Result;
use crate::model::{Model, ModelSpec};
use crate::results::{ResultTable, SearchAnnotation};
use crate::search::{search, SearchParams};
use crate::session::{Cell, CellSession};
use crate::system::System;

/// Trajectories generated for a cell before the search starts.
const INITIAL_POOL: usize = 10;

/// Finds the sample complexity of every cell.
pub struct FixedError<S: System> {
    config: ChallengeConfig,
    search: FixedErrorConfig,
    system_config: S::Config,
}

impl<S: System> FixedError<S> {
    /// Creates the challenge.
    #[must_use]
    pub fn new(
        config: ChallengeConfig,
        search: FixedErrorConfig,
        system_config: S::Config,
    ) -> Self {
        Self {
            config,
            search,
            system_config,
        }
    }

    /// Search parameters.
    #[must_use]
    pub fn search_config(&self) -> &FixedErrorConfig {
        &self.search
    }

    fn params(&self) -> SearchParams {
        SearchParams {
            target_error: self.search.target_error,
            n_precision: self.search.n_precision,
            n_window: self.search.n_window,
            n_max: self.search.n_max,
        }
    }
}

impl<S: System> Challenge for FixedError<S> {
    type System = S;

    fn name(&self) -> &'static str {
        "fixed_error"
    }

    fn config(&self) -> &ChallengeConfig {
        &self.config
    }

    fn system_config(&self) -> &S::Config {
        &self.system_config
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        self.search.validate(&self.config)
    }

    fn system_run<M: Model>(
        &self,
        cell: Cell,
        spec: &ModelSpec<M>,
        options: &EvaluateOptions,
    ) -> Result<ResultTable> {
        let index = self
            .config
            .latent_dims
            .iter()
            .position(|&l| l == cell.latent_dim)
            .unwrap_or(0);
        let n_start = self.search.n_start(index);
        let params = self.params();

        let settings = cell_settings(&self.config, &cell, options, params.n_max);
        let mut session: CellSession<'_, S, M> =
            CellSession::new(cell, settings, &self.system_config, spec, INITIAL_POOL)?;
        let n_target = search(&mut session, &params, n_start)?;

        info!(
            rep = cell.rep,
            latent_dim = cell.latent_dim,
            embed_dim = cell.embed_dim,
            %n_target,
            probes = session.rows().len(),
            system_seed = ?cell.system_seed,
            model_seed = ?cell.model_seed,
            "sample complexity found"
        );

        let mut rows = session.into_rows();
        rows.annotate(SearchAnnotation {
            n_target,
            target_error: params.target_error,
            n_start,
            n_window: params.n_window,
            n_precision: params.n_precision,
            n_max: params.n_max,
            system_seed: cell.system_seed,
            model_seed: cell.model_seed,
        });
        Ok(rows)
    }
}
