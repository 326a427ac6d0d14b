//! Sample-size sweeps at fixed complexity or fixed training-set size.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{cell_settings, Challenge};
use crate::config::{ChallengeConfig, EvaluateOptions, SampleSweepConfig};
use crate::error::{DojoError, Result};
use crate::model::{Model, ModelSpec};
use crate::results::ResultTable;
use crate::session::{Cell, CellSession};
use crate::system::System;

/// Which dimension a [`SampleSweep`] holds fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    /// One latent dimension, many training-set sizes.
    FixedComplexity,
    /// One training-set size, many latent dimensions.
    FixedTrainSize,
}

/// Trains on every configured size in every cell.
///
/// Each cell generates a pool of `max(sample_sizes)` trajectories up front,
/// and each size trains on a prefix of it, so the run at size `n` does not
/// depend on which other sizes were requested.
pub struct SampleSweep<S: System> {
    kind: SweepKind,
    config: ChallengeConfig,
    sweep: SampleSweepConfig,
    system_config: S::Config,
}

impl<S: System> SampleSweep<S> {
    /// Creates a sweep of the given kind.
    #[must_use]
    pub fn new(
        kind: SweepKind,
        config: ChallengeConfig,
        sweep: SampleSweepConfig,
        system_config: S::Config,
    ) -> Self {
        Self {
            kind,
            config,
            sweep,
            system_config,
        }
    }

    /// One latent dimension, sweep the training-set size.
    #[must_use]
    pub fn fixed_complexity(
        config: ChallengeConfig,
        sweep: SampleSweepConfig,
        system_config: S::Config,
    ) -> Self {
        Self::new(SweepKind::FixedComplexity, config, sweep, system_config)
    }

    /// One training-set size, sweep the latent dimension.
    #[must_use]
    pub fn fixed_train_size(
        config: ChallengeConfig,
        sweep: SampleSweepConfig,
        system_config: S::Config,
    ) -> Self {
        Self::new(SweepKind::FixedTrainSize, config, sweep, system_config)
    }

    /// Which dimension is held fixed.
    #[must_use]
    pub fn kind(&self) -> SweepKind {
        self.kind
    }
}

impl<S: System> Challenge for SampleSweep<S> {
    type System = S;

    fn name(&self) -> &'static str {
        match self.kind {
            SweepKind::FixedComplexity => "fixed_complexity",
            SweepKind::FixedTrainSize => "fixed_train_size",
        }
    }

    fn config(&self) -> &ChallengeConfig {
        &self.config
    }

    fn system_config(&self) -> &S::Config {
        &self.system_config
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        self.sweep.validate()?;
        match self.kind {
            SweepKind::FixedComplexity if self.config.latent_dims.len() != 1 => Err(
                DojoError::Config("fixed complexity runs exactly one latent dim".to_string()),
            ),
            SweepKind::FixedTrainSize if self.sweep.sample_sizes.len() != 1 => Err(
                DojoError::Config("fixed train size runs exactly one sample size".to_string()),
            ),
            _ => Ok(()),
        }
    }

    fn system_run<M: Model>(
        &self,
        cell: Cell,
        spec: &ModelSpec<M>,
        options: &EvaluateOptions,
    ) -> Result<ResultTable> {
        let pool_size = self.sweep.max_sample_size();
        let settings = cell_settings(&self.config, &cell, options, pool_size);
        let mut session: CellSession<'_, S, M> =
            CellSession::new(cell, settings, &self.system_config, spec, pool_size)?;
        for &n in &self.sweep.sample_sizes {
            let evaluation = session.model_run(n, 0)?;
            debug!(
                rep = cell.rep,
                latent_dim = cell.latent_dim,
                n,
                error = evaluation.error,
                "sweep point"
            );
        }
        Ok(session.into_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeastSquaresConfig, LeastSquaresModel};
    use crate::systems::{LinearSystem, LinearSystemConfig};

    #[test]
    fn test_fixed_complexity_rows_per_size() {
        let config = ChallengeConfig::default()
            .with_latent_dims(vec![2])
            .with_timesteps(8)
            .with_test_set(5, 8);
        let challenge: SampleSweep<LinearSystem> = SampleSweep::fixed_complexity(
            config,
            SampleSweepConfig::new(vec![2, 6, 4, 6]),
            LinearSystemConfig::default(),
        );
        let spec = ModelSpec::<LeastSquaresModel>::new(LeastSquaresConfig::default());
        let table = challenge
            .evaluate(&spec, &EvaluateOptions::default().with_seed(3))
            .unwrap();

        // repeated sizes hit the memo
        let ns: Vec<_> = table.iter().map(|r| r.n).collect();
        assert_eq!(ns, vec![2, 6, 4]);
        assert!(table.iter().all(|r| r.search.is_none()));
    }

    #[test]
    fn test_fixed_complexity_rejects_many_latent_dims() {
        let config = ChallengeConfig::default().with_latent_dims(vec![2, 3]);
        let challenge: SampleSweep<LinearSystem> = SampleSweep::fixed_complexity(
            config,
            SampleSweepConfig::new(vec![2]),
            LinearSystemConfig::default(),
        );
        let spec = ModelSpec::<LeastSquaresModel>::new(LeastSquaresConfig::default());
        assert!(challenge.evaluate(&spec, &EvaluateOptions::default()).is_err());
    }

    #[test]
    fn test_seeded_sweeps_reproduce() {
        let config = ChallengeConfig::default()
            .with_latent_dims(vec![1, 2])
            .with_timesteps(6)
            .with_test_set(4, 6);
        let challenge: SampleSweep<LinearSystem> = SampleSweep::fixed_train_size(
            config,
            SampleSweepConfig::new(vec![5]),
            LinearSystemConfig::default(),
        );
        let spec = ModelSpec::<LeastSquaresModel>::new(LeastSquaresConfig::default());
        let options = EvaluateOptions::default().with_seed(11).with_num_threads(2);
        let a = challenge.evaluate(&spec, &options).unwrap();
        let b = challenge.evaluate(&spec, &options).unwrap();
        let errors = |t: &ResultTable| t.iter().map(|r| r.error.to_bits()).collect::<Vec<_>>();
        assert_eq!(errors(&a), errors(&b));
        assert_eq!(a.len(), 2);
    }
}
