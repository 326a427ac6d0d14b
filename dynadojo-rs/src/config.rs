//! Configuration types for challenges, sweeps and the command line.
//!
//! Every struct here is serde-serializable with per-field defaults, so an
//! experiment can be described by a partial TOML file and filled in with
//! sensible values.
//!
//! # Overview
//!
//! - [`ChallengeConfig`]: the sweep over latent/embedding dimensions and the
//!   training setup shared by every challenge
//! - [`SampleSweepConfig`], [`FixedErrorConfig`]: challenge-specific knobs
//! - [`EvaluateOptions`]: how one `evaluate` call runs (OOD testing, noise,
//!   seeding, parallelism, cell filters)
//! - [`TaskConfig`]: the generic N × L × E × T × C sweep driver
//! - [`ExperimentConfig`]: the file-level document read by the `dynadojo` CLI
//!
//! # Example
//!
//! ```rust
//! use dynadojo_rs::config::{ChallengeConfig, FixedErrorConfig};
//!
//! let challenge = ChallengeConfig::default()
//!     .with_latent_dims(vec![2, 4])
//!     .with_timesteps(10);
//! let search = FixedErrorConfig::new(0.1).with_n_precision(1).with_n_max(100);
//!
//! assert!(challenge.validate().is_ok());
//! assert!(search.validate(&challenge).is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DojoError, Result};
use crate::models::{LeastSquaresAct, LeastSquaresConfig, LeastSquaresFit};
use crate::systems::LinearSystemConfig;

fn invalid(detail: impl Into<String>) -> DojoError {
    DojoError::Config(detail.into())
}

/// Dimensions and training setup shared by every challenge.
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `latent_dims` | `[2]` | Latent dimensions to sweep, ascending |
/// | `embed_dims` | none | Embedding dimensions; none pairs each L with E = L |
/// | `timesteps` | 50 | Length of every training trajectory |
/// | `max_control_cost_per_dim` | 1.0 | Budget per latent dimension |
/// | `control_horizons` | 0 | Closed-loop rounds; 0 trains once |
/// | `reps` | 1 | Repetitions of every cell |
/// | `test_examples` | 50 | Held-out trajectories per test set |
/// | `test_timesteps` | 50 | Length of held-out trajectories |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// Latent dimensions to sweep, ascending.
    #[serde(default = "default_latent_dims")]
    pub latent_dims: Vec<usize>,

    /// Embedding dimensions to sweep. `None` pairs every latent dim with itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_dims: Option<Vec<usize>>,

    /// Length of every training trajectory.
    #[serde(default = "default_timesteps")]
    pub timesteps: usize,

    /// Control budget per latent dimension; a cell's budget is this times L.
    #[serde(default = "default_max_control_cost_per_dim")]
    pub max_control_cost_per_dim: f64,

    /// Closed-loop training rounds. Horizon 0 always trains, so 0 acts like 1.
    #[serde(default)]
    pub control_horizons: usize,

    /// Repetitions of every cell.
    #[serde(default = "default_reps")]
    pub reps: usize,

    /// Held-out trajectories per test set.
    #[serde(default = "default_test_examples")]
    pub test_examples: usize,

    /// Length of held-out trajectories.
    #[serde(default = "default_test_timesteps")]
    pub test_timesteps: usize,
}

fn default_latent_dims() -> Vec<usize> {
    vec![2]
}
fn default_timesteps() -> usize {
    50
}
fn default_max_control_cost_per_dim() -> f64 {
    1.0
}
fn default_reps() -> usize {
    1
}
fn default_test_examples() -> usize {
    50
}
fn default_test_timesteps() -> usize {
    50
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            latent_dims: default_latent_dims(),
            embed_dims: None,
            timesteps: default_timesteps(),
            max_control_cost_per_dim: default_max_control_cost_per_dim(),
            control_horizons: 0,
            reps: default_reps(),
            test_examples: default_test_examples(),
            test_timesteps: default_test_timesteps(),
        }
    }
}

impl ChallengeConfig {
    /// Sets the latent dimensions.
    #[must_use]
    pub fn with_latent_dims(mut self, latent_dims: Vec<usize>) -> Self {
        self.latent_dims = latent_dims;
        self
    }

    /// Sets explicit embedding dimensions.
    #[must_use]
    pub fn with_embed_dims(mut self, embed_dims: Vec<usize>) -> Self {
        self.embed_dims = Some(embed_dims);
        self
    }

    /// Sets the training trajectory length.
    #[must_use]
    pub fn with_timesteps(mut self, timesteps: usize) -> Self {
        self.timesteps = timesteps;
        self
    }

    /// Sets the per-dimension control budget.
    #[must_use]
    pub fn with_max_control_cost_per_dim(mut self, cost: f64) -> Self {
        self.max_control_cost_per_dim = cost;
        self
    }

    /// Sets the number of closed-loop rounds.
    #[must_use]
    pub fn with_control_horizons(mut self, horizons: usize) -> Self {
        self.control_horizons = horizons;
        self
    }

    /// Sets the number of repetitions.
    #[must_use]
    pub fn with_reps(mut self, reps: usize) -> Self {
        self.reps = reps;
        self
    }

    /// Sets the size and length of the held-out test sets.
    #[must_use]
    pub fn with_test_set(mut self, examples: usize, timesteps: usize) -> Self {
        self.test_examples = examples;
        self.test_timesteps = timesteps;
        self
    }

    /// Control budget of a cell with latent dimension `latent_dim`.
    #[must_use]
    pub fn max_control_cost(&self, latent_dim: usize) -> f64 {
        self.max_control_cost_per_dim * latent_dim as f64
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DojoError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.latent_dims.is_empty() {
            return Err(invalid("latent_dims must not be empty"));
        }
        if self.latent_dims.contains(&0) {
            return Err(invalid("latent_dims must be > 0"));
        }
        if !self.latent_dims.windows(2).all(|w| w[0] <= w[1]) {
            return Err(invalid("latent_dims must be sorted ascending"));
        }
        if let Some(embed_dims) = &self.embed_dims {
            if embed_dims.is_empty() {
                return Err(invalid("embed_dims must not be empty when given"));
            }
        }
        if self.timesteps == 0 {
            return Err(invalid("timesteps must be > 0"));
        }
        if !(self.max_control_cost_per_dim >= 0.0) {
            return Err(invalid("max_control_cost_per_dim must be >= 0"));
        }
        if self.reps == 0 {
            return Err(invalid("reps must be > 0"));
        }
        if self.test_examples == 0 {
            return Err(invalid("test_examples must be > 0"));
        }
        if self.test_timesteps == 0 {
            return Err(invalid("test_timesteps must be > 0"));
        }
        Ok(())
    }
}

/// Training-set sizes swept by the fixed-complexity and fixed-train-size challenges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSweepConfig {
    /// Training-set sizes to evaluate in every cell.
    #[serde(default = "default_sample_sizes")]
    pub sample_sizes: Vec<usize>,
}

fn default_sample_sizes() -> Vec<usize> {
    vec![10, 50, 100]
}

impl Default for SampleSweepConfig {
    fn default() -> Self {
        Self {
            sample_sizes: default_sample_sizes(),
        }
    }
}

impl SampleSweepConfig {
    /// Creates a sweep over `sample_sizes`.
    #[must_use]
    pub fn new(sample_sizes: Vec<usize>) -> Self {
        Self { sample_sizes }
    }

    /// Largest training-set size in the sweep.
    #[must_use]
    pub fn max_sample_size(&self) -> usize {
        self.sample_sizes.iter().copied().max().unwrap_or(0)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DojoError::Config`] for an empty sweep or a zero size.
    pub fn validate(&self) -> Result<()> {
        if self.sample_sizes.is_empty() {
            return Err(invalid("sample_sizes must not be empty"));
        }
        if self.sample_sizes.contains(&0) {
            return Err(invalid("sample_sizes must be > 0"));
        }
        Ok(())
    }
}

/// Parameters of the sample-complexity search.
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `target_error` | 0.1 | Error every cell searches for |
/// | `n_precision` | 5 | Bracket width at which bisection stops |
/// | `n_window` | 0 | Smoothing half-width; 0 disables smoothing |
/// | `n_starts` | none | Start size per latent dim; none starts at 1 |
/// | `n_max` | 10000 | Largest size ever evaluated |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedErrorConfig {
    /// Error every cell searches for.
    #[serde(default = "default_target_error")]
    pub target_error: f64,

    /// Bracket width at which bisection stops.
    #[serde(default = "default_n_precision")]
    pub n_precision: usize,

    /// Smoothing half-width passed to every evaluation.
    #[serde(default)]
    pub n_window: usize,

    /// First size probed, one entry per latent dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_starts: Option<Vec<usize>>,

    /// Largest size ever evaluated.
    #[serde(default = "default_n_max")]
    pub n_max: usize,
}

fn default_target_error() -> f64 {
    0.1
}
fn default_n_precision() -> usize {
    5
}
fn default_n_max() -> usize {
    10_000
}

impl Default for FixedErrorConfig {
    fn default() -> Self {
        Self::new(default_target_error())
    }
}

impl FixedErrorConfig {
    /// Creates a search for `target_error` with default tuning.
    #[must_use]
    pub fn new(target_error: f64) -> Self {
        Self {
            target_error,
            n_precision: default_n_precision(),
            n_window: 0,
            n_starts: None,
            n_max: default_n_max(),
        }
    }

    /// Sets the bracket width at which bisection stops.
    #[must_use]
    pub fn with_n_precision(mut self, n_precision: usize) -> Self {
        self.n_precision = n_precision;
        self
    }

    /// Sets the smoothing half-width.
    #[must_use]
    pub fn with_n_window(mut self, n_window: usize) -> Self {
        self.n_window = n_window;
        self
    }

    /// Sets the start size for every latent dimension.
    #[must_use]
    pub fn with_n_starts(mut self, n_starts: Vec<usize>) -> Self {
        self.n_starts = Some(n_starts);
        self
    }

    /// Sets the largest size ever evaluated.
    #[must_use]
    pub fn with_n_max(mut self, n_max: usize) -> Self {
        self.n_max = n_max;
        self
    }

    /// Start size for the latent dimension at `index` in the sweep.
    #[must_use]
    pub fn n_start(&self, index: usize) -> usize {
        self.n_starts
            .as_ref()
            .and_then(|starts| starts.get(index).copied())
            .unwrap_or(1)
    }

    /// Validates the configuration against the challenge it runs in.
    ///
    /// # Errors
    ///
    /// Returns [`DojoError::Config`] describing the first invalid field.
    pub fn validate(&self, challenge: &ChallengeConfig) -> Result<()> {
        if !self.target_error.is_finite() {
            return Err(invalid("target_error must be finite"));
        }
        if self.n_max == 0 {
            return Err(invalid("n_max must be > 0"));
        }
        if let Some(starts) = &self.n_starts {
            if starts.len() != challenge.latent_dims.len() {
                return Err(invalid(format!(
                    "n_starts has {} entries but there are {} latent dims",
                    starts.len(),
                    challenge.latent_dims.len()
                )));
            }
            if starts.contains(&0) {
                return Err(invalid("n_starts must be >= 1"));
            }
        }
        Ok(())
    }
}

/// How one `evaluate` call runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateOptions {
    /// Drive decisions with the out-of-distribution error.
    #[serde(default)]
    pub ood: bool,

    /// Add observation noise to training trajectories.
    #[serde(default)]
    pub noisy: bool,

    /// Master seed deriving every cell's system and model seeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Worker threads for independent cells. `None` uses every core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,

    /// Only run these repetitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps_filter: Option<Vec<usize>>,

    /// Only run these latent dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latent_filter: Option<Vec<usize>>,

    /// Only run these `(rep, latent_dim)` pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rep_latent_filter: Option<Vec<(usize, usize)>>,

    /// Show a progress bar.
    #[serde(default)]
    pub progress: bool,
}

impl EvaluateOptions {
    /// Sets the master seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enables out-of-distribution testing.
    #[must_use]
    pub fn with_ood(mut self, ood: bool) -> Self {
        self.ood = ood;
        self
    }

    /// Enables noisy training data.
    #[must_use]
    pub fn with_noisy(mut self, noisy: bool) -> Self {
        self.noisy = noisy;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Whether the cell `(rep, latent_dim)` passes every filter.
    #[must_use]
    pub fn selects(&self, rep: usize, latent_dim: usize) -> bool {
        let reps = self.reps_filter.as_ref().map_or(true, |f| f.contains(&rep));
        let latents = self
            .latent_filter
            .as_ref()
            .map_or(true, |f| f.contains(&latent_dim));
        let pairs = self
            .rep_latent_filter
            .as_ref()
            .map_or(true, |f| f.contains(&(rep, latent_dim)));
        reps && latents && pairs
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DojoError::Config`] for a zero worker count.
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(invalid("num_threads must be > 0"));
        }
        Ok(())
    }
}

/// Sweep dimensions of the generic parameter-sweep driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Training-set sizes (N).
    pub sample_sizes: Vec<usize>,
    /// Latent dimensions (L).
    pub latent_dims: Vec<usize>,
    /// Embedding dimensions (E).
    pub embed_dims: Vec<usize>,
    /// Training trajectory lengths (T).
    pub timesteps: Vec<usize>,
    /// Control budgets (C).
    pub control_costs: Vec<f64>,
    /// Closed-loop rounds per run.
    #[serde(default = "default_task_control_horizons")]
    pub control_horizons: usize,
    /// Repetitions of the whole sweep.
    #[serde(default = "default_reps")]
    pub reps: usize,
    /// Held-out trajectories per run.
    #[serde(default = "default_test_examples")]
    pub test_examples: usize,
    /// Length of held-out trajectories.
    #[serde(default = "default_test_timesteps")]
    pub test_timesteps: usize,
    /// Seed of every system and model; `None` draws fresh entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_task_control_horizons() -> usize {
    1
}

impl TaskConfig {
    /// Creates a sweep with one value per dimension.
    #[must_use]
    pub fn single(n: usize, latent_dim: usize, embed_dim: usize, timesteps: usize) -> Self {
        Self {
            sample_sizes: vec![n],
            latent_dims: vec![latent_dim],
            embed_dims: vec![embed_dim],
            timesteps: vec![timesteps],
            control_costs: vec![0.0],
            control_horizons: default_task_control_horizons(),
            reps: default_reps(),
            test_examples: default_test_examples(),
            test_timesteps: default_test_timesteps(),
            seed: None,
        }
    }

    /// Number of combinations per repetition, counting invalid ones.
    #[must_use]
    pub fn combinations(&self) -> usize {
        self.sample_sizes.len()
            * self.latent_dims.len()
            * self.embed_dims.len()
            * self.timesteps.len()
            * self.control_costs.len()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DojoError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.combinations() == 0 {
            return Err(invalid("every sweep dimension needs at least one value"));
        }
        if self.control_horizons == 0 {
            return Err(invalid("control_horizons must be > 0"));
        }
        if self.timesteps.contains(&0) {
            return Err(invalid("timesteps must be > 0"));
        }
        if self.latent_dims.contains(&0) {
            return Err(invalid("latent_dims must be > 0"));
        }
        if self.control_costs.iter().any(|c| !(*c >= 0.0)) {
            return Err(invalid("control_costs must be >= 0"));
        }
        if self.reps == 0 || self.test_examples == 0 || self.test_timesteps == 0 {
            return Err(invalid("reps, test_examples and test_timesteps must be > 0"));
        }
        Ok(())
    }
}

/// Which challenge an experiment file runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExperimentKind {
    /// One latent dimension, sweep the training-set size.
    FixedComplexity(SampleSweepConfig),
    /// One training-set size, sweep the latent dimension.
    FixedTrainSize(SampleSweepConfig),
    /// Search each cell for the size reaching a target error.
    FixedError(FixedErrorConfig),
}

impl Default for ExperimentKind {
    fn default() -> Self {
        Self::FixedError(FixedErrorConfig::default())
    }
}

/// A complete experiment run by the `dynadojo` binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Which challenge to run.
    #[serde(default)]
    pub experiment: ExperimentKind,

    /// Dimensions and training setup.
    #[serde(default)]
    pub challenge: ChallengeConfig,

    /// Reference system parameters.
    #[serde(default)]
    pub system: LinearSystemConfig,

    /// Reference model parameters.
    #[serde(default)]
    pub model: LeastSquaresConfig,

    /// Parameters passed to every fit.
    #[serde(default)]
    pub fit: LeastSquaresFit,

    /// Parameters passed to every act.
    #[serde(default)]
    pub act: LeastSquaresAct,

    /// How the run is executed.
    #[serde(default)]
    pub evaluate: EvaluateOptions,
}

impl ExperimentConfig {
    /// Creates a default experiment of the given kind.
    #[must_use]
    pub fn with_kind(kind: ExperimentKind) -> Self {
        Self {
            experiment: kind,
            ..Self::default()
        }
    }

    /// Loads an experiment from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the experiment to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Validates every section and their consistency.
    ///
    /// # Errors
    ///
    /// Returns [`DojoError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.challenge.validate()?;
        self.evaluate.validate()?;
        self.system.validate()?;
        self.model.validate()?;
        match &self.experiment {
            ExperimentKind::FixedComplexity(sweep) => {
                sweep.validate()?;
                if self.challenge.latent_dims.len() != 1 {
                    return Err(invalid("fixed_complexity runs exactly one latent dim"));
                }
            }
            ExperimentKind::FixedTrainSize(sweep) => {
                sweep.validate()?;
                if sweep.sample_sizes.len() != 1 {
                    return Err(invalid("fixed_train_size runs exactly one sample size"));
                }
            }
            ExperimentKind::FixedError(search) => search.validate(&self.challenge)?,
        }
        Ok(())
    }
}
