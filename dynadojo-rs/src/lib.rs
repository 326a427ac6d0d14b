//! # dynadojo-rs
//!
//! Sample-complexity benchmarking for models that learn and control dynamical
//! systems.
//!
//! ## Overview
//!
//! A benchmark pits a model family against a system family. Systems generate
//! trajectories and score predictions; models fit trajectories, predict them
//! from initial states and may emit control signals. The crate provides the
//! engine that drives both through controlled experiments:
//!
//! - **Closed-loop training** ([`trainer`]): fit, then repeatedly control the
//!   system, pay the control cost and refit, within a fixed budget
//! - **Parameter sweeps** ([`task`]): the cartesian product N × L × E × T × C
//! - **Challenges** ([`challenge`]): fixed complexity, fixed train size, and
//!   fixed error, evaluated cell by cell in parallel
//! - **Sample-complexity search** ([`search`]): exponential then binary search
//!   for the smallest training set reaching a target error
//!
//! ```text
//!   Challenge::evaluate
//!         │  cells (rep × L × E), rayon
//!         ▼
//!   ┌────────────┐  model_run(n, w)  ┌──────────────┐
//!   │   search   │──────────────────▶│ CellSession  │
//!   └────────────┘◀──────────────────│ pool · memo  │
//!                   median error     └──────┬───────┘
//!                                           │ fit_closed_loop
//!                                           ▼
//!                                   System ◀──▶ Model
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use dynadojo_rs::prelude::*;
//!
//! # fn main() -> dynadojo_rs::Result<()> {
//! let challenge: FixedError<LinearSystem> = FixedError::new(
//!     ChallengeConfig::default().with_latent_dims(vec![2, 4]).with_timesteps(10),
//!     FixedErrorConfig::new(0.1).with_n_precision(1).with_n_max(100),
//!     LinearSystemConfig::default(),
//! );
//! let spec = ModelSpec::<LeastSquaresModel>::new(LeastSquaresConfig::default());
//! let results = challenge.evaluate(&spec, &EvaluateOptions::default().with_seed(0))?;
//!
//! for target in results.search_targets() {
//!     println!("L={} needs n={}", target.latent_dim, target.n_target);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`system`], [`model`] - collaborator contracts with shape-checked wrappers
//! - [`pool`], [`session`] - per-cell trajectory pool and memoized runs
//! - [`results`] - result rows, JSON export and summaries
//! - [`config`] - serde configuration with TOML loading
//! - [`systems`], [`models`] - reference linear system and least-squares model

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
// Sizes and counts are converted to f64 for costs and progress bars
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod challenge;
pub mod config;
pub mod error;
pub mod model;
pub mod models;
pub mod pool;
mod progress;
pub mod results;
pub mod search;
pub mod session;
pub mod system;
pub mod systems;
pub mod task;
pub mod timing;
pub mod trainer;
pub mod trajectory;

pub use challenge::{Challenge, FixedError, SampleSweep, SweepKind};
pub use config::{
    ChallengeConfig, EvaluateOptions, ExperimentConfig, ExperimentKind, FixedErrorConfig,
    SampleSweepConfig, TaskConfig,
};
pub use error::{DojoError, Result};
pub use model::{Model, ModelSpec};
pub use results::{ResultRow, ResultTable, SearchAnnotation, SearchTarget};
pub use search::{search, ErrorOracle, Evaluation, SearchOutcome, SearchParams};
pub use system::System;
pub use task::Task;
pub use timing::{Duration, Timer};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use dynadojo_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::models::{
        LeastSquaresAct, LeastSquaresConfig, LeastSquaresFit, LeastSquaresModel,
    };
    pub use crate::systems::{LinearSystem, LinearSystemConfig};
    pub use crate::{
        Challenge, ChallengeConfig, DojoError, EvaluateOptions, FixedError, FixedErrorConfig,
        Model, ModelSpec, Result, ResultTable, SampleSweep, SampleSweepConfig, SearchOutcome,
        System, Task, TaskConfig,
    };
}
