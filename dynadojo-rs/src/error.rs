//! Error types for dynadojo-rs.
//!
//! Every failure that can stop an experiment is a [`DojoError`]. There are two
//! groups:
//!
//! - **Contract violations**: a collaborator (system or model) returned an array
//!   of the wrong shape, or a closed-loop run spent more control than its budget.
//!   These abort the run and propagate unchanged through the cell and the whole
//!   `evaluate` call. They are never retried.
//! - **Environment failures**: unreadable or malformed configuration files, I/O,
//!   JSON export and thread pool construction.
//!
//! A sample-complexity search that fails to converge is *not* an error. See
//! [`crate::search::SearchOutcome`].
//!
//! # Example
//!
//! ```rust
//! use dynadojo_rs::{DojoError, Result};
//!
//! fn check_dims(latent_dim: usize, embed_dim: usize) -> Result<()> {
//!     if embed_dim < latent_dim {
//!         return Err(DojoError::InvalidDimensions { latent_dim, embed_dim });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_dims(4, 2).is_err());
//! assert!(check_dims(2, 4).is_ok());
//! ```

use thiserror::Error;

/// Result type alias for dynadojo-rs operations.
pub type Result<T> = std::result::Result<T, DojoError>;

/// Errors that can occur while building, training or evaluating experiments.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DojoError {
    /// Invalid configuration parameter.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// An array did not have the shape its contract requires.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Which contract was violated.
        context: &'static str,
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Accumulated control cost of a closed-loop run exceeded its budget.
    #[error("control cost exceeded: spent {total:.6} of a {budget:.6} budget")]
    ControlBudgetExceeded {
        /// Total control cost accumulated across horizons.
        total: f64,
        /// Maximum control cost allowed for the run.
        budget: f64,
    },

    /// Embedding dimension smaller than the latent dimension.
    #[error("embedding dimension {embed_dim} is smaller than latent dimension {latent_dim}")]
    InvalidDimensions {
        /// Latent dimension requested.
        latent_dim: usize,
        /// Embedding dimension requested.
        embed_dim: usize,
    },

    /// Failure inside a system implementation.
    #[error("system error: {0}")]
    System(String),

    /// Failure inside a model implementation.
    #[error("model error: {0}")]
    Model(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON export error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Progress bar template error.
    #[error("template error: {0}")]
    Template(String),
}

impl From<indicatif::style::TemplateError> for DojoError {
    fn from(err: indicatif::style::TemplateError) -> Self {
        DojoError::Template(err.to_string())
    }
}

impl DojoError {
    /// Returns `true` for errors raised because a collaborator broke its
    /// contract (shape or control budget) rather than because of the
    /// environment.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. } | Self::ControlBudgetExceeded { .. }
        )
    }
}
