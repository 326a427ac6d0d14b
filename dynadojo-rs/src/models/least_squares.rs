//! Ridge-regularised one-step linear predictor.
//!
//! Fits `y_{t+1} ≈ W y_t` over every consecutive pair in a trajectory batch by
//! solving the normal equations
//!
//! ```text
//! (Σ y_t y_tᵀ + λI) Wᵀ = Σ y_t y_{t+1}ᵀ
//! ```
//!
//! with a Cholesky factorisation (LU when the system is not positive definite).
//! Forecasting rolls `W` forward from the initial state. As a controller it
//! applies linear feedback `u = −gain · y`.

use nalgebra::{DMatrix, DVector};
use ndarray::{s, Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DojoError, Result};
use crate::model::Model;
use crate::trajectory::{Control, Trajectories};

/// Construction parameters of [`LeastSquaresModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeastSquaresConfig {
    /// Ridge penalty λ.
    #[serde(default = "default_ridge")]
    pub ridge: f64,
}

fn default_ridge() -> f64 {
    1e-6
}

impl Default for LeastSquaresConfig {
    fn default() -> Self {
        Self {
            ridge: default_ridge(),
        }
    }
}

impl LeastSquaresConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DojoError::Config`] for a negative ridge penalty.
    pub fn validate(&self) -> Result<()> {
        if !(self.ridge >= 0.0) {
            return Err(DojoError::Config("ridge must be >= 0".to_string()));
        }
        Ok(())
    }
}

/// Fit parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeastSquaresFit {
    /// Keep the statistics of earlier fits and add the new batch to them.
    #[serde(default)]
    pub accumulate: bool,
}

/// Act parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeastSquaresAct {
    /// Feedback gain; 0 emits no control.
    #[serde(default)]
    pub gain: f64,
}

/// Reference linear model.
#[derive(Debug, Clone)]
pub struct LeastSquaresModel {
    embed_dim: usize,
    ridge: f64,
    gram: DMatrix<f64>,
    cross: DMatrix<f64>,
    weights: DMatrix<f64>,
}

impl LeastSquaresModel {
    /// Current one-step transition estimate `W`.
    #[must_use]
    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    fn solve(&self) -> Result<DMatrix<f64>> {
        let e = self.embed_dim;
        let lhs = &self.gram + DMatrix::identity(e, e) * self.ridge;
        let rhs = self.cross.transpose();
        let weights_t = match lhs.clone().cholesky() {
            Some(chol) => chol.solve(&rhs),
            None => lhs
                .lu()
                .solve(&rhs)
                .ok_or_else(|| DojoError::Model("normal equations are singular".to_string()))?,
        };
        Ok(weights_t.transpose())
    }
}

impl Model for LeastSquaresModel {
    type Config = LeastSquaresConfig;
    type FitConfig = LeastSquaresFit;
    type ActConfig = LeastSquaresAct;

    fn new(
        embed_dim: usize,
        _timesteps: usize,
        _max_control_cost: f64,
        config: &LeastSquaresConfig,
        _seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            embed_dim,
            ridge: config.ridge,
            gram: DMatrix::zeros(embed_dim, embed_dim),
            cross: DMatrix::zeros(embed_dim, embed_dim),
            weights: DMatrix::identity(embed_dim, embed_dim),
        })
    }

    fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    fn fit(&mut self, x: ArrayView3<'_, f64>, config: &LeastSquaresFit) -> Result<()> {
        let (n, timesteps, e) = x.dim();
        if e != self.embed_dim {
            return Err(DojoError::ShapeMismatch {
                context: "least squares fit",
                expected: vec![n, timesteps, self.embed_dim],
                actual: vec![n, timesteps, e],
            });
        }
        if !config.accumulate {
            self.gram.fill(0.0);
            self.cross.fill(0.0);
        }

        let mut pairs = 0usize;
        for trajectory in x.axis_iter(Axis(0)) {
            for t in 1..timesteps {
                let prev =
                    DVector::from_iterator(e, trajectory.slice(s![t - 1, ..]).iter().copied());
                let next =
                    DVector::from_iterator(e, trajectory.slice(s![t, ..]).iter().copied());
                self.gram += &prev * prev.transpose();
                self.cross += &next * prev.transpose();
                pairs += 1;
            }
        }
        if pairs == 0 {
            debug!("least squares fit skipped: no transitions");
            return Ok(());
        }
        self.weights = self.solve()?;
        debug!(pairs, "least squares fit");
        Ok(())
    }

    fn forecast(&self, x0: ArrayView2<'_, f64>, timesteps: usize) -> Result<Trajectories> {
        let n = x0.len_of(Axis(0));
        let e = self.embed_dim;
        let mut out = Array3::zeros((n, timesteps, e));
        if timesteps == 0 {
            return Ok(out);
        }
        for (i, row) in x0.axis_iter(Axis(0)).enumerate() {
            let mut state = DVector::from_iterator(e, row.iter().copied());
            for t in 0..timesteps {
                if t > 0 {
                    state = &self.weights * state;
                }
                out.slice_mut(s![i, t, ..])
                    .iter_mut()
                    .zip(state.iter())
                    .for_each(|(dst, src)| *dst = *src);
            }
        }
        Ok(out)
    }

    fn control(&mut self, x: ArrayView3<'_, f64>, config: &LeastSquaresAct) -> Result<Control> {
        Ok(x.mapv(|v| -config.gain * v))
    }
}
