//! Mock collaborators whose test error is a known function of the training-set size.
//!
//! `CurveSystem` produces all-zero trajectories and scores predictions by mean
//! absolute error. `CurveModel` predicts the constant `f(n)`, where `n` is the
//! size of the last batch it was fitted on, so the measured error is exactly
//! `f(n)`. Its control signal is a constant whose cost is that constant.

#![allow(dead_code)]

use dynadojo_rs::model::Model;
use dynadojo_rs::system::System;
use dynadojo_rs::trajectory::{Control, InitConds, Trajectories};
use dynadojo_rs::{DojoError, Result};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

/// System with zero dynamics.
#[derive(Debug, Clone)]
pub struct CurveSystem {
    latent_dim: usize,
    embed_dim: usize,
    seed: Option<u64>,
}

impl System for CurveSystem {
    type Config = ();

    fn new(latent_dim: usize, embed_dim: usize, _config: &(), seed: Option<u64>) -> Result<Self> {
        Ok(Self {
            latent_dim,
            embed_dim,
            seed,
        })
    }

    fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn config(&self) -> &() {
        &()
    }

    fn sample_init_conds(&mut self, n: usize, _in_dist: bool) -> Result<InitConds> {
        Ok(Array2::zeros((n, self.embed_dim)))
    }

    fn simulate(
        &mut self,
        init_conds: ArrayView2<'_, f64>,
        _control: ArrayView3<'_, f64>,
        timesteps: usize,
        _noisy: bool,
    ) -> Result<Trajectories> {
        Ok(Array3::zeros((
            init_conds.len_of(Axis(0)),
            timesteps,
            self.embed_dim,
        )))
    }

    fn loss(&self, pred: ArrayView3<'_, f64>, truth: ArrayView3<'_, f64>) -> Result<f64> {
        let diff = &pred - &truth;
        Ok(diff.mapv(f64::abs).mean().unwrap_or(0.0))
    }

    fn control_cost(&self, control: ArrayView3<'_, f64>) -> Result<f64> {
        let n = control.len_of(Axis(0));
        if n == 0 {
            return Ok(0.0);
        }
        let total: f64 = control
            .axis_iter(Axis(0))
            .map(|u| u.iter().fold(0.0_f64, |m, v| m.max(v.abs())))
            .sum();
        Ok(total / n as f64)
    }
}

/// Error as a function of the training-set size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    /// `1 / n`
    Inverse,
    /// The same error everywhere.
    Constant(f64),
    /// `(n - center)² / scale + floor`
    Bowl {
        /// Size with the lowest error.
        center: f64,
        /// Width of the bowl.
        scale: f64,
        /// Lowest error.
        floor: f64,
    },
}

impl Curve {
    pub fn at(&self, n: usize) -> f64 {
        match *self {
            Self::Inverse => 1.0 / n as f64,
            Self::Constant(error) => error,
            Self::Bowl {
                center,
                scale,
                floor,
            } => {
                let d = n as f64 - center;
                d * d / scale + floor
            }
        }
    }
}

/// Construction parameters of [`CurveModel`].
#[derive(Debug, Clone)]
pub struct CurveConfig {
    pub curve: Curve,
    /// Predict one timestep too few.
    pub misshapen: bool,
}

impl CurveConfig {
    pub fn new(curve: Curve) -> Self {
        Self {
            curve,
            misshapen: false,
        }
    }
}

/// Control emitted by [`CurveModel`].
#[derive(Debug, Clone, Default)]
pub struct CurveAct {
    /// Value of every control entry, and so the cost of every horizon.
    pub per_horizon_cost: f64,
}

/// Model whose test error follows a [`Curve`].
#[derive(Debug, Clone)]
pub struct CurveModel {
    embed_dim: usize,
    config: CurveConfig,
    n: usize,
    fits: usize,
}

impl CurveModel {
    pub fn fits(&self) -> usize {
        self.fits
    }
}

impl Model for CurveModel {
    type Config = CurveConfig;
    type FitConfig = ();
    type ActConfig = CurveAct;

    fn new(
        embed_dim: usize,
        _timesteps: usize,
        _max_control_cost: f64,
        config: &CurveConfig,
        _seed: Option<u64>,
    ) -> Result<Self> {
        Ok(Self {
            embed_dim,
            config: config.clone(),
            n: 0,
            fits: 0,
        })
    }

    fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    fn fit(&mut self, x: ArrayView3<'_, f64>, _config: &()) -> Result<()> {
        if x.len_of(Axis(0)) == 0 {
            return Err(DojoError::Model("empty training set".to_string()));
        }
        self.n = x.len_of(Axis(0));
        self.fits += 1;
        Ok(())
    }

    fn forecast(&self, x0: ArrayView2<'_, f64>, timesteps: usize) -> Result<Trajectories> {
        let timesteps = if self.config.misshapen {
            timesteps.saturating_sub(1)
        } else {
            timesteps
        };
        Ok(Array3::from_elem(
            (x0.len_of(Axis(0)), timesteps, self.embed_dim),
            self.config.curve.at(self.n),
        ))
    }

    fn control(&mut self, x: ArrayView3<'_, f64>, config: &CurveAct) -> Result<Control> {
        Ok(Array3::from_elem(x.raw_dim(), config.per_horizon_cost))
    }
}
