//! The dynamical-system contract.
//!
//! A [`System`] owns a simulator for one `(latent_dim, embed_dim)` pair. It
//! samples initial conditions, rolls trajectories forward (optionally under a
//! control signal) and scores predictions and control effort.
//!
//! Implementors provide the raw capabilities (`sample_init_conds`, `simulate`,
//! `loss`, `control_cost`). The engine only calls the provided `make_*` and
//! `calc_*` methods, which check every shape against the contract before and
//! after delegating.
//!
//! Systems are not reconfigured in place. [`System::reconfigure`] consumes the
//! instance and returns one built for the new dimensions, so no two sweep cells
//! can alias the same mutable simulator.

use std::fmt::Debug;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

use crate::error::{DojoError, Result};
use crate::trajectory::{ensure_shape, InitConds, Trajectories};

/// A simulated dynamical system that models are trained and scored against.
///
/// # Example
///
/// ```rust
/// use dynadojo_rs::system::{instantiate, System};
/// use dynadojo_rs::systems::{LinearSystem, LinearSystemConfig};
///
/// # fn main() -> dynadojo_rs::Result<()> {
/// let mut system: LinearSystem = instantiate(2, 3, &LinearSystemConfig::default(), Some(7))?;
/// let x0 = system.make_init_conds(5, true)?;
/// let x = system.make_data(x0.view(), None, 10, false)?;
/// assert_eq!(x.dim(), (5, 10, 3));
/// # Ok(())
/// # }
/// ```
pub trait System: Sized + Send {
    /// Family-specific construction parameters.
    type Config: Clone + Debug + Send + Sync;

    /// Builds a system with the given dimensions.
    ///
    /// `seed` makes the instance reproducible; `None` draws fresh entropy.
    fn new(
        latent_dim: usize,
        embed_dim: usize,
        config: &Self::Config,
        seed: Option<u64>,
    ) -> Result<Self>;

    /// True state dimension.
    fn latent_dim(&self) -> usize;

    /// Observed state dimension.
    fn embed_dim(&self) -> usize;

    /// Seed the instance was built with.
    fn seed(&self) -> Option<u64>;

    /// Parameters the instance was built with.
    fn config(&self) -> &Self::Config;

    /// Samples `n` initial conditions, shape `(n, embed_dim)`.
    ///
    /// `in_dist = false` samples from the shifted (out-of-distribution) law.
    fn sample_init_conds(&mut self, n: usize, in_dist: bool) -> Result<InitConds>;

    /// Rolls `init_conds` forward for `timesteps` steps under `control`.
    ///
    /// The first time index of the result is the initial condition.
    fn simulate(
        &mut self,
        init_conds: ArrayView2<'_, f64>,
        control: ArrayView3<'_, f64>,
        timesteps: usize,
        noisy: bool,
    ) -> Result<Trajectories>;

    /// Scalar loss between two equally shaped trajectory batches.
    fn loss(&self, pred: ArrayView3<'_, f64>, truth: ArrayView3<'_, f64>) -> Result<f64>;

    /// Scalar cost of a control batch.
    fn control_cost(&self, control: ArrayView3<'_, f64>) -> Result<f64>;

    /// Returns a system for new dimensions, keeping config and seed.
    ///
    /// The instance is returned unchanged when the dimensions already match.
    fn reconfigure(self, latent_dim: usize, embed_dim: usize) -> Result<Self> {
        if latent_dim == self.latent_dim() && embed_dim == self.embed_dim() {
            return Ok(self);
        }
        instantiate(latent_dim, embed_dim, self.config(), self.seed())
    }

    /// Samples `n` initial conditions and checks their shape.
    fn make_init_conds(&mut self, n: usize, in_dist: bool) -> Result<InitConds> {
        let init_conds = self.sample_init_conds(n, in_dist)?;
        ensure_shape("make_init_conds", init_conds.shape(), &[n, self.embed_dim()])?;
        Ok(init_conds)
    }

    /// Generates trajectories from `init_conds`, with zero control when
    /// `control` is `None`.
    fn make_data(
        &mut self,
        init_conds: ArrayView2<'_, f64>,
        control: Option<ArrayView3<'_, f64>>,
        timesteps: usize,
        noisy: bool,
    ) -> Result<Trajectories> {
        if timesteps == 0 {
            return Err(DojoError::Config("timesteps must be > 0".to_string()));
        }
        let embed_dim = self.embed_dim();
        if init_conds.len_of(Axis(1)) != embed_dim {
            return Err(DojoError::ShapeMismatch {
                context: "make_data init_conds",
                expected: vec![init_conds.len_of(Axis(0)), embed_dim],
                actual: init_conds.shape().to_vec(),
            });
        }
        let n = init_conds.len_of(Axis(0));
        let expected = [n, timesteps, embed_dim];

        let zeros;
        let control = match control {
            Some(control) => {
                ensure_shape("make_data control", control.shape(), &expected)?;
                control.reborrow()
            }
            None => {
                zeros = Array3::<f64>::zeros((n, timesteps, embed_dim));
                zeros.view()
            }
        };

        let data = self.simulate(init_conds, control, timesteps, noisy)?;
        ensure_shape("make_data output", data.shape(), &expected)?;
        Ok(data)
    }

    /// Loss between `pred` and `truth`, which must have equal shapes.
    fn calc_loss(&self, pred: ArrayView3<'_, f64>, truth: ArrayView3<'_, f64>) -> Result<f64> {
        ensure_shape("calc_loss", pred.shape(), truth.shape())?;
        self.loss(pred, truth)
    }

    /// Cost of a `(n, timesteps, embed_dim)` control batch.
    fn calc_control_cost(&self, control: ArrayView3<'_, f64>) -> Result<f64> {
        let (n, timesteps, embed_dim) = control.dim();
        ensure_shape(
            "calc_control_cost",
            &[n, timesteps, embed_dim],
            &[n, timesteps, self.embed_dim()],
        )?;
        self.control_cost(control)
    }

    /// Generates `n` uncontrolled in-distribution training trajectories.
    fn make_trainset(&mut self, n: usize, timesteps: usize, noisy: bool) -> Result<Trajectories> {
        let init_conds = self.make_init_conds(n, true)?;
        self.make_data(init_conds.view(), None, timesteps, noisy)
    }

    /// Generates `n` noise-free test trajectories.
    fn make_testset(&mut self, n: usize, timesteps: usize, in_dist: bool) -> Result<Trajectories> {
        let init_conds = self.make_init_conds(n, in_dist)?;
        self.make_data(init_conds.view(), None, timesteps, false)
    }
}

/// Builds a system after checking `embed_dim >= latent_dim`.
pub fn instantiate<S: System>(
    latent_dim: usize,
    embed_dim: usize,
    config: &S::Config,
    seed: Option<u64>,
) -> Result<S> {
    if latent_dim == 0 || embed_dim < latent_dim {
        return Err(DojoError::InvalidDimensions {
            latent_dim,
            embed_dim,
        });
    }
    S::new(latent_dim, embed_dim, config, seed)
}
