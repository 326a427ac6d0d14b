//! The learnable-model contract.
//!
//! A [`Model`] is built fresh for every sample-count candidate the engine
//! evaluates, fitted on one or more trajectory batches, asked for control
//! signals during closed-loop training, and finally asked to predict held-out
//! trajectories from their initial states.
//!
//! Constructor, fit and act parameters are explicit associated config types
//! rather than keyword dictionaries. [`ModelSpec`] bundles the three so a
//! challenge can build identical models in every cell.

use std::fmt::Debug;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

use crate::error::Result;
use crate::trajectory::{ensure_shape, Control, Trajectories};

/// A model that learns (and optionally controls) a dynamical system.
///
/// # Example
///
/// ```rust,ignore
/// impl Model for MyModel {
///     type Config = MyConfig;
///     type FitConfig = ();
///     type ActConfig = ();
///
///     fn new(embed_dim: usize, timesteps: usize, max_control_cost: f64,
///            config: &MyConfig, seed: Option<u64>) -> Result<Self> { /* ... */ }
///     fn embed_dim(&self) -> usize { self.embed_dim }
///     fn fit(&mut self, x: ArrayView3<'_, f64>, _: &()) -> Result<()> { /* ... */ }
///     fn forecast(&self, x0: ArrayView2<'_, f64>, timesteps: usize) -> Result<Trajectories> { /* ... */ }
/// }
/// ```
pub trait Model: Sized {
    /// Construction parameters.
    type Config: Clone + Debug + Send + Sync;

    /// Parameters passed to every [`Model::fit`] call.
    type FitConfig: Clone + Debug + Default + Send + Sync;

    /// Parameters passed to every [`Model::act`] call.
    type ActConfig: Clone + Debug + Default + Send + Sync;

    /// Builds an unfitted model.
    ///
    /// `timesteps` is the length of the training trajectories and
    /// `max_control_cost` the total control budget of one closed-loop run.
    fn new(
        embed_dim: usize,
        timesteps: usize,
        max_control_cost: f64,
        config: &Self::Config,
        seed: Option<u64>,
    ) -> Result<Self>;

    /// Observed state dimension the model was built for.
    fn embed_dim(&self) -> usize;

    /// Fits on a `(n, timesteps, embed_dim)` batch, updating internal state.
    fn fit(&mut self, x: ArrayView3<'_, f64>, config: &Self::FitConfig) -> Result<()>;

    /// Rolls forward from `x0` for `timesteps` steps; index 0 is `x0` itself.
    fn forecast(&self, x0: ArrayView2<'_, f64>, timesteps: usize) -> Result<Trajectories>;

    /// Raw control signal for `x`. Defaults to no control.
    fn control(&mut self, x: ArrayView3<'_, f64>, _config: &Self::ActConfig) -> Result<Control> {
        Ok(Array3::zeros(x.raw_dim()))
    }

    /// Control signal for `x`, checked to have the same shape as `x`.
    fn act(&mut self, x: ArrayView3<'_, f64>, config: &Self::ActConfig) -> Result<Control> {
        let control = self.control(x, config)?;
        ensure_shape("act", control.shape(), x.shape())?;
        Ok(control)
    }

    /// Prediction from `x0`, checked to be `(n, timesteps, embed_dim)`.
    fn predict(&self, x0: ArrayView2<'_, f64>, timesteps: usize) -> Result<Trajectories> {
        let pred = self.forecast(x0, timesteps)?;
        ensure_shape(
            "predict",
            pred.shape(),
            &[x0.len_of(Axis(0)), timesteps, self.embed_dim()],
        )?;
        Ok(pred)
    }
}

/// Everything needed to build and drive one model family.
pub struct ModelSpec<M: Model> {
    /// Constructor parameters.
    pub config: M::Config,
    /// Parameters for every fit call.
    pub fit: M::FitConfig,
    /// Parameters for every act call.
    pub act: M::ActConfig,
}

impl<M: Model> ModelSpec<M> {
    /// Creates a spec with default fit and act parameters.
    #[must_use]
    pub fn new(config: M::Config) -> Self {
        Self {
            config,
            fit: M::FitConfig::default(),
            act: M::ActConfig::default(),
        }
    }

    /// Sets the fit parameters.
    #[must_use]
    pub fn with_fit(mut self, fit: M::FitConfig) -> Self {
        self.fit = fit;
        self
    }

    /// Sets the act parameters.
    #[must_use]
    pub fn with_act(mut self, act: M::ActConfig) -> Self {
        self.act = act;
        self
    }

    /// Builds a fresh model from this spec.
    pub fn build(
        &self,
        embed_dim: usize,
        timesteps: usize,
        max_control_cost: f64,
        seed: Option<u64>,
    ) -> Result<M> {
        M::new(embed_dim, timesteps, max_control_cost, &self.config, seed)
    }
}

impl<M: Model> Clone for ModelSpec<M> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            fit: self.fit.clone(),
            act: self.act.clone(),
        }
    }
}

impl<M: Model> Debug for ModelSpec<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSpec")
            .field("config", &self.config)
            .field("fit", &self.fit)
            .field("act", &self.act)
            .finish()
    }
}

impl<M: Model> Default for ModelSpec<M>
where
    M::Config: Default,
{
    fn default() -> Self {
        Self::new(M::Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DojoError;
    use ndarray::Array2;

    /// Echoes its input and emits a deliberately malformed control.
    #[derive(Debug)]
    struct Echo {
        embed_dim: usize,
        bad_control: bool,
    }

    impl Model for Echo {
        type Config = bool;
        type FitConfig = ();
        type ActConfig = ();

        fn new(
            embed_dim: usize,
            _timesteps: usize,
            _max_control_cost: f64,
            config: &bool,
            _seed: Option<u64>,
        ) -> Result<Self> {
            Ok(Self {
                embed_dim,
                bad_control: *config,
            })
        }

        fn embed_dim(&self) -> usize {
            self.embed_dim
        }

        fn fit(&mut self, _x: ArrayView3<'_, f64>, _config: &()) -> Result<()> {
            Ok(())
        }

        fn forecast(&self, x0: ArrayView2<'_, f64>, timesteps: usize) -> Result<Trajectories> {
            let (n, e) = x0.dim();
            Ok(Array3::from_shape_fn((n, timesteps, e), |(i, _, j)| x0[[i, j]]))
        }

        fn control(&mut self, x: ArrayView3<'_, f64>, _config: &()) -> Result<Control> {
            let (n, t, e) = x.dim();
            if self.bad_control {
                Ok(Array3::zeros((n, t + 1, e)))
            } else {
                Ok(Array3::zeros((n, t, e)))
            }
        }
    }

    #[test]
    fn test_predict_shape_checked() {
        let model: Echo = ModelSpec::<Echo>::new(false).build(3, 5, 1.0, None).unwrap();
        let x0 = Array2::<f64>::ones((4, 3));
        let pred = model.predict(x0.view(), 7).unwrap();
        assert_eq!(pred.dim(), (4, 7, 3));

        let wrong_width = Array2::<f64>::ones((4, 2));
        assert!(matches!(
            model.predict(wrong_width.view(), 7),
            Err(DojoError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_act_shape_checked() {
        let x = Array3::<f64>::zeros((2, 3, 3));
        let mut good: Echo = ModelSpec::<Echo>::new(false).build(3, 3, 1.0, None).unwrap();
        assert_eq!(good.act(x.view(), &()).unwrap().dim(), (2, 3, 3));

        let mut bad: Echo = ModelSpec::<Echo>::new(true).build(3, 3, 1.0, None).unwrap();
        assert!(bad.act(x.view(), &()).is_err());
    }
}
