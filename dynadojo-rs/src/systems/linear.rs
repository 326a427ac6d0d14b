//! Stable linear dynamics observed through a random linear embedding.
//!
//! ```text
//! x_{t+1} = A x_t + C⁺ u_t        latent state, L dims
//! y_t     = C x_t (+ noise)       observed state, E dims
//! ```
//!
//! `A` is drawn from a standard normal and rescaled so its infinity norm (an
//! upper bound on the spectral radius) equals `spectral_bound`. `C` stacks the
//! L × L identity on top of a random (E − L) × L block, so it always has full
//! column rank and `C⁺ C = I`.
//!
//! Initial latent states are standard normal; the out-of-distribution law adds
//! `ood_shift` to every coordinate. Parameters and initial states come from one
//! ChaCha8 stream, drawn row by row; observation noise comes from a second
//! stream of the same seed, drawn in trajectory order. Equal seeds therefore
//! give equal training trajectories, noisy or not, however the requests are
//! split.

use nalgebra::{DMatrix, DVector};
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{DojoError, Result};
use crate::system::System;
use crate::trajectory::{InitConds, Trajectories};

const NOISE_STREAM: u64 = 1;

/// Parameters of [`LinearSystem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSystemConfig {
    /// Infinity norm of the latent transition matrix.
    #[serde(default = "default_spectral_bound")]
    pub spectral_bound: f64,

    /// Standard deviation of observation noise on noisy trajectories.
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f64,

    /// Offset added to out-of-distribution initial states.
    #[serde(default = "default_ood_shift")]
    pub ood_shift: f64,
}

fn default_spectral_bound() -> f64 {
    0.95
}
fn default_noise_scale() -> f64 {
    0.01
}
fn default_ood_shift() -> f64 {
    2.0
}

impl Default for LinearSystemConfig {
    fn default() -> Self {
        Self {
            spectral_bound: default_spectral_bound(),
            noise_scale: default_noise_scale(),
            ood_shift: default_ood_shift(),
        }
    }
}

impl LinearSystemConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DojoError::Config`] for a non-positive bound or a negative noise scale.
    pub fn validate(&self) -> Result<()> {
        if !(self.spectral_bound > 0.0) {
            return Err(DojoError::Config("spectral_bound must be > 0".to_string()));
        }
        if !(self.noise_scale >= 0.0) {
            return Err(DojoError::Config("noise_scale must be >= 0".to_string()));
        }
        if !self.ood_shift.is_finite() {
            return Err(DojoError::Config("ood_shift must be finite".to_string()));
        }
        Ok(())
    }
}

/// Reference linear system.
#[derive(Debug, Clone)]
pub struct LinearSystem {
    latent_dim: usize,
    embed_dim: usize,
    config: LinearSystemConfig,
    seed: u64,
    rng: ChaCha8Rng,
    noise_rng: ChaCha8Rng,
    transition: DMatrix<f64>,
    embedding: DMatrix<f64>,
    projection: DMatrix<f64>,
}

fn normal_matrix(rng: &mut ChaCha8Rng, rows: usize, cols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |_, _| rng.sample::<f64, _>(StandardNormal))
}

impl LinearSystem {
    /// Latent transition matrix `A`.
    #[must_use]
    pub fn transition(&self) -> &DMatrix<f64> {
        &self.transition
    }

    /// Embedding matrix `C`.
    #[must_use]
    pub fn embedding(&self) -> &DMatrix<f64> {
        &self.embedding
    }

    fn observe(&self, latent: &DVector<f64>) -> DVector<f64> {
        &self.embedding * latent
    }
}

impl System for LinearSystem {
    type Config = LinearSystemConfig;

    fn new(
        latent_dim: usize,
        embed_dim: usize,
        config: &LinearSystemConfig,
        seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;
        let seed = seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut noise_rng = ChaCha8Rng::seed_from_u64(seed);
        noise_rng.set_stream(NOISE_STREAM);

        let raw = normal_matrix(&mut rng, latent_dim, latent_dim);
        let norm = raw
            .row_iter()
            .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
            .fold(0.0, f64::max);
        let transition = if norm > 0.0 {
            raw * (config.spectral_bound / norm)
        } else {
            raw
        };

        let mut embedding = DMatrix::zeros(embed_dim, latent_dim);
        embedding
            .view_mut((0, 0), (latent_dim, latent_dim))
            .fill_with_identity();
        if embed_dim > latent_dim {
            let extra = normal_matrix(&mut rng, embed_dim - latent_dim, latent_dim);
            embedding
                .view_mut((latent_dim, 0), (embed_dim - latent_dim, latent_dim))
                .copy_from(&extra);
        }
        let projection = embedding
            .clone()
            .pseudo_inverse(1e-12)
            .map_err(|e| DojoError::System(format!("embedding has no pseudo-inverse: {e}")))?;

        Ok(Self {
            latent_dim,
            embed_dim,
            config: config.clone(),
            seed,
            rng,
            noise_rng,
            transition,
            embedding,
            projection,
        })
    }

    fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    fn seed(&self) -> Option<u64> {
        Some(self.seed)
    }

    fn config(&self) -> &LinearSystemConfig {
        &self.config
    }

    fn sample_init_conds(&mut self, n: usize, in_dist: bool) -> Result<InitConds> {
        let shift = if in_dist { 0.0 } else { self.config.ood_shift };
        let mut init = Array2::zeros((n, self.embed_dim));
        for mut row in init.axis_iter_mut(Axis(0)) {
            let latent = DVector::from_fn(self.latent_dim, |_, _| {
                self.rng.sample::<f64, _>(StandardNormal) + shift
            });
            let observed = self.observe(&latent);
            for (dst, src) in row.iter_mut().zip(observed.iter()) {
                *dst = *src;
            }
        }
        Ok(init)
    }

    fn simulate(
        &mut self,
        init_conds: ArrayView2<'_, f64>,
        control: ArrayView3<'_, f64>,
        timesteps: usize,
        noisy: bool,
    ) -> Result<Trajectories> {
        let n = init_conds.len_of(Axis(0));
        let mut out = Array3::zeros((n, timesteps, self.embed_dim));

        for (i, y0) in init_conds.axis_iter(Axis(0)).enumerate() {
            let y0 = DVector::from_iterator(self.embed_dim, y0.iter().copied());
            let mut latent = &self.projection * &y0;
            for (dst, src) in out.slice_mut(s![i, 0, ..]).iter_mut().zip(y0.iter()) {
                *dst = *src;
            }
            for t in 1..timesteps {
                let u = DVector::from_iterator(
                    self.embed_dim,
                    control.slice(s![i, t - 1, ..]).iter().copied(),
                );
                latent = &self.transition * latent + &self.projection * u;
                let observed = self.observe(&latent);
                out.slice_mut(s![i, t, ..])
                    .iter_mut()
                    .zip(observed.iter())
                    .for_each(|(dst, src)| *dst = *src);
            }
        }

        if noisy && self.config.noise_scale > 0.0 {
            let scale = self.config.noise_scale;
            for v in &mut out {
                *v += scale * self.noise_rng.sample::<f64, _>(StandardNormal);
            }
        }
        Ok(out)
    }

    fn loss(&self, pred: ArrayView3<'_, f64>, truth: ArrayView3<'_, f64>) -> Result<f64> {
        if pred.is_empty() {
            return Ok(0.0);
        }
        let mut sum = 0.0;
        Zip::from(pred).and(truth).for_each(|p, t| {
            let d = p - t;
            sum += d * d;
        });
        Ok(sum / pred.len() as f64)
    }

    fn control_cost(&self, control: ArrayView3<'_, f64>) -> Result<f64> {
        let n = control.len_of(Axis(0));
        if n == 0 {
            return Ok(0.0);
        }
        let total: f64 = control
            .axis_iter(Axis(0))
            .map(|u| u.iter().map(|v| v * v).sum::<f64>().sqrt())
            .sum();
        Ok(total / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::instantiate;
    use approx::assert_relative_eq;

    fn system(latent_dim: usize, embed_dim: usize, seed: u64) -> LinearSystem {
        instantiate(latent_dim, embed_dim, &LinearSystemConfig::default(), Some(seed)).unwrap()
    }

    #[test]
    fn test_transition_is_contractive() {
        let sys = system(4, 4, 3);
        let norm = sys
            .transition()
            .row_iter()
            .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
            .fold(0.0, f64::max);
        assert_relative_eq!(norm, 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_same_seed_same_data() {
        let mut a = system(2, 3, 17);
        let mut b = system(2, 3, 17);
        let xa = a.make_trainset(4, 6, false).unwrap();
        let xb = b.make_trainset(4, 6, false).unwrap();
        assert_eq!(xa, xb);
    }

    #[test]
    fn test_trajectories_start_at_init_conds() {
        let mut sys = system(2, 5, 1);
        let x0 = sys.make_init_conds(3, true).unwrap();
        let x = sys.make_data(x0.view(), None, 4, false).unwrap();
        assert_eq!(x.index_axis(Axis(1), 0), x0.view());
    }

    #[test]
    fn test_ood_init_conds_are_shifted() {
        let mut sys = system(1, 1, 8);
        let in_dist = sys.make_init_conds(200, true).unwrap();
        let ood = sys.make_init_conds(200, false).unwrap();
        let mean_in = in_dist.mean().unwrap();
        let mean_ood = ood.mean().unwrap();
        assert!(mean_ood - mean_in > 1.0);
    }

    #[test]
    fn test_noise_perturbs_trajectories() {
        let mut sys = system(2, 2, 4);
        let x0 = sys.make_init_conds(2, true).unwrap();
        let clean = sys.make_data(x0.view(), None, 5, false).unwrap();
        let noisy = sys.make_data(x0.view(), None, 5, true).unwrap();
        assert_ne!(clean, noisy);
    }

    #[test]
    fn test_control_moves_the_state() {
        let mut sys = system(2, 2, 6);
        let x0 = sys.make_init_conds(1, true).unwrap();
        let free = sys.make_data(x0.view(), None, 3, false).unwrap();
        let push = Array3::from_elem((1, 3, 2), 1.0);
        let forced = sys.make_data(x0.view(), Some(push.view()), 3, false).unwrap();
        assert_eq!(free.index_axis(Axis(1), 0), forced.index_axis(Axis(1), 0));
        assert_relative_eq!(
            forced[[0, 1, 0]] - free[[0, 1, 0]],
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_loss_and_cost() {
        let sys = system(1, 2, 0);
        let a = Array3::<f64>::zeros((2, 2, 2));
        let b = Array3::<f64>::from_elem((2, 2, 2), 2.0);
        assert_relative_eq!(sys.calc_loss(a.view(), b.view()).unwrap(), 4.0);
        // each trajectory has Frobenius norm sqrt(4 * 4) = 4
        assert_relative_eq!(sys.calc_control_cost(b.view()).unwrap(), 4.0);
    }
}
