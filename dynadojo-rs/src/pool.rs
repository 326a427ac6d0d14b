//! Append-only pool of training trajectories.
//!
//! Training sets of different sizes inside one cell are prefixes of a single
//! pool. Asking for more trajectories than the pool holds generates only the
//! missing ones and appends them, so a set of size `n₁` stays the first `n₁`
//! rows of every larger set requested later in the same cell.

use ndarray::{concatenate, s, Array3, ArrayView3, Axis};
use tracing::debug;

use crate::error::{DojoError, Result};
use crate::system::System;

/// Growable `(pool_size, timesteps, embed_dim)` buffer of trajectories.
#[derive(Debug, Clone)]
pub struct TrajectoryPool {
    data: Array3<f64>,
    timesteps: usize,
    noisy: bool,
}

impl TrajectoryPool {
    /// Creates a pool seeded with `initial` trajectories from `system`.
    pub fn new<S: System>(
        system: &mut S,
        initial: usize,
        timesteps: usize,
        noisy: bool,
    ) -> Result<Self> {
        let data = if initial == 0 {
            Array3::zeros((0, timesteps, system.embed_dim()))
        } else {
            system.make_trainset(initial, timesteps, noisy)?
        };
        Ok(Self {
            data,
            timesteps,
            noisy,
        })
    }

    /// Number of trajectories currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Whether the pool holds no trajectories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grows the pool to at least `n` trajectories.
    pub fn ensure<S: System>(&mut self, system: &mut S, n: usize) -> Result<()> {
        let have = self.len();
        if n <= have {
            return Ok(());
        }
        let extra = system.make_trainset(n - have, self.timesteps, self.noisy)?;
        self.data = concatenate(Axis(0), &[self.data.view(), extra.view()])
            .map_err(|e| DojoError::System(format!("pool growth failed: {e}")))?;
        debug!(from = have, to = n, "grew trajectory pool");
        Ok(())
    }

    /// The first `n` trajectories, growing the pool first when needed.
    pub fn request<S: System>(&mut self, system: &mut S, n: usize) -> Result<ArrayView3<'_, f64>> {
        self.ensure(system, n)?;
        Ok(self.prefix(n))
    }

    /// The first `min(n, len)` trajectories without growing.
    #[must_use]
    pub fn prefix(&self, n: usize) -> ArrayView3<'_, f64> {
        let n = n.min(self.len());
        self.data.slice(s![..n, .., ..])
    }
}
