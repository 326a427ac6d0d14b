//! Array types exchanged between systems, models and the engine.
//!
//! A trajectory batch is a dense `n × timesteps × embed_dim` array; a batch of
//! initial conditions is `n × embed_dim`. Control signals share the shape of the
//! trajectory batch they act on.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::error::{DojoError, Result};

/// Batch of trajectories, shape `(n, timesteps, embed_dim)`.
pub type Trajectories = Array3<f64>;

/// Batch of initial conditions, shape `(n, embed_dim)`.
pub type InitConds = Array2<f64>;

/// Control signal batch, same shape as the trajectories it perturbs.
pub type Control = Array3<f64>;

/// Fails with [`DojoError::ShapeMismatch`] unless `actual == expected`.
pub fn ensure_shape(context: &'static str, actual: &[usize], expected: &[usize]) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(DojoError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}

/// States at time index 0 of every trajectory, shape `(n, embed_dim)`.
#[must_use]
pub fn first_states(x: ArrayView3<'_, f64>) -> ArrayView2<'_, f64> {
    x.index_axis_move(Axis(1), 0)
}

/// States at the final time index of every trajectory, shape `(n, embed_dim)`.
///
/// # Panics
///
/// Panics if the batch has no timesteps.
#[must_use]
pub fn last_states(x: ArrayView3<'_, f64>) -> ArrayView2<'_, f64> {
    let last = x.len_of(Axis(1)).saturating_sub(1);
    x.index_axis_move(Axis(1), last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_shape() {
        assert!(ensure_shape("test", &[2, 3, 4], &[2, 3, 4]).is_ok());
        let err = ensure_shape("test", &[2, 3], &[2, 4]).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_first_and_last_states() {
        let x = Array3::from_shape_fn((2, 3, 2), |(i, t, e)| (i * 100 + t * 10 + e) as f64);
        let first = first_states(x.view());
        let last = last_states(x.view());
        assert_eq!(first.dim(), (2, 2));
        assert_eq!(first[[1, 1]], 101.0);
        assert_eq!(last[[0, 0]], 20.0);
        assert_eq!(last[[1, 1]], 121.0);
    }
}
