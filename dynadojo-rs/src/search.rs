//! Sample-complexity search.
//!
//! Finds the smallest training-set size `n*` whose test error reaches a target,
//! assuming the error is a (noisy) convex function of `n`. The search asks an
//! [`ErrorOracle`] for the error at candidate sizes and runs in two phases.
//!
//! # Phase 1: exponential search
//!
//! Starting at `n_start`, step forward with an increment that doubles after every
//! step (capped at `n_max / 10`) until the error drops below the target. That
//! gives a bracket `[n_lower, n_upper]` with `error(n_lower) > target` and
//! `error(n_upper) < target`. When the walk overshoots the minimum of the curve
//! (error starts rising), it backs up and restarts with increment 1:
//!
//! - two or more sizes on the stack: jump back to the second-to-last one, or give
//!   up with [`SearchOutcome::LocalMinimum`] when that is within precision of the
//!   current size;
//! - one size on the stack: halve it.
//!
//! If the very first evaluations already meet the target, the start is halved
//! until the target is no longer met. Every `(n, increment)` pair is remembered;
//! seeing one twice ends the search with the best size found so far.
//!
//! # Phase 2: binary search
//!
//! Bisect the bracket until `n_upper - n_lower <= max(n_precision, 1)` and answer
//! `ceil((n_lower + n_upper) / 2)`.
//!
//! ```text
//!  error
//!    │╲
//!    │ ╲
//!    │  ╲___                 target reached between
//!  ──┼──────╲──────── target  n_lower and n_upper
//!    │       ╲___
//!    └──────┬──┬───────── n
//!        lower upper
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DojoError, Result};

/// Error and control cost measured at one sample count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Test error driving the search.
    pub error: f64,
    /// Control cost spent while training.
    pub cost: f64,
}

/// Something that can measure the test error at a training-set size.
///
/// `window > 0` asks for a smoothed measurement over neighbouring sizes.
pub trait ErrorOracle {
    /// Measures the error at `n` training trajectories.
    fn evaluate(&mut self, n: usize, window: usize) -> Result<Evaluation>;
}

impl<F> ErrorOracle for F
where
    F: FnMut(usize, usize) -> Result<Evaluation>,
{
    fn evaluate(&mut self, n: usize, window: usize) -> Result<Evaluation> {
        self(n, window)
    }
}

/// Tuning of one search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Error the search tries to reach.
    pub target_error: f64,
    /// Acceptable width of the final bracket.
    pub n_precision: usize,
    /// Half-width of the smoothing window passed to the oracle.
    pub n_window: usize,
    /// Largest training-set size ever evaluated.
    pub n_max: usize,
}

impl SearchParams {
    fn validate(&self) -> Result<()> {
        if self.n_max == 0 {
            return Err(DojoError::Config("n_max must be > 0".to_string()));
        }
        if !self.target_error.is_finite() {
            return Err(DojoError::Config("target_error must be finite".to_string()));
        }
        Ok(())
    }
}

/// Result of a sample-complexity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Smallest training-set size reaching the target, within precision.
    Found(usize),
    /// Target not reached by any size up to `n_max`.
    Unreachable,
    /// The error curve bottoms out above the target.
    LocalMinimum,
}

impl SearchOutcome {
    /// Conventional numeric encoding: `n`, `-1` or `+inf`.
    #[must_use]
    pub fn sentinel(&self) -> f64 {
        match self {
            Self::Found(n) => *n as f64,
            Self::Unreachable => -1.0,
            Self::LocalMinimum => f64::INFINITY,
        }
    }

    /// The size found, if any.
    #[must_use]
    pub fn found(&self) -> Option<usize> {
        match self {
            Self::Found(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found(n) => write!(f, "{n}"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::LocalMinimum => write!(f, "local minimum"),
        }
    }
}

/// Bracket produced by the exponential phase.
enum Bracket {
    Between { lower: usize, upper: usize },
    Done(SearchOutcome),
}

const GROWTH: usize = 2;

fn grow(increment: usize, increment_max: usize) -> usize {
    (increment * GROWTH).max(1).min(increment_max)
}

/// Runs the two-phase search starting from `n_start`.
///
/// Every oracle call is a side effect the caller may record; the search calls
/// the oracle for every size it probes, not only the final answer.
///
/// # Errors
///
/// Propagates oracle errors and rejects a zero `n_max` or non-finite target.
pub fn search<O: ErrorOracle + ?Sized>(
    oracle: &mut O,
    params: &SearchParams,
    n_start: usize,
) -> Result<SearchOutcome> {
    params.validate()?;
    match exponential_phase(oracle, params, n_start.max(1))? {
        Bracket::Done(outcome) => Ok(outcome),
        Bracket::Between { lower, upper } => binary_phase(oracle, params, lower, upper),
    }
}

fn exponential_phase<O: ErrorOracle + ?Sized>(
    oracle: &mut O,
    params: &SearchParams,
    n_start: usize,
) -> Result<Bracket> {
    let target = params.target_error;
    let precision = params.n_precision;
    let increment_max = (params.n_max / 10).max(1);

    let mut n_curr = n_start;
    let mut increment = 1;
    let mut n_prevs: Vec<usize> = Vec::new();
    let mut error_prev: Option<f64> = None;
    let mut history: HashSet<(usize, usize)> = HashSet::new();
    let mut best: Option<usize> = None;

    loop {
        if n_curr > params.n_max {
            return Ok(Bracket::Done(SearchOutcome::Unreachable));
        }
        if !history.insert((n_curr, increment)) {
            warn!(
                n = n_curr,
                increment,
                ?error_prev,
                ?n_prevs,
                "search revisited a state; returning best size found"
            );
            return Ok(Bracket::Done(
                best.map_or(SearchOutcome::LocalMinimum, SearchOutcome::Found),
            ));
        }

        let error = oracle.evaluate(n_curr, params.n_window)?.error;
        debug!(n = n_curr, increment, error, "exponential search step");
        if error <= target && best.map_or(true, |b| n_curr < b) {
            best = Some(n_curr);
        }

        match error_prev {
            Some(prev) if error > prev => {
                // Past the bottom of the curve: back up and restart slowly.
                if n_prevs.len() > 1 {
                    let back = n_prevs[n_prevs.len() - 2];
                    if n_curr.saturating_sub(back) <= precision.max(1) {
                        return Ok(Bracket::Done(SearchOutcome::LocalMinimum));
                    }
                    n_curr = back;
                } else {
                    let prev_n = n_prevs.pop().unwrap_or(n_curr);
                    if prev_n < precision {
                        return Ok(Bracket::Done(SearchOutcome::Found(prev_n)));
                    }
                    n_curr = (prev_n / GROWTH).max(1);
                }
                n_prevs.clear();
                increment = 1;
                error_prev = None;
            }
            Some(_) if error < target => {
                let lower = n_prevs.last().copied().unwrap_or(n_curr);
                return Ok(Bracket::Between {
                    lower,
                    upper: n_curr,
                });
            }
            Some(_) => {
                n_prevs.push(n_curr);
                error_prev = Some(error);
                n_curr += increment;
                increment = grow(increment, increment_max);
            }
            None if error > target => {
                n_prevs.push(n_curr);
                error_prev = Some(error);
                n_curr += increment;
                increment = grow(increment, increment_max);
            }
            None => {
                if n_curr < precision + 1 {
                    return Ok(Bracket::Done(SearchOutcome::Found(n_curr)));
                }
                n_curr = (n_curr / GROWTH).max(1);
            }
        }
    }
}

fn binary_phase<O: ErrorOracle + ?Sized>(
    oracle: &mut O,
    params: &SearchParams,
    mut lower: usize,
    mut upper: usize,
) -> Result<SearchOutcome> {
    let target = params.target_error;
    let mut error_lower = oracle.evaluate(lower, params.n_window)?.error;
    oracle.evaluate(upper, params.n_window)?;

    loop {
        if upper - lower <= params.n_precision.max(1) {
            return Ok(SearchOutcome::Found((lower + upper).div_ceil(2)));
        }
        let mid = (lower + upper) / 2;
        let error_mid = oracle.evaluate(mid, params.n_window)?.error;
        debug!(lower, mid, upper, error_mid, "binary search step");
        // A midpoint exactly at the target counts as reached, keeping `error_lower > target`.
        if error_lower > target && error_mid <= target {
            upper = mid;
        } else {
            lower = mid;
            error_lower = error_mid;
        }
    }
}
