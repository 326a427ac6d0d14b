//! Wall-clock timing for training runs.
//!
//! Every result row records how long its run took. Durations are kept as raw
//! `u64` nanoseconds and converted on demand, so collecting them costs one
//! `Instant::now()` per run.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Duration stored as nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Duration {
    nanos: u64,
}

impl Duration {
    /// Zero duration constant.
    pub const ZERO: Self = Self { nanos: 0 };

    /// Creates a duration from nanoseconds.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Creates a duration from milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    /// Returns the duration in nanoseconds.
    #[inline]
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns the duration in seconds as f64.
    #[inline]
    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }

    /// Adds two durations without overflowing.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self {
            nanos: self.nanos.saturating_add(other.nanos),
        }
    }
}

impl std::iter::Sum for Duration {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl From<std::time::Duration> for Duration {
    #[inline]
    fn from(d: std::time::Duration) -> Self {
        Self {
            nanos: u64::try_from(d.as_nanos()).unwrap_or(u64::MAX),
        }
    }
}

/// Wall-clock timer.
///
/// # Example
///
/// ```
/// use dynadojo_rs::timing::Timer;
///
/// let timer = Timer::start();
/// // ... train a model ...
/// let elapsed = timer.elapsed();
/// assert!(elapsed.as_secs_f64() >= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Starts a new timer.
    #[inline]
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the elapsed duration since the timer was started.
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from(self.start.elapsed())
    }
}
