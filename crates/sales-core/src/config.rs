//! Sales department configuration and its invariants.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on a single geometric retry draw, in days.
pub const MAX_RETRY_DAYS: u32 = 365;

/// Validation errors for configuration invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// The weekly statistics window must hold at least one week.
    #[error("memory length must be >= 1")]
    ZeroMemoryLength,
    /// Probabilities must lie in (0, 1].
    #[error("probability {0} must be within (0, 1]")]
    InvalidProbability(f64),
}

/// When to try peddling a good again after a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Give up until the good is tasked again.
    Never,
    /// Retry after a fixed number of days; 0 gives up.
    Fixed {
        /// Delay in days.
        days: u32,
    },
    /// Each day the retry happens with the given probability.
    Geometric {
        /// Chance of retrying on any given day.
        daily_probability: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed { days: 1 }
    }
}

impl RetryPolicy {
    /// Days until the next attempt; `None` means give up.
    ///
    /// Example:
    /// let mut rng = ChaCha8Rng::seed_from_u64(1);
    /// assert_eq!(RetryPolicy::Fixed { days: 3 }.next_delay(&mut rng), Some(3));
    /// assert_eq!(RetryPolicy::Fixed { days: 0 }.next_delay(&mut rng), None);
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u32> {
        match *self {
            RetryPolicy::Never => None,
            RetryPolicy::Fixed { days } => (days > 0).then_some(days),
            RetryPolicy::Geometric { daily_probability } => {
                if !(daily_probability > 0.0 && daily_probability <= 1.0) {
                    return None;
                }
                let mut days = 1;
                while days < MAX_RETRY_DAYS && !rng.gen_bool(daily_probability) {
                    days += 1;
                }
                Some(days)
            }
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            RetryPolicy::Geometric { daily_probability }
                if !(daily_probability.is_finite()
                    && daily_probability > 0.0
                    && daily_probability <= 1.0) =>
            {
                Err(ValidationError::InvalidProbability(daily_probability))
            }
            _ => Ok(()),
        }
    }
}

/// Per-department sales parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesConfig {
    /// Number of weeks kept by the rolling statistics.
    pub memory_length: usize,
    /// Whether the department may search for buyers directly.
    pub can_peddle: bool,
    /// Also peddle goods that were just quoted.
    pub peddle_after_quoting: bool,
    /// Retry policy for failed peddling on quote-less markets.
    pub retry: RetryPolicy,
    /// Seed for deterministic retry draws.
    pub rng_seed: u64,
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self {
            memory_length: 5,
            can_peddle: true,
            peddle_after_quoting: false,
            retry: RetryPolicy::default(),
            rng_seed: 42,
        }
    }
}

impl SalesConfig {
    /// Check configuration invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.memory_length == 0 {
            return Err(ValidationError::ZeroMemoryLength);
        }
        self.retry.validate()
    }
}
