//! Predictor configuration errors.

use thiserror::Error;

/// Errors produced while building predictors or feeding regressions.
#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    /// A regression needs at least one coefficient.
    #[error("regression dimension must be positive")]
    ZeroDimension,
    /// Observation length differs from the regression dimension.
    #[error("observation has {found} values, regression expects {expected}")]
    DimensionMismatch {
        /// Regression dimension.
        expected: usize,
        /// Length of the rejected observation.
        found: usize,
    },
    /// Non-finite value or non-positive weight.
    #[error("observation is not finite or has a non-positive weight")]
    InvalidObservation,
    /// A recursive model regresses on at least one lag of its input.
    #[error("at least one independent lag is required")]
    NoIndependentLags,
    /// The forward simulation runs at least one step.
    #[error("prediction horizon must be positive")]
    ZeroHorizon,
    /// Model switching needs at least one candidate.
    #[error("model switching needs at least one model")]
    NoModels,
    /// Smoothing windows hold at least one value.
    #[error("smoothing window must be positive")]
    ZeroWindow,
    /// Exponential filter weights lie in (0, 1].
    #[error("invalid smoothing weight: {0}")]
    InvalidWeight(f64),
    /// A fixed price response must be finite.
    #[error("price delta must be finite, got {0}")]
    InvalidDelta(f64),
    /// Fits need at least two observations.
    #[error("minimum observations must be at least 2, got {0}")]
    TooFewObservations(usize),
    /// The predictor description could not be parsed.
    #[error("invalid predictor description: {0}")]
    Parse(String),
}
