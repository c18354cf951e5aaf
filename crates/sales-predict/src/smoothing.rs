//! Smoothing filters.

use crate::error::PredictError;
use std::collections::VecDeque;

/// Exponentially weighted average: `value <- w * x + (1 - w) * value`.
/// The first observation is taken as is.
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialFilter {
    weight: f64,
    value: Option<f64>,
}

impl ExponentialFilter {
    /// Filter giving `weight` (in (0, 1]) to each new observation.
    pub fn new(weight: f64) -> Result<Self, PredictError> {
        if !(weight.is_finite() && weight > 0.0 && weight <= 1.0) {
            return Err(PredictError::InvalidWeight(weight));
        }
        Ok(Self { weight, value: None })
    }

    /// Filter whose weight matches an `n`-period moving average:
    /// `2 / (n + 1)`.
    pub fn with_span(span: usize) -> Result<Self, PredictError> {
        if span == 0 {
            return Err(PredictError::ZeroWindow);
        }
        Self::new(2.0 / (span as f64 + 1.0))
    }

    /// Non-finite observations are ignored.
    pub fn add(&mut self, observation: f64) {
        if !observation.is_finite() {
            return;
        }
        self.value = Some(match self.value {
            Some(v) => self.weight * observation + (1.0 - self.weight) * v,
            None => observation,
        });
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Mean of the last `size` observations.
#[derive(Clone, Debug)]
pub struct MovingAverage {
    size: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    pub fn new(size: usize) -> Result<Self, PredictError> {
        if size == 0 {
            return Err(PredictError::ZeroWindow);
        }
        Ok(Self {
            size,
            window: VecDeque::with_capacity(size),
            sum: 0.0,
        })
    }

    /// Non-finite observations are ignored.
    pub fn add(&mut self, observation: f64) {
        if !observation.is_finite() {
            return;
        }
        self.window.push_back(observation);
        self.sum += observation;
        if self.window.len() > self.size {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
    }

    /// `None` until the first observation.
    pub fn value(&self) -> Option<f64> {
        (!self.window.is_empty()).then(|| self.sum / self.window.len() as f64)
    }

    /// Observations currently averaged.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// True once `size` observations are in the window.
    pub fn is_full(&self) -> bool {
        self.window.len() == self.size
    }
}
