//! Online and batch linear regression.

use crate::error::PredictError;

/// Initial diagonal of the coefficient covariance: coefficients start
/// essentially unknown.
pub const INITIAL_COVARIANCE: f64 = 1e6;

/// Recursive least squares written as a Kalman filter on the coefficients.
///
/// Each observation updates the coefficients in O(n^2) without storing past
/// data. Observation weights scale the innovation noise (`noise / weight`),
/// so low-weight observations move the fit less.
///
/// Example:
/// let mut r = KalmanRecursiveRegression::new(2)?;
/// r.add_observation(1.0, 5.0, &[1.0, 1.0])?;
#[derive(Clone, Debug)]
pub struct KalmanRecursiveRegression {
    dimension: usize,
    beta: Vec<f64>,
    // row-major n x n
    covariance: Vec<f64>,
    noise_variance: f64,
    observations: usize,
}

impl KalmanRecursiveRegression {
    /// Regression with `dimension` coefficients starting at zero.
    pub fn new(dimension: usize) -> Result<Self, PredictError> {
        Self::with_beta(vec![0.0; dimension])
    }

    /// Regression starting from the given coefficients.
    pub fn with_beta(beta: Vec<f64>) -> Result<Self, PredictError> {
        let dimension = beta.len();
        if dimension == 0 {
            return Err(PredictError::ZeroDimension);
        }
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(PredictError::InvalidObservation);
        }
        let mut covariance = vec![0.0; dimension * dimension];
        for i in 0..dimension {
            covariance[i * dimension + i] = INITIAL_COVARIANCE;
        }
        Ok(Self {
            dimension,
            beta,
            covariance,
            noise_variance: 1.0,
            observations: 0,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Current coefficients.
    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Overwrite one coefficient. Returns false if `index` is out of range.
    pub fn set_beta(&mut self, index: usize, value: f64) -> bool {
        match self.beta.get_mut(index) {
            Some(b) if value.is_finite() => {
                *b = value;
                true
            }
            _ => false,
        }
    }

    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    pub fn set_noise_variance(&mut self, noise_variance: f64) {
        if noise_variance.is_finite() && noise_variance > 0.0 {
            self.noise_variance = noise_variance;
        }
    }

    /// Covariance entry `(row, column)`.
    pub fn covariance(&self, row: usize, column: usize) -> Option<f64> {
        if row < self.dimension && column < self.dimension {
            Some(self.covariance[row * self.dimension + column])
        } else {
            None
        }
    }

    /// Sum of the covariance diagonal; shrinks as the fit gains confidence.
    pub fn trace(&self) -> f64 {
        (0..self.dimension)
            .map(|i| self.covariance[i * self.dimension + i])
            .sum()
    }

    /// Observations accepted so far.
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// `beta . x`, or `None` when `x` has the wrong length.
    pub fn predict(&self, x: &[f64]) -> Option<f64> {
        (x.len() == self.dimension).then(|| dot(&self.beta, x))
    }

    /// Fold in one observation of `y` at regressors `x`. Returns the
    /// residual of the fit before the update.
    pub fn add_observation(&mut self, weight: f64, y: f64, x: &[f64]) -> Result<f64, PredictError> {
        let n = self.dimension;
        if x.len() != n {
            return Err(PredictError::DimensionMismatch {
                expected: n,
                found: x.len(),
            });
        }
        if !(weight.is_finite() && weight > 0.0 && y.is_finite()) || x.iter().any(|v| !v.is_finite()) {
            return Err(PredictError::InvalidObservation);
        }

        let px: Vec<f64> = (0..n)
            .map(|i| dot(&self.covariance[i * n..(i + 1) * n], x))
            .collect();
        let denominator = dot(x, &px) + self.noise_variance / weight;
        if !(denominator.is_finite() && denominator > 0.0) {
            return Err(PredictError::InvalidObservation);
        }
        let gain: Vec<f64> = px.iter().map(|v| v / denominator).collect();

        let residual = y - dot(&self.beta, x);
        for (b, k) in self.beta.iter_mut().zip(&gain) {
            *b += k * residual;
        }

        // P <- P - k (P x)^T, symmetrized
        let mut updated = self.covariance.clone();
        for i in 0..n {
            for j in 0..n {
                updated[i * n + j] -= gain[i] * px[j];
            }
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let mean = 0.5 * (updated[i * n + j] + updated[j * n + i]);
                updated[i * n + j] = mean;
                updated[j * n + i] = mean;
            }
        }
        if (0..n).all(|i| updated[i * n + i] >= 0.0) && updated.iter().all(|v| v.is_finite()) {
            self.covariance = updated;
        }
        self.observations += 1;
        Ok(residual)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Intercept and slope of a simple linear fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    /// Observations that contributed to the fit.
    pub observations: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Weighted least squares of `y` on `x`. Entries with a non-finite value or
/// a non-positive weight are skipped. With constant `x` the slope is 0 and
/// the intercept is the weighted mean of `y`.
///
/// Example:
/// let fit = weighted_ols(&[1.0, 2.0], &[3.0, 5.0], &[1.0, 1.0]).unwrap();
/// assert_eq!(fit.slope, 2.0);
pub fn weighted_ols(x: &[f64], y: &[f64], weights: &[f64]) -> Option<LinearFit> {
    if x.len() != y.len() || x.len() != weights.len() {
        return None;
    }
    let usable: Vec<(f64, f64, f64)> = x
        .iter()
        .zip(y)
        .zip(weights)
        .map(|((&x, &y), &w)| (x, y, w))
        .filter(|(x, y, w)| x.is_finite() && y.is_finite() && w.is_finite() && *w > 0.0)
        .collect();
    let total: f64 = usable.iter().map(|(_, _, w)| w).sum();
    if usable.is_empty() || total <= 0.0 {
        return None;
    }
    let mean_x = usable.iter().map(|(x, _, w)| w * x).sum::<f64>() / total;
    let mean_y = usable.iter().map(|(_, y, w)| w * y).sum::<f64>() / total;
    let sxx: f64 = usable.iter().map(|(x, _, w)| w * (x - mean_x).powi(2)).sum();
    let sxy: f64 = usable
        .iter()
        .map(|(x, y, w)| w * (x - mean_x) * (y - mean_y))
        .sum();
    let slope = if sxx > f64::EPSILON * total { sxy / sxx } else { 0.0 };
    Some(LinearFit {
        intercept: mean_y - slope * mean_x,
        slope,
        observations: usable.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn recovers_a_noiseless_line() {
        let mut r = KalmanRecursiveRegression::new(2).unwrap();
        for i in 0..200 {
            let x = f64::from(i % 17);
            r.add_observation(1.0, 3.0 + 2.0 * x, &[1.0, x]).unwrap();
        }
        assert!((r.beta()[0] - 3.0).abs() < 1e-3, "{:?}", r.beta());
        assert!((r.beta()[1] - 2.0).abs() < 1e-3, "{:?}", r.beta());
        assert_eq!(r.observations(), 200);
        assert!(r.trace() < 2.0 * INITIAL_COVARIANCE);
    }

    #[test]
    fn rejects_bad_observations_without_moving() {
        let mut r = KalmanRecursiveRegression::new(2).unwrap();
        assert_eq!(
            r.add_observation(1.0, 1.0, &[1.0]),
            Err(PredictError::DimensionMismatch { expected: 2, found: 1 })
        );
        assert_eq!(
            r.add_observation(0.0, 1.0, &[1.0, 1.0]),
            Err(PredictError::InvalidObservation)
        );
        assert_eq!(
            r.add_observation(1.0, f64::NAN, &[1.0, 1.0]),
            Err(PredictError::InvalidObservation)
        );
        assert_eq!(r.beta(), &[0.0, 0.0]);
        assert_eq!(r.observations(), 0);
        assert_eq!(KalmanRecursiveRegression::new(0).err(), Some(PredictError::ZeroDimension));
    }

    #[test]
    fn low_weight_moves_the_fit_less() {
        let mut heavy = KalmanRecursiveRegression::with_beta(vec![10.0]).unwrap();
        let mut light = heavy.clone();
        heavy.set_noise_variance(1e6);
        light.set_noise_variance(1e6);
        heavy.add_observation(1.0, 0.0, &[1.0]).unwrap();
        light.add_observation(0.01, 0.0, &[1.0]).unwrap();
        assert!(light.beta()[0] > heavy.beta()[0]);
    }

    #[test]
    fn residual_is_measured_before_the_update() {
        let mut r = KalmanRecursiveRegression::with_beta(vec![4.0]).unwrap();
        assert_eq!(r.add_observation(1.0, 10.0, &[1.0]).unwrap(), 6.0);
        assert_eq!(r.predict(&[1.0, 2.0]), None);
    }

    #[test]
    fn covariance_stays_symmetric() {
        let mut r = KalmanRecursiveRegression::new(3).unwrap();
        for i in 0..50 {
            let a = f64::from(i);
            r.add_observation(0.5, a * 0.3, &[1.0, a, (a * 0.7).sin()]).unwrap();
        }
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(r.covariance(i, j), r.covariance(j, i));
            }
        }
    }

    #[test]
    fn ols_fits_and_skips_zero_weight() {
        let fit = weighted_ols(&[1.0, 2.0, 3.0, 100.0], &[3.0, 5.0, 7.0, 0.0], &[1.0, 1.0, 1.0, 0.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert_eq!(fit.observations, 3);
        assert!((fit.predict(4.0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn ols_with_constant_x_is_the_weighted_mean() {
        let fit = weighted_ols(&[2.0, 2.0], &[10.0, 20.0], &[3.0, 1.0]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert!((fit.intercept - 12.5).abs() < 1e-12);
        assert_eq!(weighted_ols(&[1.0], &[1.0], &[0.0]), None);
        assert_eq!(weighted_ols(&[1.0, 2.0], &[1.0], &[1.0]), None);
    }

    proptest! {
        #[test]
        fn kalman_recovers_random_lines(a in -100.0f64..100.0, b in -10.0f64..10.0) {
            let mut r = KalmanRecursiveRegression::new(2).unwrap();
            for i in 0..100 {
                let x = f64::from(i % 13);
                r.add_observation(1.0, a + b * x, &[1.0, x]).unwrap();
            }
            prop_assert!((r.beta()[0] - a).abs() < 1e-2);
            prop_assert!((r.beta()[1] - b).abs() < 1e-2);
        }

        #[test]
        fn ols_matches_exact_lines(a in -100.0f64..100.0, b in -10.0f64..10.0) {
            let x: Vec<f64> = (0..20).map(f64::from).collect();
            let y: Vec<f64> = x.iter().map(|x| a + b * x).collect();
            let fit = weighted_ols(&x, &y, &[1.0; 20]).unwrap();
            prop_assert!((fit.slope - b).abs() < 1e-6);
            prop_assert!((fit.intercept - a).abs() < 1e-6);
        }
    }
}
