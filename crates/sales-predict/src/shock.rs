//! Learning the price response from recent days of trading.

use crate::error::PredictError;
use crate::fixed::FixedDecrementPredictor;
use crate::regression::weighted_ols;
use crate::smoothing::ExponentialFilter;
use sales_core::Price;
use sales_dept::{Market, SalesDataType, SalesDepartment, SalesPredictor};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters of an [`AroundShockSalesPredictor`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AroundShockConfig {
    /// Trailing recorded days fed to the regression.
    pub lookback_days: usize,
    /// Traded days needed before a slope is estimated.
    pub min_observations: usize,
    /// Weight of a new slope against the previous estimate.
    pub blend: f64,
}

impl Default for AroundShockConfig {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            min_observations: 6,
            blend: 0.5,
        }
    }
}

impl AroundShockConfig {
    pub fn validate(&self) -> Result<(), PredictError> {
        if self.lookback_days == 0 {
            return Err(PredictError::ZeroWindow);
        }
        if self.min_observations < 2 {
            return Err(PredictError::TooFewObservations(self.min_observations));
        }
        ExponentialFilter::new(self.blend).map(|_| ())
    }
}

/// Observation weight for this predictor, `1 / (1 + e^|gap|)`.
pub fn shock_weight(gap: f64) -> f64 {
    1.0 / (1.0 + gap.abs().exp())
}

/// Regresses average closing price on daily outflow over a trailing
/// window and uses the negated slope as the per-unit price delta of a
/// [`FixedDecrementPredictor`] around the last realized price.
pub struct AroundShockSalesPredictor {
    config: AroundShockConfig,
    decrement: FixedDecrementPredictor,
    slope: ExponentialFilter,
    last_window: Option<(i64, i64)>,
}

impl AroundShockSalesPredictor {
    pub fn new(config: AroundShockConfig) -> Result<Self, PredictError> {
        config.validate()?;
        Ok(Self {
            slope: ExponentialFilter::new(config.blend)?,
            config,
            decrement: FixedDecrementPredictor::new(0.0),
            last_window: None,
        })
    }

    /// Current price change per unit of production.
    pub fn delta(&self) -> f64 {
        self.decrement.delta()
    }

    /// Refit on the trailing window if it moved since the last fit.
    pub fn update_model(&mut self, department: &SalesDepartment) {
        let data = department.data();
        let (Some(start), Some(last)) = (data.starting_day(), data.last_observed_day()) else {
            return;
        };
        let (start, last) = (i64::from(start), i64::from(last));
        let window = ((last - self.config.lookback_days as i64 + 1).max(start), last);
        if self.last_window == Some(window) {
            return;
        }
        let (first, last) = window;
        let (Some(quantities), Some(prices), Some(gaps)) = (
            data.between(SalesDataType::Outflow, first, last),
            data.between(SalesDataType::AverageClosingPrice, first, last),
            data.between(SalesDataType::SupplyGap, first, last),
        ) else {
            return;
        };

        // days without trades carry no price information
        let weights: Vec<f64> = quantities
            .iter()
            .zip(prices)
            .zip(gaps)
            .map(|((q, p), g)| {
                if q.is_finite() && *q > 0.0 && p.is_finite() && *p >= 0.0 {
                    shock_weight(if g.is_finite() { *g } else { 0.0 })
                } else {
                    0.0
                }
            })
            .collect();
        if weights.iter().filter(|w| **w > 0.0).count() < self.config.min_observations {
            return;
        }
        let Some(fit) = weighted_ols(quantities, prices, &weights) else {
            return;
        };

        self.slope.add(-fit.slope);
        if let Some(delta) = self.slope.value() {
            self.decrement.set_delta(delta);
        }
        self.last_window = Some(window);
        debug!(
            department = department.id().0,
            slope = fit.slope,
            delta = self.decrement.delta(),
            "price response re-estimated"
        );
    }
}

impl SalesPredictor for AroundShockSalesPredictor {
    fn predict_after_increasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        self.update_model(department);
        self.decrement
            .predict_after_increasing(department, market, expected_cost, step)
    }

    fn predict_after_decreasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        self.update_model(department);
        self.decrement
            .predict_after_decreasing(department, market, expected_cost, step)
    }

    fn predict_unchanged(&mut self, department: &SalesDepartment, market: &dyn Market) -> Option<Price> {
        self.decrement.predict_unchanged(department, market)
    }

    fn turn_off(&mut self) {
        self.decrement.turn_off();
    }
}
