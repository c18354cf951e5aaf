//! Online regression of price on its own lags and lagged quantity.
//!
//! Every day the predictor regresses the day's average closing price on an
//! intercept, the previous `price_lags` prices and `independent_lags` values
//! of the independent variable (outflow, or workers producing the good)
//! ending `time_delay` days back. Observations are weighted by the smoothed
//! supply gap so days spent far from equilibrium count less.
//!
//! To answer a query it runs the fitted model forward with the independent
//! variable moved by the proposed production change and reports where the
//! price settles.

use crate::error::PredictError;
use crate::regression::KalmanRecursiveRegression;
use crate::smoothing::ExponentialFilter;
use sales_core::Price;
use sales_dept::{DataStorage, Market, SalesDataType, SalesDepartment, SalesPredictor};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Observations weighted at or below this are skipped.
pub const MINIMUM_WEIGHT: f64 = 0.001;

/// Forward steps when the model has no price lags: one to absorb the old
/// lags, one with the new quantity.
const HORIZON_WITHOUT_PRICE_LAGS: usize = 2;

/// Shape and training parameters of a [`RecursiveSalesPredictor`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecursiveConfig {
    /// Lags of the price among the regressors.
    pub price_lags: usize,
    /// Lags of the independent variable among the regressors.
    pub independent_lags: usize,
    /// Days between a quantity change and its effect on price.
    pub time_delay: usize,
    /// Steps the model is simulated forward when predicting.
    pub horizon: usize,
    /// Valid observations needed before the model is trusted.
    pub burn_in: usize,
    /// Regress on workers producing the good instead of daily outflow.
    pub regress_on_workers: bool,
    /// Weight observations by the smoothed supply gap.
    pub weighted: bool,
}

impl Default for RecursiveConfig {
    fn default() -> Self {
        Self {
            price_lags: 0,
            independent_lags: 1,
            time_delay: 0,
            horizon: 100,
            burn_in: 500,
            regress_on_workers: false,
            weighted: true,
        }
    }
}

impl RecursiveConfig {
    pub fn validate(&self) -> Result<(), PredictError> {
        if self.independent_lags == 0 {
            return Err(PredictError::NoIndependentLags);
        }
        if self.horizon == 0 {
            return Err(PredictError::ZeroHorizon);
        }
        Ok(())
    }

    /// Number of regression coefficients.
    pub fn dimension(&self) -> usize {
        1 + self.price_lags + self.independent_lags
    }

    /// Days of history the oldest regressor reaches back.
    fn lookback(&self) -> usize {
        self.price_lags
            .max(self.independent_lags - 1 + self.time_delay)
    }

    fn effective_horizon(&self) -> usize {
        if self.price_lags == 0 {
            HORIZON_WITHOUT_PRICE_LAGS
        } else {
            self.horizon
        }
    }

    fn x_type(&self) -> SalesDataType {
        if self.regress_on_workers {
            SalesDataType::WorkersProducing
        } else {
            SalesDataType::Outflow
        }
    }
}

/// Gap-based observation weight, `2 / (1 + e^|gap|)`: 1 at equilibrium,
/// vanishing for large gaps.
pub fn gap_weight(smoothed_gap: f64) -> f64 {
    2.0 / (1.0 + smoothed_gap.abs().exp())
}

/// Recursive least-squares price model with burn-in.
#[derive(Clone, Debug)]
pub struct RecursiveSalesPredictor {
    config: RecursiveConfig,
    regression: KalmanRecursiveRegression,
    valid_observations: usize,
    last_learned_day: Option<u32>,
    active: bool,
}

impl RecursiveSalesPredictor {
    pub fn new(config: RecursiveConfig) -> Result<Self, PredictError> {
        config.validate()?;
        let mut beta = vec![0.0; config.dimension()];
        if config.price_lags > 0 {
            // start from "price persists"
            beta[1] = 1.0;
        }
        Ok(Self {
            regression: KalmanRecursiveRegression::with_beta(beta)?,
            config,
            valid_observations: 0,
            last_learned_day: None,
            active: true,
        })
    }

    pub fn config(&self) -> &RecursiveConfig {
        &self.config
    }

    /// Observations the regression accepted.
    pub fn valid_observations(&self) -> usize {
        self.valid_observations
    }

    /// True once burn-in is over.
    pub fn is_trained(&self) -> bool {
        self.valid_observations >= self.config.burn_in.max(1)
    }

    /// Intercept, price lags oldest to newest, independent lags oldest to
    /// newest.
    pub fn coefficients(&self) -> &[f64] {
        self.regression.beta()
    }

    /// Learn from the newest recorded day. Returns the one-step residual of
    /// the model before the update when the day was a valid observation.
    pub fn learn(&mut self, department: &SalesDepartment) -> Option<f64> {
        if !self.active || department.last_closing_price().is_none() {
            return None;
        }
        let data = department.data();
        let today = data.last_observed_day()?;
        if self.last_learned_day == Some(today) {
            return None;
        }
        if data.number_of_observations() <= self.config.lookback() {
            return None;
        }
        self.last_learned_day = Some(today);
        let today = i64::from(today);

        let price = data.latest(SalesDataType::AverageClosingPrice)?;
        if !is_valid(price) {
            return None;
        }
        let delay = self.config.time_delay as i64;
        let lags = self.config.independent_lags as i64;
        let x = data.between(self.config.x_type(), today - delay - lags + 1, today - delay)?;
        let prices = data.between(
            SalesDataType::AverageClosingPrice,
            today - self.config.price_lags as i64,
            today - 1,
        )?;
        if !x.iter().chain(prices).all(|v| is_valid(*v)) {
            return None;
        }

        let weight = if self.config.weighted {
            let window = self
                .config
                .price_lags
                .max(self.config.independent_lags + self.config.time_delay) as i64;
            let first = (today - window + 1).max(i64::from(data.starting_day()?));
            let weight = gap_weight(smoothed_gap(data, first, today)?);
            if weight <= MINIMUM_WEIGHT {
                debug!(weight, "observation skipped, supply gap too wide");
                return None;
            }
            weight
        } else {
            1.0
        };

        let mut observation = Vec::with_capacity(self.config.dimension());
        observation.push(1.0);
        observation.extend_from_slice(prices);
        observation.extend_from_slice(x);
        match self.regression.add_observation(weight, price, &observation) {
            Ok(residual) => {
                self.valid_observations += 1;
                Some(residual)
            }
            Err(error) => {
                warn!(%error, "regression rejected observation");
                None
            }
        }
    }

    /// Fitted model's price after moving the independent variable by
    /// `step`, ignoring burn-in. `None` without enough history.
    pub fn model_price(&self, department: &SalesDepartment, step: i64) -> Option<Price> {
        let data = department.data();
        let today = i64::from(data.last_observed_day()?);
        let delay = self.config.time_delay as i64;
        let lags = self.config.independent_lags as i64;
        let x_type = self.config.x_type();

        let prices = data.between(
            SalesDataType::AverageClosingPrice,
            today - self.config.price_lags as i64 + 1,
            today,
        )?;
        let old_x = data.between(x_type, today - lags - delay + 1, today - delay)?;
        let coming_x = data.between(x_type, today - delay + 1, today)?;
        let latest_x = data.latest(x_type)?;
        let step = if self.config.regress_on_workers {
            step.signum()
        } else {
            step
        };
        if !prices.iter().chain(old_x).chain(coming_x).all(|v| v.is_finite()) || !latest_x.is_finite() {
            return None;
        }

        let price = simulate_future_price(
            prices,
            old_x,
            coming_x,
            latest_x + step as f64,
            self.coefficients(),
            self.config.effective_horizon(),
        );
        price
            .is_finite()
            .then(|| (price.round() as Price).max(0))
    }

    /// Model price once trained, otherwise the last realized price or the
    /// market average.
    pub fn predict_price(&self, department: &SalesDepartment, market: &dyn Market, step: i64) -> Option<Price> {
        let fallback = || {
            department
                .last_closing_price()
                .or_else(|| market.average_closing_price())
        };
        if !self.active || !self.is_trained() {
            return fallback();
        }
        self.model_price(department, step).or_else(fallback)
    }
}

fn is_valid(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn smoothed_gap(data: &DataStorage<SalesDataType>, first: i64, last: i64) -> Option<f64> {
    let gaps = data.between(SalesDataType::SupplyGap, first, last)?;
    if gaps.iter().any(|g| !g.is_finite()) {
        return None;
    }
    let mut filter = ExponentialFilter::with_span(gaps.len().max(1)).ok()?;
    for gap in gaps {
        filter.add(*gap);
    }
    Some(filter.value().unwrap_or(0.0))
}

/// Run the fitted model `horizon` steps forward.
///
/// `prices` are the newest price lags, `old_x` the independent lags the next
/// price depends on, `coming_x` values already observed but not yet felt
/// through the delay, and `future_x` the level the independent variable
/// holds from then on. Coefficients are ordered as in the regression.
pub fn simulate_future_price(
    prices: &[f64],
    old_x: &[f64],
    coming_x: &[f64],
    future_x: f64,
    coefficients: &[f64],
    horizon: usize,
) -> f64 {
    let mut prices: VecDeque<f64> = prices.iter().copied().collect();
    let mut simulated_x: VecDeque<f64> = old_x.iter().copied().collect();
    let mut coming_x: VecDeque<f64> = coming_x.iter().copied().collect();
    let mut price = coefficients.first().copied().unwrap_or(0.0);
    for _ in 0..horizon {
        let lags = prices.iter().chain(simulated_x.iter());
        price = coefficients.first().copied().unwrap_or(0.0)
            + coefficients
                .iter()
                .skip(1)
                .zip(lags)
                .map(|(c, v)| c * v)
                .sum::<f64>();
        if !prices.is_empty() {
            prices.pop_front();
            prices.push_back(price);
        }
        simulated_x.push_back(coming_x.pop_front().unwrap_or(future_x));
        simulated_x.pop_front();
    }
    price
}

impl SalesPredictor for RecursiveSalesPredictor {
    fn predict_after_increasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        _expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        self.predict_price(department, market, i64::from(step))
    }

    fn predict_after_decreasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        _expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        self.predict_price(department, market, -i64::from(step))
    }

    fn predict_unchanged(&mut self, department: &SalesDepartment, market: &dyn Market) -> Option<Price> {
        self.predict_price(department, market, 0)
    }

    fn observes_daily(&self) -> bool {
        self.active
    }

    fn observe(&mut self, department: &SalesDepartment) {
        self.learn(department);
    }

    fn turn_off(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sales_dept::testkit::*;

    fn short_burn_in(burn_in: usize) -> RecursiveConfig {
        RecursiveConfig {
            burn_in,
            ..RecursiveConfig::default()
        }
    }

    /// One good sold per day at an ask of 50 to a buyer whose offer cycles.
    fn trade_day(h: &mut Harness, dept: &mut SalesDepartment, day: u64) {
        h.market.buyers[0].offer = Some(50 + (day % 7) as Price * 4);
        h.firm.give(day);
        dept.sell_this(beef(day, 10), &mut h.ctx()).unwrap();
        h.run_today(dept).unwrap();
    }

    #[test]
    fn falls_back_until_burn_in_then_uses_the_model() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(50))]);
        let mut dept = h.department(FixedPricing::fixed(50));
        let mut p = RecursiveSalesPredictor::new(short_burn_in(100)).unwrap();
        for day in 0..120u64 {
            trade_day(&mut h, &mut dept, day);
            p.observe(&dept);
            let valid = p.valid_observations();
            assert_eq!(valid as u64, day + 1);
            let predicted = p.predict_price(&dept, &h.market, 1);
            if valid < 100 {
                assert!(!p.is_trained());
                assert_eq!(predicted, dept.last_closing_price());
            } else {
                assert!(p.is_trained());
                assert_eq!(predicted, p.model_price(&dept, 1));
                assert!(predicted.unwrap() >= 0);
            }
            h.scheduler.advance();
        }
    }

    #[test]
    fn never_traded_falls_back_to_market_average() {
        let mut h = Harness::quoting();
        h.market.average = Some(42);
        let dept = h.department(FixedPricing::markup(10));
        let mut p = RecursiveSalesPredictor::new(short_burn_in(1)).unwrap();
        p.observe(&dept);
        assert_eq!(p.valid_observations(), 0);
        assert_eq!(p.predict_unchanged(&dept, &h.market), Some(42));
    }

    #[test]
    fn same_day_is_learned_once() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(50))]);
        let mut dept = h.department(FixedPricing::fixed(50));
        let mut p = RecursiveSalesPredictor::new(short_burn_in(1)).unwrap();
        trade_day(&mut h, &mut dept, 0);
        p.observe(&dept);
        p.observe(&dept);
        assert_eq!(p.valid_observations(), 1);
    }

    #[test]
    fn days_without_sales_are_skipped() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(50))]);
        let mut dept = h.department(FixedPricing::fixed(50));
        let mut p = RecursiveSalesPredictor::new(short_burn_in(1)).unwrap();
        trade_day(&mut h, &mut dept, 0);
        p.observe(&dept);
        h.scheduler.advance();
        // nothing offered today: the average closing price is NaN
        h.run_today(&mut dept).unwrap();
        p.observe(&dept);
        assert_eq!(p.valid_observations(), 1);
    }

    #[test]
    fn wide_supply_gap_skips_the_observation() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(50))]);
        let mut dept = h.department(FixedPricing::fixed(50).with_gap(50.0));
        let mut p = RecursiveSalesPredictor::new(short_burn_in(1)).unwrap();
        trade_day(&mut h, &mut dept, 0);
        p.observe(&dept);
        assert_eq!(p.valid_observations(), 0);

        let unweighted = RecursiveConfig {
            weighted: false,
            ..short_burn_in(1)
        };
        let mut q = RecursiveSalesPredictor::new(unweighted).unwrap();
        q.observe(&dept);
        assert_eq!(q.valid_observations(), 1);
    }

    #[test]
    fn turned_off_predictor_stops_learning() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(50))]);
        let mut dept = h.department(FixedPricing::fixed(50));
        let mut p = RecursiveSalesPredictor::new(short_burn_in(1)).unwrap();
        p.turn_off();
        assert!(!p.observes_daily());
        trade_day(&mut h, &mut dept, 0);
        p.observe(&dept);
        assert_eq!(p.valid_observations(), 0);
    }

    #[test]
    fn installed_predictor_observes_through_the_department() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(50))]);
        let mut dept = h.department(FixedPricing::fixed(50));
        let p = RecursiveSalesPredictor::new(short_burn_in(3)).unwrap();
        dept.set_predictor(Box::new(p), &mut h.scheduler);
        for day in 0..10u64 {
            trade_day(&mut h, &mut dept, day);
            h.scheduler.advance();
        }
        let predicted = dept.predict_sale_price_after_increasing(&h.market, 10, 1);
        assert!(predicted.is_some_and(|p| p >= 0));
    }

    #[test]
    fn simulation_converges_to_the_fixed_point() {
        // p = 10 + 0.5 p - x with x = 3 settles at 14
        let price = simulate_future_price(&[20.0], &[2.0], &[], 3.0, &[10.0, 0.5, -1.0], 100);
        assert!((price - 14.0).abs() < 1e-9);
    }

    #[test]
    fn simulation_without_price_lags_takes_two_steps() {
        let price = simulate_future_price(&[], &[1.0], &[], 2.0, &[100.0, -5.0], 2);
        assert_eq!(price, 90.0);
    }

    #[test]
    fn delayed_quantities_arrive_before_the_new_level() {
        // one day delay: the already observed x = 4 is felt first
        let price = simulate_future_price(&[], &[1.0], &[4.0], 9.0, &[0.0, 1.0], 2);
        assert_eq!(price, 4.0);
        let price = simulate_future_price(&[], &[1.0], &[4.0], 9.0, &[0.0, 1.0], 3);
        assert_eq!(price, 9.0);
    }

    #[test]
    fn config_validation() {
        let bad = RecursiveConfig {
            independent_lags: 0,
            ..RecursiveConfig::default()
        };
        assert_eq!(
            RecursiveSalesPredictor::new(bad).err(),
            Some(PredictError::NoIndependentLags)
        );
        let lagged = RecursiveConfig {
            price_lags: 2,
            ..RecursiveConfig::default()
        };
        let p = RecursiveSalesPredictor::new(lagged).unwrap();
        assert_eq!(p.coefficients(), &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn gap_weight_is_one_at_equilibrium() {
        assert_eq!(gap_weight(0.0), 1.0);
        assert!(gap_weight(10.0) < 0.001);
        assert_eq!(gap_weight(-2.0), gap_weight(2.0));
    }
}
