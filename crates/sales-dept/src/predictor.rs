//! Sale price forecasting.

use crate::department::SalesDepartment;
use crate::market::Market;
use sales_core::Price;

/// Answers "what would a unit sell for if production changed by `step`".
///
/// A department owns exactly one predictor. When it is replaced the old one
/// is turned off and receives no further observations.
pub trait SalesPredictor {
    /// Expected price after producing `step` more units a day.
    fn predict_after_increasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        expected_cost: Price,
        step: u32,
    ) -> Option<Price>;

    /// Expected price after producing `step` fewer units a day.
    fn predict_after_decreasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        expected_cost: Price,
        step: u32,
    ) -> Option<Price>;

    /// Expected price if production stays as it is.
    fn predict_unchanged(&mut self, department: &SalesDepartment, market: &dyn Market)
        -> Option<Price>;

    /// Whether the department should call [`SalesPredictor::observe`] daily.
    fn observes_daily(&self) -> bool {
        false
    }

    /// Learn from the department's data; called once a day before trading.
    fn observe(&mut self, _department: &SalesDepartment) {}

    /// Stop all activity.
    fn turn_off(&mut self);
}

/// Predicts the last realized price, whatever the production change.
///
/// Falls back to the market average when the department never sold.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemorySalesPredictor;

impl MemorySalesPredictor {
    fn remembered(department: &SalesDepartment, market: &dyn Market) -> Option<Price> {
        department
            .last_closing_price()
            .or_else(|| market.average_closing_price())
    }
}

impl SalesPredictor for MemorySalesPredictor {
    fn predict_after_increasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        _expected_cost: Price,
        _step: u32,
    ) -> Option<Price> {
        Self::remembered(department, market)
    }

    fn predict_after_decreasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        _expected_cost: Price,
        _step: u32,
    ) -> Option<Price> {
        Self::remembered(department, market)
    }

    fn predict_unchanged(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
    ) -> Option<Price> {
        Self::remembered(department, market)
    }

    fn turn_off(&mut self) {}
}
