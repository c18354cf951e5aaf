//! Constant per-unit price response around a delegate's prediction.

use sales_core::Price;
use sales_dept::{Market, MemorySalesPredictor, SalesDepartment, SalesPredictor};

/// Moves a base prediction by `delta` per unit of production change:
/// producing more lowers the price, producing less raises it.
pub struct FixedDecrementPredictor {
    delta: f64,
    base: Box<dyn SalesPredictor>,
}

impl FixedDecrementPredictor {
    /// Delta around the department's last realized price.
    pub fn new(delta: f64) -> Self {
        Self::with_base(delta, Box::new(MemorySalesPredictor))
    }

    pub fn with_base(delta: f64, base: Box<dyn SalesPredictor>) -> Self {
        Self {
            delta: if delta.is_finite() { delta } else { 0.0 },
            base,
        }
    }

    /// Price change per unit.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Non-finite deltas are ignored.
    pub fn set_delta(&mut self, delta: f64) {
        if delta.is_finite() {
            self.delta = delta;
        }
    }

    fn shifted(base: Price, change: f64) -> Price {
        let shifted = (base as f64 + change).round();
        if shifted.is_finite() {
            (shifted as Price).max(0)
        } else {
            base
        }
    }
}

impl SalesPredictor for FixedDecrementPredictor {
    fn predict_after_increasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        _expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        let base = self.base.predict_unchanged(department, market)?;
        Some(Self::shifted(base, -self.delta * f64::from(step)))
    }

    fn predict_after_decreasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        _expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        let base = self.base.predict_unchanged(department, market)?;
        Some(Self::shifted(base, self.delta * f64::from(step)))
    }

    fn predict_unchanged(&mut self, department: &SalesDepartment, market: &dyn Market) -> Option<Price> {
        self.base.predict_unchanged(department, market)
    }

    fn observes_daily(&self) -> bool {
        self.base.observes_daily()
    }

    fn observe(&mut self, department: &SalesDepartment) {
        self.base.observe(department);
    }

    fn turn_off(&mut self) {
        self.base.turn_off();
    }
}
