//! Ask-pricing strategies plug in here.

use sales_core::{Good, Price};

/// Decides the asking price of each good.
pub trait AskPricing {
    /// Ask price for `good`.
    fn price(&self, good: &Good) -> Price;
    /// The accounting week ended.
    fn week_end(&mut self) {}
    /// Stop all activity.
    fn turn_off(&mut self) {}
    /// Signed distance from the strategy's target; 0 when in equilibrium.
    fn estimate_supply_gap(&self) -> f64 {
        0.0
    }
}
