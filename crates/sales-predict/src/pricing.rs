//! Predicts whatever the department's own ask pricing would charge.

use sales_core::Price;
use sales_dept::{Market, SalesDepartment, SalesPredictor};

/// Answers with the ask the pricing strategy would put on a hypothetical
/// good. Production changes are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct PricingSalesPredictor;

impl SalesPredictor for PricingSalesPredictor {
    fn predict_after_increasing(
        &mut self,
        department: &SalesDepartment,
        _market: &dyn Market,
        expected_cost: Price,
        _step: u32,
    ) -> Option<Price> {
        Some(department.hypothetical_sale_price(expected_cost))
    }

    fn predict_after_decreasing(
        &mut self,
        department: &SalesDepartment,
        _market: &dyn Market,
        expected_cost: Price,
        _step: u32,
    ) -> Option<Price> {
        Some(department.hypothetical_sale_price(expected_cost))
    }

    fn predict_unchanged(&mut self, department: &SalesDepartment, _market: &dyn Market) -> Option<Price> {
        Some(department.hypothetical_sale_price(department.last_closing_cost().unwrap_or(0)))
    }

    fn turn_off(&mut self) {}
}
