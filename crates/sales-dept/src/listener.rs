//! Observers of department activity. Used for reporting, never for control flow.

use sales_core::{AgentId, DepartmentId, Good, Price};

/// Handle returned on registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Receives sales events in registration order.
pub trait SalesListener {
    /// A good was tasked for sale.
    fn sell_this_event(&mut self, _firm: AgentId, _department: DepartmentId, _good: &Good) {}
    /// A buyer who could afford the last price found nothing to buy.
    fn stock_out_event(&mut self, _firm: AgentId, _department: DepartmentId, _buyer: AgentId) {}
    /// A good was sold.
    fn good_sold_event(&mut self, _department: DepartmentId, _good: &Good, _price: Price) {}
}
