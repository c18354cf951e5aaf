//! The firm that owns the inventory and the buyers the department talks to.

use crate::market::Market;
use sales_core::{AgentId, Good, GoodId, GoodType, Price, TradeResult};

/// The firm a department sells for.
pub trait Firm {
    /// Agent id of the firm.
    fn id(&self) -> AgentId;
    /// False once the firm has shut down.
    fn is_active(&self) -> bool {
        true
    }
    /// Whether the firm currently owns `good`.
    fn has(&self, good: GoodId) -> bool;
    /// Hand `good` over to a buyer and collect `price`. Returns false if the
    /// firm did not own it.
    fn deliver(&mut self, good: GoodId, price: Price) -> bool;
    /// Workers currently producing goods of this type.
    fn workers_producing(&self, _good_type: &GoodType) -> u32 {
        0
    }
}

/// A potential buyer.
pub trait Buyer {
    /// Agent id of the buyer.
    fn id(&self) -> AgentId;
    /// The most this buyer would pay for `good`, if anything.
    fn maximum_offer(&self, good: &Good) -> Option<Price>;
}

/// Strategy for finding buyers when peddling.
pub trait BuyerSearch {
    /// Pick the most promising buyer among those the market knows about.
    fn best_in_sample_buyer<'m>(&mut self, market: &'m dyn Market) -> Option<&'m dyn Buyer>;
    /// The last trade with `buyer` went through.
    fn react_to_success(&mut self, buyer: AgentId, result: TradeResult);
    /// The last trade with `buyer` failed.
    fn react_to_failure(&mut self, buyer: AgentId, result: TradeResult);
    /// Stop all activity.
    fn turn_off(&mut self) {}
}
