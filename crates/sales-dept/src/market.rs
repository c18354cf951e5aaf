//! The market a department sells into.

use crate::agents::{Buyer, Firm};
use sales_core::{AgentId, DepartmentId, Good, GoodType, Price, Quote, SellQuote, SellerRole, TradeResult};

/// Answer of the market to a new sell quote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    /// The quote rests on the book.
    Resting(SellQuote),
    /// The quote crossed a bid and the good was delivered right away.
    Filled {
        /// Settled price.
        price: Price,
        /// Who bought it.
        buyer: AgentId,
    },
}

/// A single-good market.
pub trait Market {
    /// The good traded here.
    fn good_type(&self) -> &GoodType;
    /// Whether sellers may quote.
    fn seller_role(&self) -> SellerRole;
    /// Announce a new seller.
    fn register_seller(&mut self, seller: AgentId);
    /// Offer `good` at `price`. On an immediate match the market delivers the
    /// good out of `seller`'s inventory before returning.
    fn submit_sell_quote(
        &mut self,
        seller: &mut dyn Firm,
        price: Price,
        good: &Good,
        originator: DepartmentId,
    ) -> Submission;
    /// Withdraw a resting quote. Returns false if it was not on the book.
    fn remove_sell_quote(&mut self, quote: &SellQuote) -> bool;
    /// Settle a trade, moving `good` from `seller` to `buyer`.
    fn trade(
        &mut self,
        seller: &mut dyn Firm,
        buyer: AgentId,
        good: &Good,
        price: Price,
        buyer_quote: &Quote,
        seller_quote: &Quote,
    ) -> TradeResult;
    /// Highest resting bid.
    fn best_buy_price(&self) -> Option<Price>;
    /// Lowest resting ask.
    fn best_sell_price(&self) -> Option<Price>;
    /// Whether traders may look at the best bid.
    fn is_best_buy_price_visible(&self) -> bool {
        true
    }
    /// Whether traders may look at the best ask.
    fn is_best_sale_price_visible(&self) -> bool {
        true
    }
    /// Price at which a crossing bid and ask settle.
    fn clearing_price(&self, ask: Price, _bid: Price) -> Price {
        ask
    }
    /// Market-wide average closing price of the last trading day.
    fn average_closing_price(&self) -> Option<Price>;
    /// Buyers known to the market.
    fn buyers(&self) -> Vec<&dyn Buyer>;
}
