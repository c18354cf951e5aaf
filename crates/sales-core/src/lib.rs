#![deny(warnings)]

//! Core domain models for the sales engine.
//!
//! This crate defines the serializable types shared by the sales department,
//! the predictors and the runtime: identifiers, goods, quotes, per-good sale
//! outcomes, trade results and the daily phase ordering. Configuration types
//! and their validation live in [`config`].

pub mod config;

pub use config::{RetryPolicy, SalesConfig, ValidationError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer money unit used for every ask, bid and cost.
pub type Price = i64;

/// Identifier of a trading agent (firm or customer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// Identifier of a single unit of inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoodId(pub u64);

impl GoodId {
    /// Reserved id for goods that only exist to probe prices.
    pub const HYPOTHETICAL: GoodId = GoodId(u64::MAX);
}

/// Identifier of a sales department (one per firm and market).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DepartmentId(pub u32);

/// Identifier assigned to a quote by the market that accepted it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub u64);

impl QuoteId {
    /// Id carried by quotes that were never placed on a book.
    pub const UNPLACED: QuoteId = QuoteId(0);
}

/// Kind of good traded on a market, e.g. "beef".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoodType(pub String);

impl GoodType {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>) -> Self {
        GoodType(name.into())
    }
}

impl fmt::Display for GoodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of inventory. Immutable once created; who owns it is tracked by
/// the owner's inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Good {
    /// Unique id.
    pub id: GoodId,
    /// What kind of good this is.
    pub good_type: GoodType,
    /// Last known acquisition (or production) cost.
    pub cost: Price,
}

impl Good {
    /// Create a good.
    pub fn new(id: GoodId, good_type: GoodType, cost: Price) -> Self {
        Self {
            id,
            good_type,
            cost,
        }
    }

    /// A good that exists only to ask "what would this sell for".
    pub fn hypothetical(good_type: GoodType, cost: Price) -> Self {
        Self::new(GoodId::HYPOTHETICAL, good_type, cost)
    }
}

/// A resting or ad-hoc offer to sell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellQuote {
    /// Book id, or [`QuoteId::UNPLACED`].
    pub id: QuoteId,
    /// Selling agent.
    pub seller: AgentId,
    /// Ask price.
    pub price: Price,
    /// The good offered; `None` for price-only quotes.
    pub good: Option<Good>,
    /// Department that issued the quote, if any.
    pub originator: Option<DepartmentId>,
}

/// An offer to buy one unit of a good type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyQuote {
    /// Book id, or [`QuoteId::UNPLACED`].
    pub id: QuoteId,
    /// Buying agent.
    pub buyer: AgentId,
    /// Bid price.
    pub price: Price,
    /// What the buyer wants.
    pub good_type: GoodType,
}

/// A priced offer, or the absence of one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quote {
    /// No offer; carries no price.
    Empty,
    /// Offer to sell.
    Sell(SellQuote),
    /// Offer to buy.
    Buy(BuyQuote),
}

impl Quote {
    /// Price of the offer, `None` for an empty quote.
    pub fn price(&self) -> Option<Price> {
        match self {
            Quote::Empty => None,
            Quote::Sell(q) => Some(q.price),
            Quote::Buy(q) => Some(q.price),
        }
    }

    /// True for [`Quote::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Quote::Empty)
    }

    /// The sell side, if this is a sell quote.
    pub fn as_sell(&self) -> Option<&SellQuote> {
        match self {
            Quote::Sell(q) => Some(q),
            _ => None,
        }
    }
}

/// Outcome of one good during the current accounting week.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleResult {
    /// A quote for the good is resting on the market.
    Quoted,
    /// The good was offered and not sold.
    Unsold,
    /// The good's quote was withdrawn for repricing.
    BeingUpdated,
    /// The good was sold.
    Sold {
        /// Realized sale price.
        price: Price,
        /// The good's cost before the sale.
        previous_cost: Price,
    },
}

impl SaleResult {
    /// True for [`SaleResult::Sold`].
    pub fn is_sold(&self) -> bool {
        matches!(self, SaleResult::Sold { .. })
    }
}

/// Result of a trade settlement attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeResult {
    /// The good changed hands at `price`.
    Success {
        /// Settled price.
        price: Price,
    },
    /// The buyer would not pay the asked price.
    PriceRejected,
    /// The seller no longer had the good.
    StockOut,
    /// The buyer could not afford the price.
    InsufficientFunds,
}

impl TradeResult {
    /// True for [`TradeResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, TradeResult::Success { .. })
    }
}

/// How sellers interact with a market.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellerRole {
    /// Sellers may leave resting quotes on a book.
    Quote,
    /// No book; sellers must find buyers themselves.
    NoQuote,
}

/// Phases of a simulated day, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Start of day.
    Dawn,
    /// Learning and bookkeeping before markets open.
    PrepareToTrade,
    /// Quoting, peddling and matching.
    Trade,
    /// Plants produce.
    Production,
    /// Reactions to the day's trades.
    AfterTrade,
    /// Strategy updates.
    Think,
    /// Price adjustments.
    AdjustPrices,
    /// End of day data gathering.
    Cleanup,
}

impl Phase {
    /// Every phase in execution order.
    pub const ALL: [Phase; 8] = [
        Phase::Dawn,
        Phase::PrepareToTrade,
        Phase::Trade,
        Phase::Production,
        Phase::AfterTrade,
        Phase::Think,
        Phase::AdjustPrices,
        Phase::Cleanup,
    ];

    /// Position of the phase within the day.
    pub fn index(self) -> usize {
        self as usize
    }
}
