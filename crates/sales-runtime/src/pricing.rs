//! Reference ask-pricing strategies.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sales_core::{Good, Price};
use sales_dept::AskPricing;
use serde::{Deserialize, Serialize};

/// Cost plus margin pricing.
///
/// Example:
/// assert_eq!(cost_plus(Decimal::new(100, 0), Decimal::new(25, 2)), Decimal::new(125, 0));
pub fn cost_plus(unit_cost: Decimal, margin: Decimal) -> Decimal {
    unit_cost * (Decimal::ONE + margin)
}

/// Ask = cost * (1 + markup), rounded half away from zero and never
/// negative.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkupPricing {
    markup: Decimal,
}

impl MarkupPricing {
    pub fn new(markup: Decimal) -> Self {
        Self { markup }
    }

    pub fn markup(&self) -> Decimal {
        self.markup
    }
}

impl AskPricing for MarkupPricing {
    fn price(&self, good: &Good) -> Price {
        cost_plus(Decimal::from(good.cost), self.markup)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(Price::MAX)
            .max(0)
    }
}

/// The same ask for every good.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedAskPricing {
    ask: Price,
}

impl FixedAskPricing {
    pub fn new(ask: Price) -> Self {
        Self { ask: ask.max(0) }
    }
}

impl AskPricing for FixedAskPricing {
    fn price(&self, _good: &Good) -> Price {
        self.ask
    }
}

/// Pricing strategy as scenario data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingSpec {
    /// Cost plus `markup` (a fraction, "0.5" is 50%).
    Markup { markup: Decimal },
    /// Fixed ask.
    Fixed { ask: Price },
}

impl Default for PricingSpec {
    fn default() -> Self {
        PricingSpec::Markup {
            markup: Decimal::new(5, 1),
        }
    }
}

impl PricingSpec {
    pub fn build(&self) -> Box<dyn AskPricing> {
        match self {
            PricingSpec::Markup { markup } => Box::new(MarkupPricing::new(*markup)),
            PricingSpec::Fixed { ask } => Box::new(FixedAskPricing::new(*ask)),
        }
    }
}
