//! Errors raised by the sales department.

use crate::data::DataError;
use sales_core::{DepartmentId, GoodId, GoodType, Price, ValidationError};
use thiserror::Error;

/// Caller misuse or corrupted sales state. Callers must treat these as fatal.
#[derive(Debug, Error, PartialEq)]
pub enum SalesError {
    /// The department was turned off.
    #[error("department {0:?} is turned off")]
    Inactive(DepartmentId),
    /// The good belongs to a different market.
    #[error("good {good:?} is of type {found}, department sells {expected}")]
    WrongGoodType {
        /// Offending good.
        good: GoodId,
        /// Type the department trades.
        expected: GoodType,
        /// Type of the good.
        found: GoodType,
    },
    /// The firm does not own the good.
    #[error("firm does not own good {0:?}")]
    NotOwned(GoodId),
    /// The firm still owns a good reported as sold.
    #[error("firm still owns good {0:?} after its sale")]
    StillOwned(GoodId),
    /// The good is already tasked for sale.
    #[error("good {0:?} is already being sold")]
    AlreadySelling(GoodId),
    /// The good is not tasked for sale.
    #[error("good {0:?} is not being sold")]
    NotSelling(GoodId),
    /// Prices are never negative.
    #[error("negative price {0}")]
    NegativePrice(Price),
    /// A buy quote was expected.
    #[error("expected a buy quote")]
    NotABuyQuote,
    /// A sell quote was expected.
    #[error("expected a sell quote")]
    NotASellQuote,
    /// The sell quote was issued by someone else.
    #[error("sell quote was not issued by department {0:?}")]
    ForeignQuote(DepartmentId),
    /// Trading against a quote with no good attached.
    #[error("sell quote does not reference a specific good")]
    NoSpecificGood,
    /// The bid does not reach the ask.
    #[error("bid {bid} is below ask {ask}")]
    PricesDoNotCross {
        /// Buyer's offer.
        bid: Price,
        /// Seller's ask.
        ask: Price,
    },
    /// Bookkeeping disagrees with itself.
    #[error("inconsistent sale state for good {good:?}: {detail}")]
    Inconsistent {
        /// Good whose records disagree.
        good: GoodId,
        /// What was wrong.
        detail: &'static str,
    },
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ValidationError),
    /// Observation storage misuse.
    #[error(transparent)]
    Data(#[from] DataError),
}
