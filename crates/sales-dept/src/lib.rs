#![deny(warnings)]

//! Sales department engine.
//!
//! A [`SalesDepartment`] sells one firm's goods on one market. It quotes on
//! order-book markets and peddles directly to buyers elsewhere, settles
//! trades, keeps daily observations and a weekly rollup, and owns a
//! pluggable [`SalesPredictor`] that forecasts sale prices.
//!
//! The market, the firm, buyer search, ask pricing and the simulation clock
//! are collaborators described by the traits in this crate; the department
//! borrows them per call through a [`SalesContext`].

pub mod agents;
pub mod data;
pub mod department;
pub mod error;
pub mod listener;
pub mod market;
pub mod predictor;
pub mod pricing;
pub mod schedule;
pub mod stats;

#[cfg(any(test, feature = "test-support"))]
pub mod testkit;

pub use agents::{Buyer, BuyerSearch, Firm};
pub use data::{DataError, DataStorage, SalesDataType};
pub use department::{peddle_price, PeddleOutcome, SalesContext, SalesDepartment};
pub use error::SalesError;
pub use listener::{ListenerId, SalesListener};
pub use market::{Market, Submission};
pub use predictor::{MemorySalesPredictor, SalesPredictor};
pub use pricing::AskPricing;
pub use schedule::{SalesAction, SalesJob, Scheduler};
pub use stats::{RollingWindow, SalesStatistics, WeeklyReport};
