#![deny(warnings)]

//! Reference runtime for the sales engine.
//!
//! Provides the collaborators a [`sales_dept::SalesDepartment`] needs to
//! run on its own: a phase-ordered [`PhaseScheduler`], an order-book and a
//! peddling market populated by [`Customer`]s, a [`ProducerFirm`], ask
//! pricing, buyer search, and a [`Simulation`] that ties them together
//! from a YAML [`ScenarioConfig`] and reports weekly KPIs.

pub mod customer;
pub mod firm;
pub mod market;
pub mod pricing;
pub mod scenario;
pub mod scheduler;
pub mod search;
pub mod simulation;

pub use customer::{draw_customers, Customer, CustomerConfig};
pub use firm::ProducerFirm;
pub use market::{DailyMarket, DayTotals, OrderBookMarket, PeddlingMarket};
pub use pricing::{cost_plus, FixedAskPricing, MarkupPricing, PricingSpec};
pub use scenario::{MarketKind, ProductionChange, ProductionConfig, ScenarioConfig, ScenarioError};
pub use scheduler::PhaseScheduler;
pub use search::SampleBuyerSearch;
pub use simulation::{RunSummary, Simulation, WeekSummary};
