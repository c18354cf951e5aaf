//! Scenario files: everything needed to set up a run, as YAML.

use crate::customer::CustomerConfig;
use crate::pricing::PricingSpec;
use chrono::NaiveDate;
use sales_core::{Price, SalesConfig, ValidationError};
use sales_dept::SalesError;
use sales_predict::{PredictError, PredictorSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors from loading or validating a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("cannot read scenario {path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        source: std::io::Error,
    },
    /// The YAML did not describe a scenario.
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A scenario value is out of range.
    #[error("invalid scenario: {0}")]
    Invalid(String),
    /// Sales settings were rejected.
    #[error(transparent)]
    Config(#[from] ValidationError),
    /// The predictor could not be built.
    #[error(transparent)]
    Predictor(#[from] PredictError),
    /// The department refused the setup.
    #[error(transparent)]
    Sales(#[from] SalesError),
}

/// Which market the firm sells into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    /// Quotes rest on a book and customers bid.
    #[default]
    OrderBook,
    /// No quotes; the department peddles to customers.
    Peddling,
}

/// From `day` on, the plant produces `daily` units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionChange {
    pub day: u32,
    pub daily: u32,
}

/// Plant settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    /// Units produced every day.
    pub daily: u32,
    pub unit_cost: Price,
    /// Scheduled production shocks.
    pub changes: Vec<ProductionChange>,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            daily: 10,
            unit_cost: 30,
            changes: Vec::new(),
        }
    }
}

impl ProductionConfig {
    /// Daily production in effect on `day`.
    pub fn daily_on(&self, day: u32) -> u32 {
        self.changes
            .iter()
            .filter(|c| c.day <= day)
            .max_by_key(|c| c.day)
            .map_or(self.daily, |c| c.daily)
    }
}

/// A full run description.
///
/// Example:
///   name: beef
///   start_date: 2024-01-01
///   days: 70
///   market: peddling
///   customers: { count: 20, min_reservation: 40, max_reservation: 120 }
///   production: { daily: 10, unit_cost: 30 }
///   pricing: { kind: markup, markup: "0.5" }
///   predictor: { kind: recursive, burn_in: 30 }
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub name: String,
    pub good_type: String,
    /// Calendar date of day 0, for reporting.
    pub start_date: NaiveDate,
    pub days: u32,
    pub market: MarketKind,
    pub customers: CustomerConfig,
    pub production: ProductionConfig,
    pub pricing: PricingSpec,
    pub sales: SalesConfig,
    pub predictor: PredictorSpec,
    /// Buyers sampled per peddling attempt.
    pub search_sample: usize,
    /// Seed for drawing customers and sampling buyers.
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            good_type: "beef".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            days: 70,
            market: MarketKind::default(),
            customers: CustomerConfig::default(),
            production: ProductionConfig::default(),
            pricing: PricingSpec::default(),
            sales: SalesConfig::default(),
            predictor: PredictorSpec::default(),
            search_sample: 5,
            seed: 7,
        }
    }
}

impl ScenarioConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = serde_yaml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.good_type.trim().is_empty() {
            return Err(ScenarioError::Invalid("good_type is empty".into()));
        }
        if self.customers.min_reservation < 0 || self.customers.max_reservation < 0 {
            return Err(ScenarioError::Invalid("reservation prices must be non-negative".into()));
        }
        if self.customers.min_reservation > self.customers.max_reservation {
            return Err(ScenarioError::Invalid(
                "min_reservation is above max_reservation".into(),
            ));
        }
        if self.production.unit_cost < 0 {
            return Err(ScenarioError::Invalid("unit_cost must be non-negative".into()));
        }
        if self.search_sample == 0 {
            return Err(ScenarioError::Invalid("search_sample must be positive".into()));
        }
        self.sales.validate()?;
        self.predictor.build()?;
        Ok(())
    }

    /// Calendar date of simulated `day`.
    pub fn date_of(&self, day: u32) -> NaiveDate {
        self.start_date + chrono::Duration::days(i64::from(day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sales_predict::RecursiveConfig;

    #[test]
    fn parses_a_full_scenario() {
        let yaml = r#"
name: shock
start_date: 2024-03-01
days: 28
market: peddling
customers: { count: 5, min_reservation: 50, max_reservation: 60 }
production:
  daily: 4
  unit_cost: 20
  changes: [{ day: 14, daily: 6 }]
pricing: { kind: markup, markup: "0.25" }
sales: { memory_length: 3, retry: { kind: never } }
predictor: { kind: recursive, burn_in: 10 }
"#;
        let s = ScenarioConfig::from_yaml(yaml).unwrap();
        assert_eq!(s.market, MarketKind::Peddling);
        assert_eq!(s.customers.count, 5);
        assert_eq!(s.customers.daily_demand, 1);
        assert_eq!(s.production.daily_on(13), 4);
        assert_eq!(s.production.daily_on(14), 6);
        assert_eq!(s.pricing, PricingSpec::Markup { markup: Decimal::new(25, 2) });
        assert_eq!(s.sales.memory_length, 3);
        assert_eq!(
            s.predictor,
            PredictorSpec::Recursive(RecursiveConfig {
                burn_in: 10,
                ..RecursiveConfig::default()
            })
        );
        assert_eq!(s.date_of(1), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn empty_document_is_the_default_scenario() {
        let s = ScenarioConfig::from_yaml("{}").unwrap();
        assert_eq!(s, ScenarioConfig::default());
    }

    #[test]
    fn rejects_inverted_reservation_range() {
        let err = ScenarioConfig::from_yaml("customers: { min_reservation: 90, max_reservation: 10 }").unwrap_err();
        assert!(matches!(err, ScenarioError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_sales_and_predictor_settings() {
        let err = ScenarioConfig::from_yaml("sales: { memory_length: 0 }").unwrap_err();
        assert!(matches!(err, ScenarioError::Config(_)));
        let err = ScenarioConfig::from_yaml("predictor: { kind: switching, models: [] }").unwrap_err();
        assert!(matches!(err, ScenarioError::Predictor(PredictError::NoModels)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ScenarioConfig::load(Path::new("/nonexistent/scenario.yaml")).unwrap_err();
        assert!(matches!(err, ScenarioError::Io { .. }));
    }
}
