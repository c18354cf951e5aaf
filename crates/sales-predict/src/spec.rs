//! Predictor selection as plain data, loadable from scenario files.

use crate::error::PredictError;
use crate::fixed::FixedDecrementPredictor;
use crate::pricing::PricingSalesPredictor;
use crate::recursive::{RecursiveConfig, RecursiveSalesPredictor};
use crate::shock::{AroundShockConfig, AroundShockSalesPredictor};
use crate::switching::{SwitchingConfig, SwitchingSalesPredictor};
use sales_dept::{MemorySalesPredictor, SalesPredictor};
use serde::{Deserialize, Serialize};

/// Which sales predictor a department runs, and its parameters.
///
/// Example:
///   kind: recursive
///   price_lags: 1
///   burn_in: 200
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictorSpec {
    /// Last closing price, else the market average.
    #[default]
    Memory,
    /// Last closing price moved by `delta` per unit of production change.
    FixedDecrement { delta: f64 },
    /// The department's own ask on a hypothetical good.
    Pricing,
    /// Online price regression with burn-in.
    Recursive(RecursiveConfig),
    /// Trailing-window price response estimate.
    AroundShock(AroundShockConfig),
    /// Several recursive models, best trained one answers.
    Switching(SwitchingConfig),
}

impl PredictorSpec {
    /// Parse a spec from YAML.
    pub fn from_yaml(text: &str) -> Result<Self, PredictError> {
        serde_yaml::from_str(text).map_err(|e| PredictError::Parse(e.to_string()))
    }

    /// Build a fresh predictor.
    pub fn build(&self) -> Result<Box<dyn SalesPredictor>, PredictError> {
        Ok(match self {
            PredictorSpec::Memory => Box::new(MemorySalesPredictor),
            PredictorSpec::FixedDecrement { delta } => {
                if !delta.is_finite() {
                    return Err(PredictError::InvalidDelta(*delta));
                }
                Box::new(FixedDecrementPredictor::new(*delta))
            }
            PredictorSpec::Pricing => Box::new(PricingSalesPredictor),
            PredictorSpec::Recursive(config) => Box::new(RecursiveSalesPredictor::new(config.clone())?),
            PredictorSpec::AroundShock(config) => Box::new(AroundShockSalesPredictor::new(config.clone())?),
            PredictorSpec::Switching(config) => Box::new(SwitchingSalesPredictor::new(config.clone())?),
        })
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            PredictorSpec::Memory => "memory",
            PredictorSpec::FixedDecrement { .. } => "fixed_decrement",
            PredictorSpec::Pricing => "pricing",
            PredictorSpec::Recursive(_) => "recursive",
            PredictorSpec::AroundShock(_) => "around_shock",
            PredictorSpec::Switching(_) => "switching",
        }
    }
}
