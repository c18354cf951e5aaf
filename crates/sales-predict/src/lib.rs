#![deny(warnings)]

//! Online-learning sale price predictors.
//!
//! Every predictor implements [`sales_dept::SalesPredictor`] and can be
//! installed on a department with `SalesDepartment::set_predictor`. The
//! regression engine they share lives in [`regression`] and [`smoothing`].
//! [`PredictorSpec`] describes a predictor in YAML and builds it.

pub mod error;
pub mod fixed;
pub mod pricing;
pub mod recursive;
pub mod regression;
pub mod shock;
pub mod smoothing;
pub mod spec;
pub mod switching;

pub use error::PredictError;
pub use fixed::FixedDecrementPredictor;
pub use pricing::PricingSalesPredictor;
pub use recursive::{RecursiveConfig, RecursiveSalesPredictor};
pub use regression::{weighted_ols, KalmanRecursiveRegression, LinearFit};
pub use shock::{AroundShockConfig, AroundShockSalesPredictor};
pub use smoothing::{ExponentialFilter, MovingAverage};
pub use spec::PredictorSpec;
pub use switching::{SwitchingConfig, SwitchingSalesPredictor};
