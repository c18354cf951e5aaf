//! Several recursive models trained side by side; the best trained one
//! answers.

use crate::error::PredictError;
use crate::recursive::{RecursiveConfig, RecursiveSalesPredictor};
use crate::smoothing::ExponentialFilter;
use sales_core::Price;
use sales_dept::{Market, SalesDepartment, SalesPredictor};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Weight of each new squared error in a model's running error.
const ERROR_SMOOTHING: f64 = 0.1;

/// Candidate models and the burn-in they share.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchingConfig {
    /// Candidate shapes; their own `burn_in` is replaced by the shared one.
    pub models: Vec<RecursiveConfig>,
    /// Valid observations a model needs before it may be selected.
    pub burn_in: usize,
}

impl Default for SwitchingConfig {
    fn default() -> Self {
        let shape = |price_lags, independent_lags, time_delay| RecursiveConfig {
            price_lags,
            independent_lags,
            time_delay,
            ..RecursiveConfig::default()
        };
        Self {
            models: vec![shape(0, 1, 0), shape(1, 1, 0), shape(0, 1, 1), shape(1, 2, 0)],
            burn_in: 500,
        }
    }
}

struct Candidate {
    model: RecursiveSalesPredictor,
    error: ExponentialFilter,
}

impl Candidate {
    fn smoothed_error(&self) -> f64 {
        self.error.value().unwrap_or(f64::INFINITY)
    }
}

/// Defers to the trained model with the most valid observations; ties go to
/// the lowest smoothed squared one-step error, then to the earliest model.
pub struct SwitchingSalesPredictor {
    candidates: Vec<Candidate>,
    burn_in: usize,
    selected: Option<usize>,
    active: bool,
}

impl SwitchingSalesPredictor {
    pub fn new(config: SwitchingConfig) -> Result<Self, PredictError> {
        if config.models.is_empty() {
            return Err(PredictError::NoModels);
        }
        let candidates = config
            .models
            .into_iter()
            .map(|shape| {
                Ok(Candidate {
                    model: RecursiveSalesPredictor::new(RecursiveConfig {
                        burn_in: config.burn_in,
                        ..shape
                    })?,
                    error: ExponentialFilter::new(ERROR_SMOOTHING)?,
                })
            })
            .collect::<Result<Vec<_>, PredictError>>()?;
        Ok(Self {
            candidates,
            burn_in: config.burn_in,
            selected: None,
            active: true,
        })
    }

    /// Index of the model currently answering, if any is trained.
    pub fn selected(&self) -> Option<usize> {
        let mut best: Option<&Candidate> = None;
        let mut best_index = None;
        for (i, candidate) in self.candidates.iter().enumerate() {
            let observations = candidate.model.valid_observations();
            if observations < self.burn_in.max(1) {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    let best_observations = b.model.valid_observations();
                    observations > best_observations
                        || (observations == best_observations
                            && candidate.smoothed_error() < b.smoothed_error())
                }
            };
            if better {
                best = Some(candidate);
                best_index = Some(i);
            }
        }
        best_index
    }

    /// Valid observations of every model, in configuration order.
    pub fn observations(&self) -> Vec<usize> {
        self.candidates
            .iter()
            .map(|c| c.model.valid_observations())
            .collect()
    }

    fn predict(&self, department: &SalesDepartment, market: &dyn Market, step: i64) -> Option<Price> {
        if !self.active {
            return None;
        }
        let candidate = &self.candidates[self.selected()?];
        candidate.model.predict_price(department, market, step)
    }
}

impl SalesPredictor for SwitchingSalesPredictor {
    fn predict_after_increasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        _expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        self.predict(department, market, i64::from(step))
    }

    fn predict_after_decreasing(
        &mut self,
        department: &SalesDepartment,
        market: &dyn Market,
        _expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        self.predict(department, market, -i64::from(step))
    }

    fn predict_unchanged(&mut self, department: &SalesDepartment, market: &dyn Market) -> Option<Price> {
        self.predict(department, market, 0)
    }

    fn observes_daily(&self) -> bool {
        self.active
    }

    fn observe(&mut self, department: &SalesDepartment) {
        if !self.active {
            return;
        }
        for candidate in &mut self.candidates {
            if let Some(residual) = candidate.model.learn(department) {
                candidate.error.add(residual * residual);
            }
        }
        let selected = self.selected();
        if selected != self.selected {
            info!(department = department.id().0, ?selected, "switched price model");
            self.selected = selected;
        }
    }

    fn turn_off(&mut self) {
        self.active = false;
        for candidate in &mut self.candidates {
            candidate.model.turn_off();
        }
    }
}
