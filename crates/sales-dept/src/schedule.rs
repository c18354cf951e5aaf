//! Work the department asks the simulation clock to run later.

use sales_core::{DepartmentId, GoodId, Phase};

/// A deferred department action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SalesAction {
    /// Price the good and put a quote on the book.
    PlaceQuote(GoodId),
    /// Look for a buyer directly, retrying on failure.
    Peddle(GoodId),
    /// Close the day: record observations and reset counters.
    DailyStatistics,
    /// Feed the day's data to the predictor installed at `epoch`.
    PredictorStep {
        /// Predictor generation the step belongs to.
        epoch: u64,
    },
}

/// An action addressed to one department.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SalesJob {
    /// Department that must handle the action.
    pub department: DepartmentId,
    /// What to do.
    pub action: SalesAction,
}

/// The simulation clock, as seen by a department.
pub trait Scheduler {
    /// Current simulated day.
    fn today(&self) -> u32;
    /// Run `job` at `phase` today, or tomorrow if `phase` has already passed.
    fn schedule_soon(&mut self, phase: Phase, job: SalesJob);
    /// Run `job` at `phase` tomorrow.
    fn schedule_tomorrow(&mut self, phase: Phase, job: SalesJob);
    /// Run `job` at `phase` in `days` days.
    fn schedule_once_in(&mut self, days: u32, phase: Phase, job: SalesJob);
}
