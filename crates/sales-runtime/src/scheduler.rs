//! Discrete-event clock: days split into ordered phases.

use sales_core::Phase;
use sales_dept::{SalesJob, Scheduler};
use std::collections::BTreeMap;

/// Runs jobs by `(day, phase)` in the order they were scheduled.
///
/// "Soon" means later today when the requested phase has not passed yet,
/// otherwise the same phase tomorrow.
#[derive(Debug, Default)]
pub struct PhaseScheduler {
    day: u32,
    phase: Option<Phase>,
    queue: BTreeMap<(u32, Phase, u64), SalesJob>,
    seq: u64,
}

impl PhaseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase being run, `None` between days.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Enter `phase` of the current day.
    pub fn enter(&mut self, phase: Phase) {
        self.phase = Some(phase);
    }

    /// Close the day and move the clock to the next one.
    pub fn advance_day(&mut self) {
        self.day += 1;
        self.phase = None;
    }

    /// Next job due in the current phase, including jobs added while the
    /// phase runs.
    pub fn pop_due(&mut self) -> Option<SalesJob> {
        let phase = self.phase?;
        let key = *self
            .queue
            .range((self.day, phase, 0)..=(self.day, phase, u64::MAX))
            .next()?
            .0;
        self.queue.remove(&key)
    }

    /// Jobs still waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Jobs left behind on days already closed.
    pub fn overdue(&self) -> usize {
        self.queue.range(..(self.day, Phase::Dawn, 0)).count()
    }

    fn push(&mut self, day: u32, phase: Phase, job: SalesJob) {
        self.seq += 1;
        self.queue.insert((day, phase, self.seq), job);
    }
}

impl Scheduler for PhaseScheduler {
    fn today(&self) -> u32 {
        self.day
    }

    fn schedule_soon(&mut self, phase: Phase, job: SalesJob) {
        let day = match self.phase {
            Some(current) if phase < current => self.day + 1,
            _ => self.day,
        };
        self.push(day, phase, job);
    }

    fn schedule_tomorrow(&mut self, phase: Phase, job: SalesJob) {
        self.push(self.day + 1, phase, job);
    }

    fn schedule_once_in(&mut self, days: u32, phase: Phase, job: SalesJob) {
        self.push(self.day + days, phase, job);
    }
}
