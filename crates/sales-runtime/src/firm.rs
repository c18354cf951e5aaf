//! A single-plant firm producing one good type.

use sales_core::{AgentId, Good, GoodId, GoodType, Price};
use sales_dept::Firm;
use std::collections::BTreeSet;
use tracing::debug;

/// Produces goods at a fixed unit cost and collects cash from sales.
#[derive(Clone, Debug)]
pub struct ProducerFirm {
    id: AgentId,
    good_type: GoodType,
    unit_cost: Price,
    daily_production: u32,
    inventory: BTreeSet<GoodId>,
    cash: Price,
    produced: u64,
    next_good: u64,
    active: bool,
}

impl ProducerFirm {
    pub fn new(id: AgentId, good_type: GoodType, unit_cost: Price, daily_production: u32) -> Self {
        Self {
            id,
            good_type,
            unit_cost,
            daily_production,
            inventory: BTreeSet::new(),
            cash: 0,
            produced: 0,
            next_good: 1,
            active: true,
        }
    }

    pub fn daily_production(&self) -> u32 {
        self.daily_production
    }

    pub fn set_daily_production(&mut self, units: u32) {
        debug!(firm = self.id.0, from = self.daily_production, to = units, "production changed");
        self.daily_production = units;
    }

    pub fn unit_cost(&self) -> Price {
        self.unit_cost
    }

    /// Revenue collected so far.
    pub fn cash(&self) -> Price {
        self.cash
    }

    /// Units produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn inventory(&self) -> usize {
        self.inventory.len()
    }

    /// Shut the firm down; its departments stop recording.
    pub fn close(&mut self) {
        self.active = false;
    }

    /// Run the plant for a day.
    pub fn produce(&mut self) -> Vec<Good> {
        if !self.active {
            return Vec::new();
        }
        (0..self.daily_production)
            .map(|_| {
                let id = GoodId(self.next_good);
                self.next_good += 1;
                self.produced += 1;
                self.inventory.insert(id);
                Good::new(id, self.good_type.clone(), self.unit_cost)
            })
            .collect()
    }
}

impl Firm for ProducerFirm {
    fn id(&self) -> AgentId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn has(&self, good: GoodId) -> bool {
        self.inventory.contains(&good)
    }

    fn deliver(&mut self, good: GoodId, price: Price) -> bool {
        if self.inventory.remove(&good) {
            self.cash += price;
            true
        } else {
            false
        }
    }

    fn workers_producing(&self, good_type: &GoodType) -> u32 {
        if *good_type == self.good_type {
            self.daily_production
        } else {
            0
        }
    }
}
