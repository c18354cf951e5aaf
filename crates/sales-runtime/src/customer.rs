//! Final customers with a reservation price and a daily demand.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sales_core::{AgentId, Good, Price};
use sales_dept::Buyer;
use serde::{Deserialize, Serialize};

/// How customers are drawn for a scenario.
///
/// Example:
///   count: 20
///   min_reservation: 40
///   max_reservation: 120
///   daily_demand: 1
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerConfig {
    pub count: u32,
    /// Lowest reservation price, inclusive.
    pub min_reservation: Price,
    /// Highest reservation price, inclusive.
    pub max_reservation: Price,
    /// Units each customer wants every day.
    pub daily_demand: u32,
}

impl Default for CustomerConfig {
    fn default() -> Self {
        Self {
            count: 20,
            min_reservation: 40,
            max_reservation: 120,
            daily_demand: 1,
        }
    }
}

/// A buyer who takes anything up to its reservation price until today's
/// demand is met.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Customer {
    id: AgentId,
    reservation: Price,
    daily_demand: u32,
    remaining: u32,
}

impl Customer {
    pub fn new(id: AgentId, reservation: Price, daily_demand: u32) -> Self {
        Self {
            id,
            reservation,
            daily_demand,
            remaining: daily_demand,
        }
    }

    pub fn reservation(&self) -> Price {
        self.reservation
    }

    /// Units still wanted today.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Start a new day with full demand.
    pub fn refresh(&mut self) {
        self.remaining = self.daily_demand;
    }

    /// Take one unit at `price`. Returns false when the customer does not
    /// want it.
    pub fn buy(&mut self, price: Price) -> bool {
        if self.remaining == 0 || price > self.reservation {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

impl Buyer for Customer {
    fn id(&self) -> AgentId {
        self.id
    }

    fn maximum_offer(&self, _good: &Good) -> Option<Price> {
        (self.remaining > 0).then_some(self.reservation)
    }
}

/// Draw `config.count` customers with ids starting at `first_id`.
pub fn draw_customers(config: &CustomerConfig, first_id: u32, rng: &mut ChaCha8Rng) -> Vec<Customer> {
    let low = config.min_reservation.min(config.max_reservation);
    let high = config.min_reservation.max(config.max_reservation);
    (0..config.count)
        .map(|i| {
            let reservation = rng.gen_range(low..=high);
            Customer::new(AgentId(first_id + i), reservation, config.daily_demand)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use sales_core::{GoodId, GoodType};

    #[test]
    fn demand_runs_out_and_refreshes() {
        let mut c = Customer::new(AgentId(5), 80, 2);
        let good = Good::new(GoodId(1), GoodType::new("beef"), 10);
        assert_eq!(c.maximum_offer(&good), Some(80));
        assert!(!c.buy(81));
        assert!(c.buy(80));
        assert!(c.buy(10));
        assert!(!c.buy(10));
        assert_eq!(c.maximum_offer(&good), None);
        c.refresh();
        assert_eq!(c.remaining(), 2);
    }

    #[test]
    fn draws_are_reproducible_and_in_range() {
        let config = CustomerConfig::default();
        let a = draw_customers(&config, 100, &mut ChaCha8Rng::seed_from_u64(7));
        let b = draw_customers(&config, 100, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
        assert_eq!(a[0].id(), AgentId(100));
        assert!(a.iter().all(|c| (40..=120).contains(&c.reservation())));
    }
}
