//! Random-sample buyer search for peddling.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sales_core::{AgentId, Good, TradeResult};
use sales_dept::{Buyer, BuyerSearch, Market};
use std::collections::BTreeSet;
use tracing::trace;

/// Samples a few buyers and offers to the one willing to pay most.
/// Buyers who refused are left out of later samples until a trade
/// succeeds or everyone has refused.
pub struct SampleBuyerSearch {
    sample_size: usize,
    rng: ChaCha8Rng,
    refused: BTreeSet<AgentId>,
    active: bool,
}

impl SampleBuyerSearch {
    pub fn new(sample_size: usize, seed: u64) -> Self {
        Self {
            sample_size: sample_size.max(1),
            rng: ChaCha8Rng::seed_from_u64(seed),
            refused: BTreeSet::new(),
            active: true,
        }
    }

    /// Buyers skipped by the next sample.
    pub fn refused(&self) -> usize {
        self.refused.len()
    }
}

impl BuyerSearch for SampleBuyerSearch {
    fn best_in_sample_buyer<'m>(&mut self, market: &'m dyn Market) -> Option<&'m dyn Buyer> {
        if !self.active {
            return None;
        }
        let probe = Good::hypothetical(market.good_type().clone(), 0);
        let mut candidates: Vec<&dyn Buyer> = market
            .buyers()
            .into_iter()
            .filter(|b| b.maximum_offer(&probe).is_some())
            .collect();
        if candidates.iter().all(|b| self.refused.contains(&b.id())) {
            self.refused.clear();
        }
        candidates.retain(|b| !self.refused.contains(&b.id()));
        let best = candidates
            .choose_multiple(&mut self.rng, self.sample_size)
            .copied()
            .max_by_key(|b| b.maximum_offer(&probe));
        trace!(sampled = self.sample_size, found = best.is_some(), "buyer sample drawn");
        best
    }

    fn react_to_success(&mut self, _buyer: AgentId, _result: TradeResult) {
        self.refused.clear();
    }

    fn react_to_failure(&mut self, buyer: AgentId, _result: TradeResult) {
        self.refused.insert(buyer);
    }

    fn turn_off(&mut self) {
        self.active = false;
        self.refused.clear();
    }
}
