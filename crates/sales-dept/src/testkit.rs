//! Deterministic collaborators for exercising departments in tests.
//!
//! Enabled in this crate's own tests and, for other crates, through the
//! `test-support` feature.

use crate::agents::{Buyer, BuyerSearch, Firm};
use crate::department::{SalesContext, SalesDepartment};
use crate::error::SalesError;
use crate::listener::SalesListener;
use crate::market::{Market, Submission};
use crate::pricing::AskPricing;
use crate::schedule::{SalesJob, Scheduler};
use sales_core::{
    AgentId, DepartmentId, Good, GoodId, GoodType, Phase, Price, Quote, QuoteId, SalesConfig,
    SellQuote, SellerRole, TradeResult,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// The good every test market trades.
pub fn beef_type() -> GoodType {
    GoodType::new("beef")
}

/// A unit of beef.
pub fn beef(id: u64, cost: Price) -> Good {
    Good::new(GoodId(id), beef_type(), cost)
}

/// A job waiting in a [`RecordingScheduler`].
#[derive(Clone, Debug)]
pub struct Scheduled {
    pub day: u32,
    pub phase: Phase,
    pub job: SalesJob,
    seq: u64,
}

/// Scheduler that stores jobs until a test runs them.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    pub day: u32,
    pub jobs: Vec<Scheduled>,
    seq: u64,
}

impl RecordingScheduler {
    fn push(&mut self, day: u32, phase: Phase, job: SalesJob) {
        self.seq += 1;
        self.jobs.push(Scheduled {
            day,
            phase,
            job,
            seq: self.seq,
        });
    }

    /// Remove and return the jobs due today, in phase order.
    pub fn take_due(&mut self) -> Vec<SalesJob> {
        let today = self.day;
        let (mut due, rest): (Vec<_>, Vec<_>) =
            self.jobs.drain(..).partition(|s| s.day <= today);
        self.jobs = rest;
        due.sort_by_key(|s| (s.phase, s.seq));
        due.into_iter().map(|s| s.job).collect()
    }

    pub fn advance(&mut self) {
        self.day += 1;
    }
}

impl Scheduler for RecordingScheduler {
    fn today(&self) -> u32 {
        self.day
    }

    fn schedule_soon(&mut self, phase: Phase, job: SalesJob) {
        self.push(self.day, phase, job);
    }

    fn schedule_tomorrow(&mut self, phase: Phase, job: SalesJob) {
        self.push(self.day + 1, phase, job);
    }

    fn schedule_once_in(&mut self, days: u32, phase: Phase, job: SalesJob) {
        self.push(self.day + days, phase, job);
    }
}

/// Firm with a plain set of owned goods.
#[derive(Clone, Debug)]
pub struct TestFirm {
    pub id: AgentId,
    pub goods: BTreeSet<GoodId>,
    pub cash: Price,
    pub workers: u32,
    pub active: bool,
}

impl TestFirm {
    pub fn new(id: u32) -> Self {
        Self {
            id: AgentId(id),
            goods: BTreeSet::new(),
            cash: 0,
            workers: 0,
            active: true,
        }
    }

    /// Put good `id` in the firm's inventory.
    pub fn give(&mut self, id: u64) {
        self.goods.insert(GoodId(id));
    }
}

impl Firm for TestFirm {
    fn id(&self) -> AgentId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn has(&self, good: GoodId) -> bool {
        self.goods.contains(&good)
    }

    fn deliver(&mut self, good: GoodId, price: Price) -> bool {
        if self.goods.remove(&good) {
            self.cash += price;
            true
        } else {
            false
        }
    }

    fn workers_producing(&self, _good_type: &GoodType) -> u32 {
        self.workers
    }
}

/// Buyer with a fixed reservation price.
#[derive(Clone, Debug)]
pub struct FixedBuyer {
    pub id: AgentId,
    pub offer: Option<Price>,
}

impl FixedBuyer {
    pub fn new(id: u32, offer: Option<Price>) -> Self {
        Self {
            id: AgentId(id),
            offer,
        }
    }
}

impl Buyer for FixedBuyer {
    fn id(&self) -> AgentId {
        self.id
    }

    fn maximum_offer(&self, _good: &Good) -> Option<Price> {
        self.offer
    }
}

/// Market whose behavior is set field by field.
#[derive(Debug)]
pub struct ScriptedMarket {
    pub good_type: GoodType,
    pub role: SellerRole,
    pub buyers: Vec<FixedBuyer>,
    pub book: BTreeMap<QuoteId, SellQuote>,
    /// Fill the next submitted quote at this price for this buyer.
    pub fill_next: Option<(Price, AgentId)>,
    /// Answer every trade with this failure.
    pub refuse_trades: Option<TradeResult>,
    pub submissions: u32,
    pub removals: u32,
    pub trades: Vec<(AgentId, GoodId, Price)>,
    pub registered: Vec<AgentId>,
    pub average: Option<Price>,
    pub best_bid: Option<Price>,
    pub sale_price_visible: bool,
    next_quote: u64,
}

impl ScriptedMarket {
    pub fn new(role: SellerRole) -> Self {
        Self {
            good_type: beef_type(),
            role,
            buyers: Vec::new(),
            book: BTreeMap::new(),
            fill_next: None,
            refuse_trades: None,
            submissions: 0,
            removals: 0,
            trades: Vec::new(),
            registered: Vec::new(),
            average: None,
            best_bid: None,
            sale_price_visible: true,
            next_quote: 0,
        }
    }
}

impl Market for ScriptedMarket {
    fn good_type(&self) -> &GoodType {
        &self.good_type
    }

    fn seller_role(&self) -> SellerRole {
        self.role
    }

    fn register_seller(&mut self, seller: AgentId) {
        self.registered.push(seller);
    }

    fn submit_sell_quote(
        &mut self,
        seller: &mut dyn Firm,
        price: Price,
        good: &Good,
        originator: DepartmentId,
    ) -> Submission {
        self.submissions += 1;
        if let Some((fill, buyer)) = self.fill_next.take() {
            if seller.deliver(good.id, fill) {
                self.trades.push((buyer, good.id, fill));
                return Submission::Filled { price: fill, buyer };
            }
        }
        self.next_quote += 1;
        let quote = SellQuote {
            id: QuoteId(self.next_quote),
            seller: seller.id(),
            price,
            good: Some(good.clone()),
            originator: Some(originator),
        };
        self.book.insert(quote.id, quote.clone());
        Submission::Resting(quote)
    }

    fn remove_sell_quote(&mut self, quote: &SellQuote) -> bool {
        self.removals += 1;
        self.book.remove(&quote.id).is_some()
    }

    fn trade(
        &mut self,
        seller: &mut dyn Firm,
        buyer: AgentId,
        good: &Good,
        price: Price,
        _buyer_quote: &Quote,
        _seller_quote: &Quote,
    ) -> TradeResult {
        if let Some(refusal) = self.refuse_trades {
            return refusal;
        }
        if !seller.deliver(good.id, price) {
            return TradeResult::StockOut;
        }
        self.trades.push((buyer, good.id, price));
        TradeResult::Success { price }
    }

    fn best_buy_price(&self) -> Option<Price> {
        self.best_bid
    }

    fn best_sell_price(&self) -> Option<Price> {
        self.book.values().map(|q| q.price).min()
    }

    fn is_best_sale_price_visible(&self) -> bool {
        self.sale_price_visible
    }

    fn average_closing_price(&self) -> Option<Price> {
        self.average
    }

    fn buyers(&self) -> Vec<&dyn Buyer> {
        self.buyers.iter().map(|b| b as &dyn Buyer).collect()
    }
}

/// Counts calls made on a [`FixedPricing`] after it was boxed.
#[derive(Debug, Default)]
pub struct PricingProbe {
    pub week_ends: Cell<u32>,
    pub turn_offs: Cell<u32>,
}

/// Cost plus a fixed markup, or a fixed ask.
#[derive(Debug, Clone)]
pub struct FixedPricing {
    markup: Price,
    fixed: Option<Price>,
    gap: f64,
    pub probe: Rc<PricingProbe>,
}

impl FixedPricing {
    pub fn markup(markup: Price) -> Self {
        Self {
            markup,
            fixed: None,
            gap: 0.0,
            probe: Rc::default(),
        }
    }

    pub fn fixed(price: Price) -> Self {
        Self {
            fixed: Some(price),
            ..Self::markup(0)
        }
    }

    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }
}

impl AskPricing for FixedPricing {
    fn price(&self, good: &Good) -> Price {
        self.fixed.unwrap_or(good.cost + self.markup)
    }

    fn week_end(&mut self) {
        self.probe.week_ends.set(self.probe.week_ends.get() + 1);
    }

    fn turn_off(&mut self) {
        self.probe.turn_offs.set(self.probe.turn_offs.get() + 1);
    }

    fn estimate_supply_gap(&self) -> f64 {
        self.gap
    }
}

/// What a [`RoundRobinSearch`] was told.
#[derive(Debug, Default)]
pub struct SearchLog {
    pub queries: u32,
    pub successes: Vec<AgentId>,
    pub failures: Vec<(AgentId, TradeResult)>,
    pub turned_off: bool,
}

/// Offers the market's buyers one after the other.
#[derive(Debug, Default)]
pub struct RoundRobinSearch {
    next: usize,
    pub log: Rc<RefCell<SearchLog>>,
}

impl RoundRobinSearch {
    pub fn new(log: Rc<RefCell<SearchLog>>) -> Self {
        Self { next: 0, log }
    }
}

impl BuyerSearch for RoundRobinSearch {
    fn best_in_sample_buyer<'m>(&mut self, market: &'m dyn Market) -> Option<&'m dyn Buyer> {
        self.log.borrow_mut().queries += 1;
        let buyers = market.buyers();
        if buyers.is_empty() {
            return None;
        }
        let buyer = buyers[self.next % buyers.len()];
        self.next += 1;
        Some(buyer)
    }

    fn react_to_success(&mut self, buyer: AgentId, _result: TradeResult) {
        self.log.borrow_mut().successes.push(buyer);
    }

    fn react_to_failure(&mut self, buyer: AgentId, result: TradeResult) {
        self.log.borrow_mut().failures.push((buyer, result));
    }

    fn turn_off(&mut self) {
        self.log.borrow_mut().turned_off = true;
    }
}

/// Event seen by a [`RecordingListener`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SalesEvent {
    SellThis(GoodId),
    StockOut(AgentId),
    GoodSold(GoodId, Price),
}

/// Appends `(tag, event)` to a shared log.
#[derive(Debug, Clone)]
pub struct RecordingListener {
    pub tag: u32,
    pub events: Rc<RefCell<Vec<(u32, SalesEvent)>>>,
}

impl SalesListener for RecordingListener {
    fn sell_this_event(&mut self, _firm: AgentId, _department: DepartmentId, good: &Good) {
        self.events
            .borrow_mut()
            .push((self.tag, SalesEvent::SellThis(good.id)));
    }

    fn stock_out_event(&mut self, _firm: AgentId, _department: DepartmentId, buyer: AgentId) {
        self.events
            .borrow_mut()
            .push((self.tag, SalesEvent::StockOut(buyer)));
    }

    fn good_sold_event(&mut self, _department: DepartmentId, good: &Good, price: Price) {
        self.events
            .borrow_mut()
            .push((self.tag, SalesEvent::GoodSold(good.id, price)));
    }
}

/// A firm, a market and a clock wired together.
#[derive(Debug)]
pub struct Harness {
    pub firm: TestFirm,
    pub market: ScriptedMarket,
    pub scheduler: RecordingScheduler,
    pub search_log: Rc<RefCell<SearchLog>>,
}

impl Harness {
    fn with_market(market: ScriptedMarket) -> Self {
        Self {
            firm: TestFirm::new(1),
            market,
            scheduler: RecordingScheduler::default(),
            search_log: Rc::default(),
        }
    }

    /// Order-book market without buyers.
    pub fn quoting() -> Self {
        Self::with_market(ScriptedMarket::new(SellerRole::Quote))
    }

    /// Quote-less market with the given buyers.
    pub fn peddling(buyers: Vec<FixedBuyer>) -> Self {
        let mut market = ScriptedMarket::new(SellerRole::NoQuote);
        market.buyers = buyers;
        Self::with_market(market)
    }

    pub fn ctx(&mut self) -> SalesContext<'_> {
        SalesContext {
            firm: &mut self.firm,
            market: &mut self.market,
            scheduler: &mut self.scheduler,
        }
    }

    pub fn department(&mut self, pricing: FixedPricing) -> SalesDepartment {
        self.department_with(pricing, SalesConfig::default())
    }

    pub fn department_with(&mut self, pricing: FixedPricing, config: SalesConfig) -> SalesDepartment {
        SalesDepartment::new(
            DepartmentId(1),
            self.firm.id,
            &mut self.market,
            config,
            Box::new(pricing),
            Box::new(RoundRobinSearch::new(self.search_log.clone())),
        )
        .expect("test department config is valid")
    }

    /// Run every job due today, including the ones they schedule for today.
    pub fn run_today(&mut self, department: &mut SalesDepartment) -> Result<(), SalesError> {
        loop {
            let due = self.scheduler.take_due();
            if due.is_empty() {
                return Ok(());
            }
            for job in due {
                department.handle(job.action, &mut self.ctx())?;
            }
        }
    }

    /// Run `days` full days.
    pub fn run_days(&mut self, department: &mut SalesDepartment, days: u32) -> Result<(), SalesError> {
        for _ in 0..days {
            self.run_today(department)?;
            self.scheduler.advance();
        }
        Ok(())
    }
}
