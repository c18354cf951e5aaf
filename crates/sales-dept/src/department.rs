//! The sales department: quoting, peddling and settling one firm's goods on
//! one market.
//!
//! Every good tasked for sale moves through `TO_SELL -> QUOTED | UNSOLD ->
//! SOLD`, with `BEING_UPDATED` while its quote is withdrawn for repricing.
//! Collaborators are borrowed per call through a [`SalesContext`]; deferred
//! work goes through the [`Scheduler`] as [`SalesJob`]s and comes back
//! through [`SalesDepartment::handle`].

use crate::agents::{Buyer, BuyerSearch, Firm};
use crate::data::{DataStorage, SalesDataType};
use crate::error::SalesError;
use crate::listener::{ListenerId, SalesListener};
use crate::market::{Market, Submission};
use crate::predictor::{MemorySalesPredictor, SalesPredictor};
use crate::pricing::AskPricing;
use crate::schedule::{SalesAction, SalesJob, Scheduler};
use crate::stats::{
    days_of_inventory, weighted_average_price, DailyFlows, SalesStatistics, WeeklyReport,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use sales_core::{
    AgentId, BuyQuote, DepartmentId, Good, GoodId, GoodType, Phase, Price, Quote, QuoteId,
    SaleResult, SalesConfig, SellQuote, SellerRole, TradeResult,
};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Days looked back by [`SalesDepartment::averaged_last_price`].
const AVERAGED_PRICE_WINDOW: i64 = 7;

/// Collaborators borrowed for the duration of one department call.
pub struct SalesContext<'a> {
    /// Firm owning the inventory.
    pub firm: &'a mut dyn Firm,
    /// Market the department sells into.
    pub market: &'a mut dyn Market,
    /// Simulation clock.
    pub scheduler: &'a mut dyn Scheduler,
}

/// What happened to a peddling attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeddleOutcome {
    /// The good was sold.
    Sold {
        /// Settled price.
        price: Price,
    },
    /// The search found nobody to ask.
    NoBuyer,
    /// The buyer refused or the trade failed downstream.
    Failed(TradeResult),
}

impl PeddleOutcome {
    pub fn is_sold(&self) -> bool {
        matches!(self, PeddleOutcome::Sold { .. })
    }
}

/// Settlement price of a peddled good: midpoint of ask and willingness,
/// halves rounded up, kept within `[ask, willingness]`.
///
/// Example:
/// assert_eq!(peddle_price(50, 70), 60);
/// assert_eq!(peddle_price(50, 51), 51);
pub fn peddle_price(ask: Price, willingness: Price) -> Price {
    let sum = ask.saturating_add(willingness);
    let midpoint = sum.div_euclid(2) + sum.rem_euclid(2);
    midpoint.clamp(ask.min(willingness), willingness.max(ask))
}

/// Sells one firm's goods on one market.
pub struct SalesDepartment {
    id: DepartmentId,
    firm: AgentId,
    good_type: GoodType,
    config: SalesConfig,
    active: bool,
    started: bool,
    to_sell: BTreeMap<GoodId, Good>,
    quoted: BTreeMap<GoodId, SellQuote>,
    results: BTreeMap<GoodId, SaleResult>,
    stats: SalesStatistics,
    flows: DailyFlows,
    days_of_inventory: f64,
    last_closing_price: Option<Price>,
    last_closing_cost: Option<Price>,
    data: DataStorage<SalesDataType>,
    pricing: Box<dyn AskPricing>,
    search: Box<dyn BuyerSearch>,
    predictor: Option<Box<dyn SalesPredictor>>,
    predictor_epoch: u64,
    listeners: Vec<(ListenerId, Box<dyn SalesListener>)>,
    next_listener: u64,
    rng: ChaCha8Rng,
}

impl SalesDepartment {
    /// Create a department and register its firm as a seller on `market`.
    pub fn new(
        id: DepartmentId,
        firm: AgentId,
        market: &mut dyn Market,
        config: SalesConfig,
        pricing: Box<dyn AskPricing>,
        search: Box<dyn BuyerSearch>,
    ) -> Result<Self, SalesError> {
        config.validate()?;
        market.register_seller(firm);
        Ok(Self {
            id,
            firm,
            good_type: market.good_type().clone(),
            stats: SalesStatistics::new(config.memory_length),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            config,
            active: true,
            started: false,
            to_sell: BTreeMap::new(),
            quoted: BTreeMap::new(),
            results: BTreeMap::new(),
            flows: DailyFlows::default(),
            days_of_inventory: 0.0,
            last_closing_price: None,
            last_closing_cost: None,
            data: DataStorage::new(&SalesDataType::ALL),
            pricing,
            search,
            predictor: Some(Box::new(MemorySalesPredictor)),
            predictor_epoch: 0,
            listeners: Vec::new(),
            next_listener: 0,
        })
    }

    pub fn id(&self) -> DepartmentId {
        self.id
    }

    /// Firm this department sells for.
    pub fn firm(&self) -> AgentId {
        self.firm
    }

    pub fn good_type(&self) -> &GoodType {
        &self.good_type
    }

    pub fn config(&self) -> &SalesConfig {
        &self.config
    }

    /// False after [`SalesDepartment::turn_off`].
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Task the department with selling `good`.
    pub fn sell_this(&mut self, good: Good, ctx: &mut SalesContext<'_>) -> Result<(), SalesError> {
        self.ensure_active()?;
        if good.good_type != self.good_type {
            return Err(SalesError::WrongGoodType {
                good: good.id,
                expected: self.good_type.clone(),
                found: good.good_type,
            });
        }
        if !ctx.firm.has(good.id) {
            return Err(SalesError::NotOwned(good.id));
        }
        if self.to_sell.contains_key(&good.id) {
            return Err(SalesError::AlreadySelling(good.id));
        }

        self.flows.inflow += 1;
        for (_, listener) in self.listeners.iter_mut() {
            listener.sell_this_event(self.firm, self.id, &good);
        }
        let good_id = good.id;
        self.to_sell.insert(good_id, good);

        if !self.started {
            self.started = true;
            ctx.scheduler
                .schedule_soon(Phase::Cleanup, self.job(SalesAction::DailyStatistics));
        }
        self.dispatch(good_id, ctx);
        Ok(())
    }

    fn dispatch(&mut self, good: GoodId, ctx: &mut SalesContext<'_>) {
        match ctx.market.seller_role() {
            SellerRole::Quote => ctx
                .scheduler
                .schedule_soon(Phase::Trade, self.job(SalesAction::PlaceQuote(good))),
            SellerRole::NoQuote if self.config.can_peddle => ctx
                .scheduler
                .schedule_soon(Phase::Trade, self.job(SalesAction::Peddle(good))),
            SellerRole::NoQuote => {
                debug!(department = self.id.0, good = good.0, "peddling disabled, waiting for buyers")
            }
        }
    }

    /// Run a job this department scheduled earlier. Jobs arriving after
    /// teardown, or for goods no longer on sale, are ignored.
    pub fn handle(&mut self, action: SalesAction, ctx: &mut SalesContext<'_>) -> Result<(), SalesError> {
        if !self.active {
            return Ok(());
        }
        match action {
            SalesAction::PlaceQuote(good) => {
                if self.to_sell.contains_key(&good) && !self.quoted.contains_key(&good) {
                    self.place_quote(good, ctx)?;
                }
                Ok(())
            }
            SalesAction::Peddle(good) => self.peddle_with_retry(good, ctx),
            SalesAction::DailyStatistics => self.daily_statistics(ctx),
            SalesAction::PredictorStep { epoch } => {
                self.predictor_step(epoch, ctx);
                Ok(())
            }
        }
    }

    /// Price `good` and submit it to the market.
    pub fn place_quote(&mut self, good_id: GoodId, ctx: &mut SalesContext<'_>) -> Result<(), SalesError> {
        self.ensure_active()?;
        let good = self.selling(good_id)?.clone();
        if !ctx.firm.has(good_id) {
            return Err(SalesError::NotOwned(good_id));
        }
        if let Some(stale) = self.quoted.remove(&good_id) {
            ctx.market.remove_sell_quote(&stale);
        }

        let ask = self.pricing.price(&good);
        match ctx.market.submit_sell_quote(&mut *ctx.firm, ask, &good, self.id) {
            Submission::Resting(quote) => {
                debug!(department = self.id.0, good = good_id.0, ask, "quote placed");
                self.quoted.insert(good_id, quote);
                self.results.insert(good_id, SaleResult::Quoted);
                if self.config.peddle_after_quoting && self.config.can_peddle {
                    self.peddle_now(good_id, ctx)?;
                }
            }
            Submission::Filled { price, buyer } => {
                self.react_to_filled_quote(good_id, price, buyer, ctx)?;
                let settled = matches!(
                    self.results.get(&good_id),
                    Some(SaleResult::Sold { price: p, .. }) if *p == price
                );
                if !settled || self.last_closing_price != Some(price) {
                    return Err(SalesError::Inconsistent {
                        good: good_id,
                        detail: "immediate fill was not logged as a sale",
                    });
                }
            }
        }
        Ok(())
    }

    /// A resting quote for `good_id` was matched: the market already moved
    /// the good to `buyer`. Logs the sale exactly once.
    pub fn react_to_filled_quote(
        &mut self,
        good_id: GoodId,
        price: Price,
        buyer: AgentId,
        ctx: &mut SalesContext<'_>,
    ) -> Result<(), SalesError> {
        if price < 0 {
            return Err(SalesError::NegativePrice(price));
        }
        let good = self.selling(good_id)?.clone();
        if ctx.firm.has(good_id) {
            return Err(SalesError::StillOwned(good_id));
        }
        if matches!(self.results.get(&good_id), Some(SaleResult::Sold { .. })) {
            return Err(SalesError::Inconsistent {
                good: good_id,
                detail: "good on sale already recorded as sold",
            });
        }

        self.to_sell.remove(&good_id);
        // the book consumed the quote when it matched
        self.quoted.remove(&good_id);
        self.log_outflow(good, price, buyer);
        Ok(())
    }

    /// Look for a buyer directly and settle at the midpoint of ask and
    /// willingness to pay.
    pub fn peddle_now(&mut self, good_id: GoodId, ctx: &mut SalesContext<'_>) -> Result<PeddleOutcome, SalesError> {
        self.ensure_active()?;
        let good = self.selling(good_id)?.clone();
        if !ctx.firm.has(good_id) {
            return Err(SalesError::NotOwned(good_id));
        }
        let ask = match self.quoted.get(&good_id) {
            Some(quote) => quote.price,
            None => self.pricing.price(&good),
        };

        let candidate = self
            .search
            .best_in_sample_buyer(&*ctx.market)
            .map(|buyer| (buyer.id(), buyer.maximum_offer(&good)));
        let Some((buyer, offer)) = candidate else {
            debug!(department = self.id.0, good = good_id.0, "no buyer to peddle to");
            self.mark_unsold(good_id);
            return Ok(PeddleOutcome::NoBuyer);
        };
        let willingness = match offer {
            Some(offer) if offer >= ask => offer,
            _ => {
                debug!(department = self.id.0, good = good_id.0, ask, ?offer, "peddle refused");
                self.mark_unsold(good_id);
                self.search.react_to_failure(buyer, TradeResult::PriceRejected);
                return Ok(PeddleOutcome::Failed(TradeResult::PriceRejected));
            }
        };

        let price = peddle_price(ask, willingness);
        let buyer_quote = Quote::Buy(BuyQuote {
            id: QuoteId::UNPLACED,
            buyer,
            price: willingness,
            good_type: self.good_type.clone(),
        });
        let seller_quote = Quote::Sell(SellQuote {
            id: QuoteId::UNPLACED,
            seller: self.firm,
            price: ask,
            good: Some(good.clone()),
            originator: Some(self.id),
        });
        let result = ctx
            .market
            .trade(&mut *ctx.firm, buyer, &good, price, &buyer_quote, &seller_quote);
        match result {
            TradeResult::Success { price } => {
                if ctx.firm.has(good_id) {
                    return Err(SalesError::StillOwned(good_id));
                }
                self.to_sell.remove(&good_id);
                if let Some(quote) = self.quoted.remove(&good_id) {
                    ctx.market.remove_sell_quote(&quote);
                }
                self.log_outflow(good, price, buyer);
                self.search.react_to_success(buyer, result);
                Ok(PeddleOutcome::Sold { price })
            }
            failure => {
                debug!(department = self.id.0, good = good_id.0, ?failure, "peddled trade failed");
                self.mark_unsold(good_id);
                self.search.react_to_failure(buyer, failure);
                Ok(PeddleOutcome::Failed(failure))
            }
        }
    }

    fn peddle_with_retry(&mut self, good_id: GoodId, ctx: &mut SalesContext<'_>) -> Result<(), SalesError> {
        if !self.to_sell.contains_key(&good_id) {
            return Ok(());
        }
        let outcome = self.peddle_now(good_id, ctx)?;
        if outcome.is_sold() || ctx.market.seller_role() == SellerRole::Quote {
            return Ok(());
        }
        match self.config.retry.next_delay(&mut self.rng) {
            Some(days) => {
                debug!(department = self.id.0, good = good_id.0, days, "peddle retry scheduled");
                ctx.scheduler.schedule_once_in(
                    days,
                    Phase::Trade,
                    self.job(SalesAction::Peddle(good_id)),
                );
            }
            None => debug!(department = self.id.0, good = good_id.0, "giving up peddling"),
        }
        Ok(())
    }

    /// Answer a buyer asking what we sell for. Returns [`Quote::Empty`] when
    /// nothing is for sale, and reports a stock-out if that buyer could have
    /// paid the last price.
    pub fn ask_for_sale_price(&mut self, buyer: &dyn Buyer, market: &dyn Market) -> Quote {
        if self.to_sell.is_empty() {
            if let (Some(cost), Some(last_price)) = (self.last_closing_cost, self.last_closing_price) {
                let probe = Good::hypothetical(self.good_type.clone(), cost);
                if buyer.maximum_offer(&probe).is_some_and(|offer| offer >= last_price) {
                    let buyer_id = buyer.id();
                    for (_, listener) in self.listeners.iter_mut() {
                        listener.stock_out_event(self.firm, self.id, buyer_id);
                    }
                }
            }
            return Quote::Empty;
        }

        if market.seller_role() == SellerRole::Quote {
            if let Some(best) = self.quoted.values().min_by_key(|q| q.price) {
                return Quote::Sell(best.clone());
            }
        }

        let cheapest = self
            .to_sell
            .values()
            .map(|good| (good, self.pricing.price(good)))
            .min_by_key(|(_, price)| *price);
        match cheapest {
            Some((good, price)) => Quote::Sell(SellQuote {
                id: QuoteId::UNPLACED,
                seller: self.firm,
                price,
                good: Some(good.clone()),
                originator: Some(self.id),
            }),
            None => Quote::Empty,
        }
    }

    /// A buyer trades against one of our quotes.
    pub fn shop_here(
        &mut self,
        buyer_quote: &Quote,
        seller_quote: &Quote,
        ctx: &mut SalesContext<'_>,
    ) -> Result<TradeResult, SalesError> {
        self.ensure_active()?;
        let Quote::Buy(bid) = buyer_quote else {
            return Err(SalesError::NotABuyQuote);
        };
        let Quote::Sell(ask) = seller_quote else {
            return Err(SalesError::NotASellQuote);
        };
        if ask.originator != Some(self.id) {
            return Err(SalesError::ForeignQuote(self.id));
        }
        let Some(good) = ask.good.clone() else {
            error!(department = self.id.0, "asked to sell without a specific good");
            return Err(SalesError::NoSpecificGood);
        };
        if bid.price < ask.price {
            return Err(SalesError::PricesDoNotCross {
                bid: bid.price,
                ask: ask.price,
            });
        }
        self.selling(good.id)?;
        if !ctx.firm.has(good.id) {
            return Err(SalesError::NotOwned(good.id));
        }

        let price = ctx.market.clearing_price(ask.price, bid.price);
        let result = ctx.market.trade(
            &mut *ctx.firm,
            bid.buyer,
            &good,
            price,
            buyer_quote,
            seller_quote,
        );
        match result {
            TradeResult::Success { price } => {
                if ctx.firm.has(good.id) {
                    return Err(SalesError::StillOwned(good.id));
                }
                self.to_sell.remove(&good.id);
                if let Some(quote) = self.quoted.remove(&good.id) {
                    ctx.market.remove_sell_quote(&quote);
                }
                self.log_outflow(good, price, bid.buyer);
            }
            _ => self.mark_unsold(good.id),
        }
        Ok(result)
    }

    /// Close the accounting week: roll sold goods into the totals and drop
    /// them, value what is left unsold, push the aggregates and let the
    /// pricing strategy recalibrate.
    ///
    /// An unsold result for a good no longer on sale is an error and leaves
    /// the week open.
    pub fn week_end(&mut self) -> Result<WeeklyReport, SalesError> {
        if !self.active {
            return Ok(WeeklyReport::default());
        }
        if let Some(good) = self.results.iter().find_map(|(good, result)| {
            (!matches!(result, SaleResult::Sold { .. }) && !self.to_sell.contains_key(good))
                .then_some(*good)
        }) {
            error!(good = good.0, "unsold result without a good on sale");
            return Err(SalesError::Inconsistent {
                good,
                detail: "unsold result without a good on sale",
            });
        }

        let goods_to_sell = self.results.len() as u32;
        let mut sales: Price = 0;
        let mut cogs: Price = 0;
        let mut unsold_value: Price = 0;
        let mut goods_sold = 0u32;
        let to_sell = &self.to_sell;
        self.results.retain(|good, result| match *result {
            SaleResult::Sold {
                price,
                previous_cost,
            } => {
                sales += price;
                cogs += previous_cost;
                goods_sold += 1;
                false
            }
            _ => {
                if *result == SaleResult::Quoted {
                    *result = SaleResult::Unsold;
                }
                unsold_value += to_sell.get(good).map_or(0, |g| g.cost);
                true
            }
        });

        let report = self
            .stats
            .record_week(sales, cogs, unsold_value, goods_sold, goods_to_sell);
        self.pricing.week_end();
        info!(
            department = self.id.0,
            week = report.week,
            sales = report.sales,
            cogs = report.cogs,
            margin = report.margin,
            unsold = report.unsold_value,
            sold = %report.sold_percentage,
            "week closed"
        );
        Ok(report)
    }

    /// Withdraw every resting quote and price the goods again.
    pub fn update_quotes(&mut self, ctx: &mut SalesContext<'_>) -> Result<usize, SalesError> {
        self.ensure_active()?;
        let withdrawn = std::mem::take(&mut self.quoted);
        let count = withdrawn.len();
        for (good, quote) in withdrawn {
            ctx.market.remove_sell_quote(&quote);
            self.results.insert(good, SaleResult::BeingUpdated);
            self.dispatch(good, ctx);
        }
        debug!(department = self.id.0, count, "quotes withdrawn for repricing");
        Ok(count)
    }

    /// The good was consumed elsewhere: forget it and pull its quote.
    pub fn stop_selling(&mut self, good: GoodId, market: &mut dyn Market) -> Result<(), SalesError> {
        self.selling(good)?;
        if matches!(self.results.get(&good), Some(SaleResult::Sold { .. })) {
            return Err(SalesError::Inconsistent {
                good,
                detail: "good on sale already recorded as sold",
            });
        }
        self.to_sell.remove(&good);
        self.results.remove(&good);
        if let Some(quote) = self.quoted.remove(&good) {
            market.remove_sell_quote(&quote);
        }
        Ok(())
    }

    /// Tear down the department and its strategies. Safe to call twice.
    pub fn turn_off(&mut self, market: &mut dyn Market) {
        if !self.active {
            return;
        }
        self.active = false;
        for quote in self.quoted.values() {
            market.remove_sell_quote(quote);
        }
        self.pricing.turn_off();
        self.search.turn_off();
        if let Some(predictor) = self.predictor.as_mut() {
            predictor.turn_off();
        }
        self.to_sell.clear();
        self.quoted.clear();
        self.results.clear();
        self.stats.clear();
        self.listeners.clear();
        info!(department = self.id.0, "sales department turned off");
    }

    fn daily_statistics(&mut self, ctx: &mut SalesContext<'_>) -> Result<(), SalesError> {
        if !ctx.firm.is_active() {
            return Ok(());
        }
        self.days_of_inventory =
            days_of_inventory(self.to_sell.len(), self.flows.inflow, self.flows.outflow);
        let row = self.observation_row(&*ctx.firm);
        self.data.record_day(ctx.scheduler.today(), row)?;
        self.flows.reset();
        ctx.scheduler
            .schedule_tomorrow(Phase::Cleanup, self.job(SalesAction::DailyStatistics));
        Ok(())
    }

    fn observation_row(&self, firm: &dyn Firm) -> [(SalesDataType, f64); 9] {
        let price_or_nan = |price: Option<Price>| price.map_or(f64::NAN, |p| p as f64);
        [
            (SalesDataType::LastClosingPrice, price_or_nan(self.last_closing_price)),
            (
                SalesDataType::AverageClosingPrice,
                self.flows.average_closing_price().unwrap_or(f64::NAN),
            ),
            (SalesDataType::Outflow, f64::from(self.flows.outflow)),
            (SalesDataType::Inflow, f64::from(self.flows.inflow)),
            (SalesDataType::GoodsToSell, self.to_sell.len() as f64),
            (SalesDataType::DaysOfInventory, self.days_of_inventory),
            (SalesDataType::SupplyGap, self.pricing.estimate_supply_gap()),
            (
                SalesDataType::WorkersProducing,
                f64::from(firm.workers_producing(&self.good_type)),
            ),
            (
                SalesDataType::HypotheticalAsk,
                self.hypothetical_sale_price(self.last_closing_cost.unwrap_or(0)) as f64,
            ),
        ]
    }

    /// Replace the predictor. The old one is turned off and its pending
    /// daily steps become no-ops.
    pub fn set_predictor(&mut self, predictor: Box<dyn SalesPredictor>, scheduler: &mut dyn Scheduler) {
        if let Some(mut old) = self.predictor.take() {
            old.turn_off();
        }
        self.predictor_epoch += 1;
        if self.active && predictor.observes_daily() {
            let epoch = self.predictor_epoch;
            scheduler.schedule_soon(
                Phase::PrepareToTrade,
                self.job(SalesAction::PredictorStep { epoch }),
            );
        }
        self.predictor = Some(predictor);
        info!(department = self.id.0, epoch = self.predictor_epoch, "predictor replaced");
    }

    fn predictor_step(&mut self, epoch: u64, ctx: &mut SalesContext<'_>) {
        if epoch != self.predictor_epoch {
            debug!(department = self.id.0, epoch, "stale predictor step ignored");
            return;
        }
        let Some(mut predictor) = self.predictor.take() else {
            return;
        };
        predictor.observe(self);
        self.predictor = Some(predictor);
        ctx.scheduler.schedule_tomorrow(
            Phase::PrepareToTrade,
            self.job(SalesAction::PredictorStep { epoch }),
        );
    }

    /// Replace the ask-pricing strategy, turning the old one off.
    pub fn set_pricing(&mut self, pricing: Box<dyn AskPricing>) {
        let mut old = std::mem::replace(&mut self.pricing, pricing);
        old.turn_off();
    }

    /// Replace the buyer search, turning the old one off.
    pub fn set_search(&mut self, search: Box<dyn BuyerSearch>) {
        let mut old = std::mem::replace(&mut self.search, search);
        old.turn_off();
    }

    /// Expected price if production grows by `step` units a day.
    pub fn predict_sale_price_after_increasing(
        &mut self,
        market: &dyn Market,
        expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        let mut predictor = self.predictor.take()?;
        let prediction = predictor.predict_after_increasing(self, market, expected_cost, step);
        self.predictor = Some(predictor);
        prediction
    }

    /// Expected price if production shrinks by `step` units a day.
    pub fn predict_sale_price_after_decreasing(
        &mut self,
        market: &dyn Market,
        expected_cost: Price,
        step: u32,
    ) -> Option<Price> {
        let mut predictor = self.predictor.take()?;
        let prediction = predictor.predict_after_decreasing(self, market, expected_cost, step);
        self.predictor = Some(predictor);
        prediction
    }

    /// Expected price if production stays the same.
    pub fn predict_sale_price_unchanged(&mut self, market: &dyn Market) -> Option<Price> {
        let mut predictor = self.predictor.take()?;
        let prediction = predictor.predict_unchanged(self, market);
        self.predictor = Some(predictor);
        prediction
    }

    /// Register a listener; events arrive in registration order.
    pub fn add_listener(&mut self, listener: Box<dyn SalesListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    /// Ask the pricing strategy would set for a good of this type at `cost`.
    pub fn hypothetical_sale_price(&self, cost: Price) -> Price {
        self.pricing
            .price(&Good::hypothetical(self.good_type.clone(), cost))
    }

    /// Best visible competing ask.
    pub fn lowest_opponent_price(&self, market: &dyn Market) -> Option<Price> {
        if market.is_best_sale_price_visible() {
            market.best_sell_price()
        } else {
            None
        }
    }

    /// Quantity-weighted average price of the last week of recorded days,
    /// today excluded.
    pub fn averaged_last_price(&self) -> Option<Decimal> {
        self.last_closing_price?;
        let start = i64::from(self.data.starting_day()?);
        let last = i64::from(self.data.last_observed_day()?);
        let lower = start.max(last - AVERAGED_PRICE_WINDOW);
        let prices = self
            .data
            .between(SalesDataType::AverageClosingPrice, lower, last - 1)?;
        let quantities = self.data.between(SalesDataType::Outflow, lower, last - 1)?;
        weighted_average_price(prices, quantities)
    }

    /// Mean price of today's sales.
    pub fn average_closing_price(&self) -> Option<f64> {
        self.flows.average_closing_price()
    }

    pub fn estimate_supply_gap(&self) -> f64 {
        self.pricing.estimate_supply_gap()
    }

    pub fn last_closing_price(&self) -> Option<Price> {
        self.last_closing_price
    }

    /// Cost of the last good sold.
    pub fn last_closing_cost(&self) -> Option<Price> {
        self.last_closing_cost
    }

    pub fn today_inflow(&self) -> u32 {
        self.flows.inflow
    }

    pub fn today_outflow(&self) -> u32 {
        self.flows.outflow
    }

    /// Computed by the last daily statistics run.
    pub fn days_of_inventory(&self) -> f64 {
        self.days_of_inventory
    }

    pub fn is_selling(&self, good: GoodId) -> bool {
        self.to_sell.contains_key(&good)
    }

    pub fn has_anything_to_sell(&self) -> bool {
        !self.to_sell.is_empty()
    }

    pub fn how_many_to_sell(&self) -> usize {
        self.to_sell.len()
    }

    /// Goods on sale, by id.
    pub fn goods_to_sell(&self) -> impl Iterator<Item = &Good> {
        self.to_sell.values()
    }

    pub fn sale_result(&self, good: GoodId) -> Option<SaleResult> {
        self.results.get(&good).copied()
    }

    /// Resting quote for `good`, if any.
    pub fn quote_for(&self, good: GoodId) -> Option<&SellQuote> {
        self.quoted.get(&good)
    }

    pub fn quoted_goods(&self) -> usize {
        self.quoted.len()
    }

    pub fn statistics(&self) -> &SalesStatistics {
        &self.stats
    }

    /// Daily observations recorded so far.
    pub fn data(&self) -> &DataStorage<SalesDataType> {
        &self.data
    }

    fn ensure_active(&self) -> Result<(), SalesError> {
        if self.active {
            Ok(())
        } else {
            Err(SalesError::Inactive(self.id))
        }
    }

    fn selling(&self, good: GoodId) -> Result<&Good, SalesError> {
        self.to_sell.get(&good).ok_or(SalesError::NotSelling(good))
    }

    fn job(&self, action: SalesAction) -> SalesJob {
        SalesJob {
            department: self.id,
            action,
        }
    }

    fn mark_unsold(&mut self, good: GoodId) {
        self.results.entry(good).or_insert(SaleResult::Unsold);
    }

    fn log_outflow(&mut self, good: Good, price: Price, buyer: AgentId) {
        self.results.insert(
            good.id,
            SaleResult::Sold {
                price,
                previous_cost: good.cost,
            },
        );
        self.last_closing_price = Some(price);
        self.last_closing_cost = Some(good.cost);
        self.flows.record_sale(price);
        for (_, listener) in self.listeners.iter_mut() {
            listener.good_sold_event(self.id, &good, price);
        }
        debug!(department = self.id.0, good = good.id.0, price, buyer = buyer.0, "good sold");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::*;
    use proptest::prelude::*;
    use sales_core::RetryPolicy;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn recorder(dept: &mut SalesDepartment, tag: u32) -> Rc<RefCell<Vec<(u32, SalesEvent)>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        dept.add_listener(Box::new(RecordingListener {
            tag,
            events: events.clone(),
        }));
        events
    }

    fn count_jobs(h: &Harness, action: &SalesAction) -> usize {
        h.scheduler
            .jobs
            .iter()
            .filter(|s| &s.job.action == action)
            .count()
    }

    #[test]
    fn sell_this_checks_preconditions() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        assert_eq!(
            dept.sell_this(beef(1, 50), &mut h.ctx()),
            Err(SalesError::NotOwned(GoodId(1)))
        );

        h.firm.give(2);
        let wheat = Good::new(GoodId(2), GoodType::new("wheat"), 5);
        assert!(matches!(
            dept.sell_this(wheat, &mut h.ctx()),
            Err(SalesError::WrongGoodType { .. })
        ));

        h.firm.give(3);
        dept.sell_this(beef(3, 50), &mut h.ctx()).unwrap();
        assert_eq!(
            dept.sell_this(beef(3, 50), &mut h.ctx()),
            Err(SalesError::AlreadySelling(GoodId(3)))
        );
        assert_eq!(dept.today_inflow(), 1);
        assert_eq!(h.market.registered, vec![AgentId(1)]);
    }

    #[test]
    fn quote_market_places_one_quote_and_never_peddles() {
        let mut h = Harness::quoting();
        h.market.buyers = vec![FixedBuyer::new(9, Some(1_000))];
        let mut dept = h.department(FixedPricing::markup(10));
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        assert_eq!(count_jobs(&h, &SalesAction::PlaceQuote(GoodId(1))), 1);
        assert_eq!(count_jobs(&h, &SalesAction::Peddle(GoodId(1))), 0);

        h.run_today(&mut dept).unwrap();
        assert_eq!(h.market.submissions, 1);
        assert_eq!(h.search_log.borrow().queries, 0);
        assert_eq!(dept.sale_result(GoodId(1)), Some(SaleResult::Quoted));
        assert_eq!(dept.quote_for(GoodId(1)).map(|q| q.price), Some(60));
        assert!(h.firm.has(GoodId(1)));
    }

    #[test]
    fn peddling_after_quoting_is_opt_in() {
        let mut h = Harness::quoting();
        h.market.buyers = vec![FixedBuyer::new(9, Some(80))];
        let config = SalesConfig {
            peddle_after_quoting: true,
            ..SalesConfig::default()
        };
        let mut dept = h.department_with(FixedPricing::markup(10), config);
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        assert_eq!(h.search_log.borrow().queries, 1);
        assert_eq!(dept.last_closing_price(), Some(70));
        assert!(h.market.book.is_empty());
        assert_eq!(dept.quoted_goods(), 0);
    }

    #[test]
    fn daily_statistics_is_scheduled_once() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        for id in 1..=3 {
            h.firm.give(id);
            dept.sell_this(beef(id, 50), &mut h.ctx()).unwrap();
        }
        assert_eq!(count_jobs(&h, &SalesAction::DailyStatistics), 1);
    }

    #[test]
    fn peddle_settles_at_the_midpoint() {
        for (offer, expected) in [(70, 60), (51, 51), (50, 50)] {
            let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(offer))]);
            let mut dept = h.department(FixedPricing::fixed(50));
            h.firm.give(1);
            dept.sell_this(beef(1, 30), &mut h.ctx()).unwrap();
            let outcome = dept.peddle_now(GoodId(1), &mut h.ctx()).unwrap();
            assert_eq!(outcome, PeddleOutcome::Sold { price: expected });
            assert_eq!(
                dept.sale_result(GoodId(1)),
                Some(SaleResult::Sold {
                    price: expected,
                    previous_cost: 30
                })
            );
            assert!(!h.firm.has(GoodId(1)));
            assert!(!dept.is_selling(GoodId(1)));
            assert_eq!(h.search_log.borrow().successes, vec![AgentId(9)]);
            assert_eq!(h.firm.cash, expected);
        }
    }

    #[test]
    fn refused_peddle_is_unsold_and_retried() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(40))]);
        let mut dept = h.department(FixedPricing::fixed(50));
        h.firm.give(1);
        dept.sell_this(beef(1, 30), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();

        assert_eq!(dept.sale_result(GoodId(1)), Some(SaleResult::Unsold));
        assert_eq!(
            h.search_log.borrow().failures,
            vec![(AgentId(9), TradeResult::PriceRejected)]
        );
        let retries: Vec<_> = h
            .scheduler
            .jobs
            .iter()
            .filter(|s| s.job.action == SalesAction::Peddle(GoodId(1)))
            .map(|s| s.day)
            .collect();
        assert_eq!(retries, vec![1]);

        // the next attempt keeps the single unsold record
        h.scheduler.advance();
        h.run_today(&mut dept).unwrap();
        assert_eq!(dept.sale_result(GoodId(1)), Some(SaleResult::Unsold));
        assert_eq!(h.search_log.borrow().failures.len(), 2);
    }

    #[test]
    fn zero_retry_delay_gives_up() {
        let mut h = Harness::peddling(vec![]);
        let config = SalesConfig {
            retry: RetryPolicy::Fixed { days: 0 },
            ..SalesConfig::default()
        };
        let mut dept = h.department_with(FixedPricing::fixed(50), config);
        h.firm.give(1);
        dept.sell_this(beef(1, 30), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        assert_eq!(dept.sale_result(GoodId(1)), Some(SaleResult::Unsold));
        assert_eq!(count_jobs(&h, &SalesAction::Peddle(GoodId(1))), 0);
        assert!(dept.is_selling(GoodId(1)));
    }

    #[test]
    fn downstream_rejection_is_a_failure() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(90))]);
        h.market.refuse_trades = Some(TradeResult::InsufficientFunds);
        let mut dept = h.department(FixedPricing::fixed(50));
        h.firm.give(1);
        dept.sell_this(beef(1, 30), &mut h.ctx()).unwrap();
        let outcome = dept.peddle_now(GoodId(1), &mut h.ctx()).unwrap();
        assert_eq!(outcome, PeddleOutcome::Failed(TradeResult::InsufficientFunds));
        assert!(h.firm.has(GoodId(1)));
        assert_eq!(dept.sale_result(GoodId(1)), Some(SaleResult::Unsold));
    }

    #[test]
    fn immediate_fill_is_logged_once() {
        let mut h = Harness::quoting();
        h.market.fill_next = Some((75, AgentId(9)));
        let mut dept = h.department(FixedPricing::markup(10));
        let events = recorder(&mut dept, 1);
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();

        assert_eq!(
            dept.sale_result(GoodId(1)),
            Some(SaleResult::Sold {
                price: 75,
                previous_cost: 50
            })
        );
        assert_eq!(dept.quoted_goods(), 0);
        assert!(!dept.has_anything_to_sell());
        let sold = events
            .borrow()
            .iter()
            .filter(|(_, e)| matches!(e, SalesEvent::GoodSold(..)))
            .count();
        assert_eq!(sold, 1);
    }

    #[test]
    fn asynchronous_fill_removes_quote_and_logs_once() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        assert!(dept.quote_for(GoodId(1)).is_some());

        assert_eq!(
            dept.react_to_filled_quote(GoodId(1), 60, AgentId(9), &mut h.ctx()),
            Err(SalesError::StillOwned(GoodId(1)))
        );
        h.firm.goods.remove(&GoodId(1));
        dept.react_to_filled_quote(GoodId(1), 60, AgentId(9), &mut h.ctx())
            .unwrap();
        assert!(dept.quote_for(GoodId(1)).is_none());
        assert_eq!(dept.today_outflow(), 1);

        assert_eq!(
            dept.react_to_filled_quote(GoodId(1), 60, AgentId(9), &mut h.ctx()),
            Err(SalesError::NotSelling(GoodId(1)))
        );
        assert_eq!(dept.today_outflow(), 1);
    }

    #[test]
    fn stock_out_fires_for_a_buyer_who_could_pay() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(9, Some(70))]);
        let mut dept = h.department(FixedPricing::fixed(50));
        let events = recorder(&mut dept, 1);
        h.firm.give(1);
        dept.sell_this(beef(1, 30), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        assert_eq!(dept.last_closing_price(), Some(60));

        let poor = FixedBuyer::new(5, Some(59));
        assert_eq!(dept.ask_for_sale_price(&poor, &h.market), Quote::Empty);
        let rich = FixedBuyer::new(6, Some(60));
        let quote = dept.ask_for_sale_price(&rich, &h.market);
        assert!(quote.is_empty());
        assert_eq!(quote.price(), None);

        let stock_outs: Vec<_> = events
            .borrow()
            .iter()
            .filter_map(|(_, e)| match e {
                SalesEvent::StockOut(buyer) => Some(*buyer),
                _ => None,
            })
            .collect();
        assert_eq!(stock_outs, vec![AgentId(6)]);
    }

    #[test]
    fn nothing_ever_sold_means_no_stock_out() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        let events = recorder(&mut dept, 1);
        let buyer = FixedBuyer::new(5, Some(1_000));
        assert_eq!(dept.ask_for_sale_price(&buyer, &h.market), Quote::Empty);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn price_inquiry_returns_cheapest_offer() {
        let mut h = Harness::peddling(vec![]);
        let config = SalesConfig {
            can_peddle: false,
            ..SalesConfig::default()
        };
        let mut dept = h.department_with(FixedPricing::markup(10), config);
        for (id, cost) in [(1, 30), (2, 20), (3, 20)] {
            h.firm.give(id);
            dept.sell_this(beef(id, cost), &mut h.ctx()).unwrap();
        }
        let buyer = FixedBuyer::new(5, Some(100));
        let quote = dept.ask_for_sale_price(&buyer, &h.market);
        let sell = quote.as_sell().unwrap();
        assert_eq!(sell.price, 30);
        assert_eq!(sell.good.as_ref().map(|g| g.id), Some(GoodId(2)));
        assert_eq!(sell.originator, Some(DepartmentId(1)));
    }

    #[test]
    fn price_inquiry_on_a_book_returns_lowest_quote() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        for (id, cost) in [(1, 30), (2, 20)] {
            h.firm.give(id);
            dept.sell_this(beef(id, cost), &mut h.ctx()).unwrap();
        }
        h.run_today(&mut dept).unwrap();
        let buyer = FixedBuyer::new(5, Some(100));
        let quote = dept.ask_for_sale_price(&buyer, &h.market);
        assert_eq!(quote.price(), Some(30));
        assert_ne!(quote.as_sell().map(|q| q.id), Some(QuoteId::UNPLACED));
    }

    #[test]
    fn shop_here_settles_against_own_quote() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();

        let ask = Quote::Sell(dept.quote_for(GoodId(1)).unwrap().clone());
        let bid = Quote::Buy(BuyQuote {
            id: QuoteId(99),
            buyer: AgentId(7),
            price: 80,
            good_type: beef_type(),
        });
        let result = dept.shop_here(&bid, &ask, &mut h.ctx()).unwrap();
        assert_eq!(result, TradeResult::Success { price: 60 });
        assert!(h.market.book.is_empty());
        assert!(!dept.is_selling(GoodId(1)));
        assert!(dept.sale_result(GoodId(1)).unwrap().is_sold());
    }

    #[test]
    fn shop_here_rejects_misuse() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        let own = dept.quote_for(GoodId(1)).unwrap().clone();
        let bid = |price| {
            Quote::Buy(BuyQuote {
                id: QuoteId(99),
                buyer: AgentId(7),
                price,
                good_type: beef_type(),
            })
        };

        let foreign = Quote::Sell(SellQuote {
            originator: Some(DepartmentId(42)),
            ..own.clone()
        });
        assert_eq!(
            dept.shop_here(&bid(80), &foreign, &mut h.ctx()),
            Err(SalesError::ForeignQuote(DepartmentId(1)))
        );
        let no_good = Quote::Sell(SellQuote {
            good: None,
            ..own.clone()
        });
        assert_eq!(
            dept.shop_here(&bid(80), &no_good, &mut h.ctx()),
            Err(SalesError::NoSpecificGood)
        );
        assert_eq!(
            dept.shop_here(&bid(10), &Quote::Sell(own.clone()), &mut h.ctx()),
            Err(SalesError::PricesDoNotCross { bid: 10, ask: 60 })
        );
        assert_eq!(
            dept.shop_here(&Quote::Empty, &Quote::Sell(own), &mut h.ctx()),
            Err(SalesError::NotABuyQuote)
        );
        assert!(dept.is_selling(GoodId(1)));
        assert!(h.firm.has(GoodId(1)));
    }

    #[test]
    fn week_end_rolls_up_one_sold_and_one_unsold() {
        let mut h = Harness::peddling(vec![
            FixedBuyer::new(8, Some(100)),
            FixedBuyer::new(9, None),
        ]);
        let pricing = FixedPricing::fixed(100);
        let probe = pricing.probe.clone();
        let mut dept = h.department(pricing);
        h.firm.give(1);
        h.firm.give(2);
        dept.sell_this(beef(1, 60), &mut h.ctx()).unwrap();
        dept.sell_this(beef(2, 40), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();

        let report = dept.week_end().unwrap();
        assert_eq!(report.sales, 100);
        assert_eq!(report.cogs, 60);
        assert_eq!(report.margin, 40);
        assert_eq!(report.unsold_value, 40);
        assert_eq!(report.goods_sold, 1);
        assert_eq!(report.goods_to_sell, 2);
        assert_eq!(report.sold_percentage, Decimal::new(5, 1));
        assert_eq!(report.sales - report.cogs, report.margin);
        assert_eq!(probe.week_ends.get(), 1);

        // the sold good is purged, the unsold one carries over
        assert_eq!(dept.sale_result(GoodId(1)), None);
        assert_eq!(dept.sale_result(GoodId(2)), Some(SaleResult::Unsold));
        let next = dept.week_end().unwrap();
        assert_eq!(next.sales, 0);
        assert_eq!(next.unsold_value, 40);
        assert_eq!(next.sold_percentage, Decimal::ZERO);
        assert_eq!(dept.statistics().sales().len(), 2);
    }

    #[test]
    fn week_end_refuses_an_unsold_result_without_a_good() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(8, Some(100))]);
        let pricing = FixedPricing::fixed(100);
        let probe = pricing.probe.clone();
        let mut dept = h.department(pricing);
        h.firm.give(1);
        dept.sell_this(beef(1, 60), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        assert!(matches!(dept.sale_result(GoodId(1)), Some(SaleResult::Sold { .. })));

        dept.results.insert(GoodId(99), SaleResult::Unsold);
        assert_eq!(
            dept.week_end(),
            Err(SalesError::Inconsistent {
                good: GoodId(99),
                detail: "unsold result without a good on sale",
            })
        );
        // nothing was rolled up
        assert!(matches!(dept.sale_result(GoodId(1)), Some(SaleResult::Sold { .. })));
        assert_eq!(dept.statistics().weeks_recorded(), 0);
        assert_eq!(probe.week_ends.get(), 0);
    }

    #[test]
    fn quoted_goods_become_unsold_at_week_end() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        let report = dept.week_end().unwrap();
        assert_eq!(report.unsold_value, 50);
        assert_eq!(dept.sale_result(GoodId(1)), Some(SaleResult::Unsold));
        assert!(dept.quote_for(GoodId(1)).is_some());
    }

    #[test]
    fn empty_week_counts_as_fully_sold() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        let report = dept.week_end().unwrap();
        assert_eq!(report.sold_percentage, Decimal::ONE);
        assert_eq!(dept.statistics().last_week_sales(), Some(0));
    }

    #[test]
    fn statistics_keep_only_the_memory_window() {
        let mut h = Harness::quoting();
        let config = SalesConfig {
            memory_length: 2,
            ..SalesConfig::default()
        };
        let mut dept = h.department_with(FixedPricing::markup(10), config);
        for _ in 0..5 {
            dept.week_end().unwrap();
        }
        assert_eq!(dept.statistics().sales().len(), 2);
        assert_eq!(dept.statistics().weeks_recorded(), 5);
    }

    #[test]
    fn update_quotes_withdraws_and_requotes() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        for id in 1..=2 {
            h.firm.give(id);
            dept.sell_this(beef(id, 50), &mut h.ctx()).unwrap();
        }
        h.run_today(&mut dept).unwrap();
        assert_eq!(h.market.book.len(), 2);

        assert_eq!(dept.update_quotes(&mut h.ctx()).unwrap(), 2);
        assert!(h.market.book.is_empty());
        assert_eq!(h.market.removals, 2);
        assert_eq!(dept.sale_result(GoodId(1)), Some(SaleResult::BeingUpdated));

        h.run_today(&mut dept).unwrap();
        assert_eq!(h.market.submissions, 4);
        assert_eq!(h.market.book.len(), 2);
        assert_eq!(dept.sale_result(GoodId(2)), Some(SaleResult::Quoted));
    }

    #[test]
    fn stop_selling_forgets_the_good() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        dept.stop_selling(GoodId(1), &mut h.market).unwrap();
        assert!(!dept.is_selling(GoodId(1)));
        assert_eq!(dept.sale_result(GoodId(1)), None);
        assert!(h.market.book.is_empty());
        assert_eq!(
            dept.stop_selling(GoodId(1), &mut h.market),
            Err(SalesError::NotSelling(GoodId(1)))
        );
    }

    #[test]
    fn listeners_are_notified_in_registration_order() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        let first = recorder(&mut dept, 1);
        let events = Rc::new(RefCell::new(Vec::new()));
        let second = dept.add_listener(Box::new(RecordingListener {
            tag: 2,
            events: first.clone(),
        }));
        let _third = dept.add_listener(Box::new(RecordingListener {
            tag: 3,
            events: events.clone(),
        }));
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        assert_eq!(
            *first.borrow(),
            vec![
                (1, SalesEvent::SellThis(GoodId(1))),
                (2, SalesEvent::SellThis(GoodId(1)))
            ]
        );

        assert!(dept.remove_listener(second));
        assert!(!dept.remove_listener(second));
        h.firm.give(2);
        dept.sell_this(beef(2, 50), &mut h.ctx()).unwrap();
        assert_eq!(first.borrow().len(), 3);
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn turn_off_is_idempotent() {
        let mut h = Harness::quoting();
        let pricing = FixedPricing::markup(10);
        let probe = pricing.probe.clone();
        let mut dept = h.department(pricing);
        let events = recorder(&mut dept, 1);
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        let seen = events.borrow().len();

        dept.turn_off(&mut h.market);
        dept.turn_off(&mut h.market);
        assert!(!dept.is_active());
        assert_eq!(probe.turn_offs.get(), 1);
        assert!(h.search_log.borrow().turned_off);
        assert!(h.market.book.is_empty());
        assert!(!dept.has_anything_to_sell());
        assert_eq!(events.borrow().len(), seen);

        h.firm.give(2);
        assert_eq!(
            dept.sell_this(beef(2, 50), &mut h.ctx()),
            Err(SalesError::Inactive(DepartmentId(1)))
        );
        // the daily job stops rescheduling itself
        h.scheduler.advance();
        h.run_today(&mut dept).unwrap();
        assert!(h.scheduler.jobs.is_empty());
    }

    #[test]
    fn daily_statistics_records_and_resets() {
        let mut h = Harness::peddling(vec![
            FixedBuyer::new(8, Some(100)),
            FixedBuyer::new(9, None),
        ]);
        h.firm.workers = 4;
        let mut dept = h.department(FixedPricing::fixed(100).with_gap(2.0));
        h.firm.give(1);
        h.firm.give(2);
        dept.sell_this(beef(1, 60), &mut h.ctx()).unwrap();
        dept.sell_this(beef(2, 40), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();

        let data = dept.data();
        assert_eq!(data.number_of_observations(), 1);
        assert_eq!(data.latest(SalesDataType::Outflow), Some(1.0));
        assert_eq!(data.latest(SalesDataType::Inflow), Some(2.0));
        assert_eq!(data.latest(SalesDataType::GoodsToSell), Some(1.0));
        assert_eq!(data.latest(SalesDataType::AverageClosingPrice), Some(100.0));
        assert_eq!(data.latest(SalesDataType::SupplyGap), Some(2.0));
        assert_eq!(data.latest(SalesDataType::WorkersProducing), Some(4.0));
        assert!(dept.days_of_inventory().is_infinite());
        assert_eq!(dept.today_inflow(), 0);
        assert_eq!(dept.today_outflow(), 0);
        assert_eq!(count_jobs(&h, &SalesAction::DailyStatistics), 1);

        h.run_days(&mut dept, 3).unwrap();
        assert_eq!(dept.data().number_of_observations(), 3);
    }

    #[test]
    fn averaged_last_price_weights_by_quantity() {
        let mut h = Harness::peddling(vec![FixedBuyer::new(8, Some(100))]);
        let mut dept = h.department(FixedPricing::fixed(100));
        assert_eq!(dept.averaged_last_price(), None);
        for id in 1..=3 {
            h.firm.give(id);
            dept.sell_this(beef(id, 10), &mut h.ctx()).unwrap();
            h.run_today(&mut dept).unwrap();
            h.scheduler.advance();
        }
        assert_eq!(dept.averaged_last_price(), Some(Decimal::from(100)));
    }

    #[test]
    fn lowest_opponent_price_respects_visibility() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        h.firm.give(1);
        dept.sell_this(beef(1, 50), &mut h.ctx()).unwrap();
        h.run_today(&mut dept).unwrap();
        assert_eq!(dept.lowest_opponent_price(&h.market), Some(60));
        h.market.sale_price_visible = false;
        assert_eq!(dept.lowest_opponent_price(&h.market), None);
        assert_eq!(dept.hypothetical_sale_price(5), 15);
    }

    struct CountingPredictor {
        observed: Rc<Cell<u32>>,
        off: Rc<Cell<bool>>,
    }

    impl SalesPredictor for CountingPredictor {
        fn predict_after_increasing(
            &mut self,
            _department: &SalesDepartment,
            _market: &dyn Market,
            _expected_cost: Price,
            step: u32,
        ) -> Option<Price> {
            Some(100 - i64::from(step))
        }

        fn predict_after_decreasing(
            &mut self,
            _department: &SalesDepartment,
            _market: &dyn Market,
            _expected_cost: Price,
            step: u32,
        ) -> Option<Price> {
            Some(100 + i64::from(step))
        }

        fn predict_unchanged(
            &mut self,
            _department: &SalesDepartment,
            _market: &dyn Market,
        ) -> Option<Price> {
            Some(100)
        }

        fn observes_daily(&self) -> bool {
            true
        }

        fn observe(&mut self, _department: &SalesDepartment) {
            self.observed.set(self.observed.get() + 1);
        }

        fn turn_off(&mut self) {
            self.off.set(true);
        }
    }

    fn counting() -> (Box<CountingPredictor>, Rc<Cell<u32>>, Rc<Cell<bool>>) {
        let observed = Rc::new(Cell::new(0));
        let off = Rc::new(Cell::new(false));
        let p = Box::new(CountingPredictor {
            observed: observed.clone(),
            off: off.clone(),
        });
        (p, observed, off)
    }

    #[test]
    fn replaced_predictor_is_turned_off_and_stops_observing() {
        let mut h = Harness::quoting();
        let mut dept = h.department(FixedPricing::markup(10));
        let (first, first_seen, first_off) = counting();
        dept.set_predictor(first, &mut h.scheduler);
        h.run_today(&mut dept).unwrap();
        assert_eq!(first_seen.get(), 1);
        assert_eq!(dept.predict_sale_price_after_increasing(&h.market, 0, 3), Some(97));

        h.scheduler.advance();
        let (second, second_seen, _) = counting();
        dept.set_predictor(second, &mut h.scheduler);
        assert!(first_off.get());
        h.run_today(&mut dept).unwrap();
        assert_eq!(first_seen.get(), 1);
        assert_eq!(second_seen.get(), 1);
        assert_eq!(dept.predict_sale_price_after_decreasing(&h.market, 0, 3), Some(103));
        assert_eq!(dept.predict_sale_price_unchanged(&h.market), Some(100));
    }

    proptest! {
        #[test]
        fn peddle_price_stays_between_ask_and_offer(ask in 0i64..1_000_000, extra in 0i64..1_000_000) {
            let offer = ask + extra;
            let p = peddle_price(ask, offer);
            prop_assert!(p >= ask && p <= offer);
            prop_assert!((2 * p - (ask + offer)).abs() <= 1);
        }
    }
}
