//! Reference markets: a peddling-only market and a one-sided order book
//! where customers post bids and sellers quote asks.

use crate::customer::Customer;
use sales_core::{
    AgentId, BuyQuote, DepartmentId, Good, GoodType, Price, Quote, QuoteId, SellQuote, SellerRole,
    TradeResult,
};
use sales_dept::{Buyer, Firm, Market, Submission};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Trading totals of one day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DayTotals {
    pub trades: u32,
    pub volume: Price,
}

impl DayTotals {
    fn record(&mut self, price: Price) {
        self.trades += 1;
        self.volume += price;
    }

    /// Mean traded price, rounded down.
    pub fn average(&self) -> Option<Price> {
        (self.trades > 0).then(|| self.volume / Price::from(self.trades))
    }
}

/// Market driven by the simulation clock.
pub trait DailyMarket: Market {
    /// Customers come back with fresh demand.
    fn open_day(&mut self);
    /// Settle the day's statistics; returns the day's totals.
    fn close_day(&mut self) -> DayTotals;
    /// A resting bid and a resting ask that cross, best bid first.
    fn next_cross(&self) -> Option<(BuyQuote, SellQuote)> {
        None
    }
    /// Customers still wanting to buy today.
    fn unserved_customers(&self) -> Vec<&Customer>;
    /// Pull a resting bid off the book; false if it was not there.
    fn withdraw_bid(&mut self, _bid: QuoteId) -> bool {
        false
    }
    fn as_market(&self) -> &dyn Market;
    fn as_market_mut(&mut self) -> &mut dyn Market;
}

/// Customers indexed by id, shared by both market kinds.
#[derive(Clone, Debug, Default)]
struct Crowd {
    customers: BTreeMap<AgentId, Customer>,
    today: DayTotals,
    last_average: Option<Price>,
}

impl Crowd {
    fn new(customers: Vec<Customer>) -> Self {
        Self {
            customers: customers.into_iter().map(|c| (c.id(), c)).collect(),
            ..Self::default()
        }
    }

    fn refresh(&mut self) {
        for customer in self.customers.values_mut() {
            customer.refresh();
        }
    }

    fn close(&mut self) -> DayTotals {
        let totals = std::mem::take(&mut self.today);
        if let Some(average) = totals.average() {
            self.last_average = Some(average);
        }
        totals
    }

    fn settle(&mut self, seller: &mut dyn Firm, buyer: AgentId, good: &Good, price: Price) -> TradeResult {
        let Some(customer) = self.customers.get_mut(&buyer) else {
            warn!(buyer = buyer.0, "trade with unknown customer");
            return TradeResult::PriceRejected;
        };
        if customer.remaining() == 0 || price > customer.reservation() {
            return TradeResult::PriceRejected;
        }
        if !seller.deliver(good.id, price) {
            return TradeResult::StockOut;
        }
        customer.buy(price);
        self.today.record(price);
        TradeResult::Success { price }
    }

    fn wants(&self, buyer: AgentId) -> bool {
        self.customers.get(&buyer).is_some_and(|c| c.remaining() > 0)
    }

    fn buyers(&self) -> Vec<&dyn Buyer> {
        self.customers
            .values()
            .filter(|c| c.remaining() > 0)
            .map(|c| c as &dyn Buyer)
            .collect()
    }

    fn unserved(&self) -> Vec<&Customer> {
        self.customers.values().filter(|c| c.remaining() > 0).collect()
    }
}

/// No quotes: sellers must find buyers and sell to them directly.
#[derive(Clone, Debug)]
pub struct PeddlingMarket {
    good_type: GoodType,
    crowd: Crowd,
    sellers: Vec<AgentId>,
}

impl PeddlingMarket {
    pub fn new(good_type: GoodType, customers: Vec<Customer>) -> Self {
        Self {
            good_type,
            crowd: Crowd::new(customers),
            sellers: Vec::new(),
        }
    }

    /// Registered sellers.
    pub fn sellers(&self) -> &[AgentId] {
        &self.sellers
    }
}

impl Market for PeddlingMarket {
    fn good_type(&self) -> &GoodType {
        &self.good_type
    }

    fn seller_role(&self) -> SellerRole {
        SellerRole::NoQuote
    }

    fn register_seller(&mut self, seller: AgentId) {
        self.sellers.push(seller);
    }

    fn submit_sell_quote(
        &mut self,
        seller: &mut dyn Firm,
        price: Price,
        good: &Good,
        originator: DepartmentId,
    ) -> Submission {
        // nothing rests here; hand the quote back unplaced
        warn!(seller = seller.id().0, "sell quote submitted to a peddling market");
        Submission::Resting(SellQuote {
            id: QuoteId::UNPLACED,
            seller: seller.id(),
            price,
            good: Some(good.clone()),
            originator: Some(originator),
        })
    }

    fn remove_sell_quote(&mut self, _quote: &SellQuote) -> bool {
        false
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
        self.crowd.settle(seller, buyer, good, price)
    }

    fn best_buy_price(&self) -> Option<Price> {
        None
    }

    fn best_sell_price(&self) -> Option<Price> {
        None
    }

    fn is_best_buy_price_visible(&self) -> bool {
        false
    }

    fn is_best_sale_price_visible(&self) -> bool {
        false
    }

    fn average_closing_price(&self) -> Option<Price> {
        self.crowd.last_average
    }

    fn buyers(&self) -> Vec<&dyn Buyer> {
        self.crowd.buyers()
    }
}

impl DailyMarket for PeddlingMarket {
    fn open_day(&mut self) {
        self.crowd.refresh();
    }

    fn close_day(&mut self) -> DayTotals {
        self.crowd.close()
    }

    fn unserved_customers(&self) -> Vec<&Customer> {
        self.crowd.unserved()
    }

    fn as_market(&self) -> &dyn Market {
        self
    }

    fn as_market_mut(&mut self) -> &mut dyn Market {
        self
    }
}

/// Day-order book: customers bid their reservation price for each unit
/// they want, sellers rest asks. An arriving ask that crosses the best bid
/// fills at the ask right away.
#[derive(Clone, Debug)]
pub struct OrderBookMarket {
    good_type: GoodType,
    crowd: Crowd,
    sellers: Vec<AgentId>,
    bids: BTreeMap<QuoteId, BuyQuote>,
    asks: BTreeMap<QuoteId, SellQuote>,
    next_quote: u64,
}

impl OrderBookMarket {
    pub fn new(good_type: GoodType, customers: Vec<Customer>) -> Self {
        Self {
            good_type,
            crowd: Crowd::new(customers),
            sellers: Vec::new(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            next_quote: 0,
        }
    }

    /// Registered sellers.
    pub fn sellers(&self) -> &[AgentId] {
        &self.sellers
    }

    /// Resting bids.
    pub fn bids(&self) -> usize {
        self.bids.len()
    }

    /// Resting asks.
    pub fn asks(&self) -> usize {
        self.asks.len()
    }

    fn quote_id(&mut self) -> QuoteId {
        self.next_quote += 1;
        QuoteId(self.next_quote)
    }

    /// Highest bid of a customer still buying, earliest first among equals.
    fn best_bid(&self) -> Option<&BuyQuote> {
        self.bids
            .values()
            .filter(|bid| self.crowd.wants(bid.buyer))
            .fold(None, |best: Option<&BuyQuote>, bid| match best {
                Some(b) if b.price >= bid.price => Some(b),
                _ => Some(bid),
            })
    }

    /// Lowest ask, earliest first among equals.
    fn best_ask(&self) -> Option<&SellQuote> {
        self.asks.values().min_by_key(|a| (a.price, a.id))
    }

    fn post_bids(&mut self) {
        let wanted: Vec<(AgentId, Price, u32)> = self
            .crowd
            .customers
            .values()
            .map(|c| (c.id(), c.reservation(), c.remaining()))
            .collect();
        for (buyer, price, units) in wanted {
            for _ in 0..units {
                let id = self.quote_id();
                self.bids.insert(
                    id,
                    BuyQuote {
                        id,
                        buyer,
                        price,
                        good_type: self.good_type.clone(),
                    },
                );
            }
        }
    }
}

impl Market for OrderBookMarket {
    fn good_type(&self) -> &GoodType {
        &self.good_type
    }

    fn seller_role(&self) -> SellerRole {
        SellerRole::Quote
    }

    fn register_seller(&mut self, seller: AgentId) {
        self.sellers.push(seller);
    }

    fn submit_sell_quote(
        &mut self,
        seller: &mut dyn Firm,
        price: Price,
        good: &Good,
        originator: DepartmentId,
    ) -> Submission {
        if let Some(bid) = self.best_bid().filter(|b| b.price >= price).cloned() {
            let clearing = self.clearing_price(price, bid.price);
            if let TradeResult::Success { price } = self.crowd.settle(seller, bid.buyer, good, clearing) {
                self.bids.remove(&bid.id);
                debug!(good = good.id.0, buyer = bid.buyer.0, price, "ask filled on arrival");
                return Submission::Filled {
                    price,
                    buyer: bid.buyer,
                };
            }
        }
        let quote = SellQuote {
            id: self.quote_id(),
            seller: seller.id(),
            price,
            good: Some(good.clone()),
            originator: Some(originator),
        };
        self.asks.insert(quote.id, quote.clone());
        Submission::Resting(quote)
    }

    fn remove_sell_quote(&mut self, quote: &SellQuote) -> bool {
        self.asks.remove(&quote.id).is_some()
    }

    fn trade(
        &mut self,
        seller: &mut dyn Firm,
        buyer: AgentId,
        good: &Good,
        price: Price,
        buyer_quote: &Quote,
        _seller_quote: &Quote,
    ) -> TradeResult {
        let result = self.crowd.settle(seller, buyer, good, price);
        if result.is_success() {
            if let Quote::Buy(bid) = buyer_quote {
                self.bids.remove(&bid.id);
            }
        }
        result
    }

    fn best_buy_price(&self) -> Option<Price> {
        self.best_bid().map(|b| b.price)
    }

    fn best_sell_price(&self) -> Option<Price> {
        self.best_ask().map(|a| a.price)
    }

    fn average_closing_price(&self) -> Option<Price> {
        self.crowd.last_average
    }

    fn buyers(&self) -> Vec<&dyn Buyer> {
        self.crowd.buyers()
    }
}

impl DailyMarket for OrderBookMarket {
    fn open_day(&mut self) {
        self.bids.clear();
        self.crowd.refresh();
        self.post_bids();
    }

    fn close_day(&mut self) -> DayTotals {
        self.bids.clear();
        self.crowd.close()
    }

    fn next_cross(&self) -> Option<(BuyQuote, SellQuote)> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        (bid.price >= ask.price).then(|| (bid.clone(), ask.clone()))
    }

    fn unserved_customers(&self) -> Vec<&Customer> {
        self.crowd.unserved()
    }

    fn withdraw_bid(&mut self, bid: QuoteId) -> bool {
        self.bids.remove(&bid).is_some()
    }

    fn as_market(&self) -> &dyn Market {
        self
    }

    fn as_market_mut(&mut self) -> &mut dyn Market {
        self
    }
}
