//! Weekly rollup and daily flow counters.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sales_core::Price;
use serde::Serialize;
use std::collections::VecDeque;

/// Fixed-capacity FIFO of the most recent values.
#[derive(Clone, Debug)]
pub struct RollingWindow<T> {
    capacity: usize,
    values: VecDeque<T>,
}

impl<T> RollingWindow<T> {
    /// Window holding at most `capacity` values (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append `value`, returning the evicted oldest value if the window was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        self.values.push_back(value);
        if self.values.len() > self.capacity {
            self.values.pop_front()
        } else {
            None
        }
    }

    /// Newest value.
    pub fn last(&self) -> Option<&T> {
        self.values.back()
    }

    /// Oldest value.
    pub fn first(&self) -> Option<&T> {
        self.values.front()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing was pushed yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Maximum number of stored values.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Drop every value.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// One finalized accounting week.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WeeklyReport {
    /// Week number, starting at 1.
    pub week: u32,
    /// Revenue of goods sold this week.
    pub sales: Price,
    /// Cost of the goods sold this week.
    pub cogs: Price,
    /// `sales - cogs`.
    pub margin: Price,
    /// Cost value of goods offered and not sold.
    pub unsold_value: Price,
    /// Goods sold.
    pub goods_sold: u32,
    /// Goods with a sale result this week.
    pub goods_to_sell: u32,
    /// `goods_sold / goods_to_sell`, 1 when nothing was for sale.
    pub sold_percentage: Decimal,
}

/// Share of goods sold; 1 when nothing was for sale.
///
/// Example:
/// assert_eq!(sold_percentage(1, 2), Decimal::new(5, 1));
/// assert_eq!(sold_percentage(0, 0), Decimal::ONE);
pub fn sold_percentage(goods_sold: u32, goods_to_sell: u32) -> Decimal {
    if goods_to_sell == 0 {
        Decimal::ONE
    } else {
        (Decimal::from(goods_sold) / Decimal::from(goods_to_sell)).normalize()
    }
}

/// Rolling weekly totals kept by a department.
#[derive(Clone, Debug)]
pub struct SalesStatistics {
    sales: RollingWindow<Price>,
    cogs: RollingWindow<Price>,
    margin: RollingWindow<Price>,
    unsold: RollingWindow<Price>,
    goods_sold_last_week: u32,
    goods_to_sell_last_week: u32,
    sold_percentage: Decimal,
    weeks: u32,
}

impl SalesStatistics {
    /// Statistics remembering `memory_length` weeks.
    pub fn new(memory_length: usize) -> Self {
        Self {
            sales: RollingWindow::new(memory_length),
            cogs: RollingWindow::new(memory_length),
            margin: RollingWindow::new(memory_length),
            unsold: RollingWindow::new(memory_length),
            goods_sold_last_week: 0,
            goods_to_sell_last_week: 0,
            sold_percentage: Decimal::ONE,
            weeks: 0,
        }
    }

    /// Close a week and push its aggregates.
    pub fn record_week(
        &mut self,
        sales: Price,
        cogs: Price,
        unsold_value: Price,
        goods_sold: u32,
        goods_to_sell: u32,
    ) -> WeeklyReport {
        let margin = sales - cogs;
        self.weeks += 1;
        self.sales.push(sales);
        self.cogs.push(cogs);
        self.margin.push(margin);
        self.unsold.push(unsold_value);
        self.goods_sold_last_week = goods_sold;
        self.goods_to_sell_last_week = goods_to_sell;
        self.sold_percentage = sold_percentage(goods_sold, goods_to_sell);
        WeeklyReport {
            week: self.weeks,
            sales,
            cogs,
            margin,
            unsold_value,
            goods_sold,
            goods_to_sell,
            sold_percentage: self.sold_percentage,
        }
    }

    /// Last week's revenue.
    pub fn last_week_sales(&self) -> Option<Price> {
        self.sales.last().copied()
    }

    /// Last week's cost of goods sold.
    pub fn last_week_cogs(&self) -> Option<Price> {
        self.cogs.last().copied()
    }

    /// Last week's gross margin.
    pub fn last_week_margin(&self) -> Option<Price> {
        self.margin.last().copied()
    }

    /// Last week's unsold inventory value.
    pub fn last_week_unsold_value(&self) -> Option<Price> {
        self.unsold.last().copied()
    }

    pub fn sales(&self) -> &RollingWindow<Price> {
        &self.sales
    }

    pub fn cogs(&self) -> &RollingWindow<Price> {
        &self.cogs
    }

    pub fn margin(&self) -> &RollingWindow<Price> {
        &self.margin
    }

    pub fn unsold(&self) -> &RollingWindow<Price> {
        &self.unsold
    }

    pub fn goods_sold_last_week(&self) -> u32 {
        self.goods_sold_last_week
    }

    pub fn goods_to_sell_last_week(&self) -> u32 {
        self.goods_to_sell_last_week
    }

    /// Share sold last week; 1 before the first week closes.
    pub fn sold_percentage(&self) -> Decimal {
        self.sold_percentage
    }

    /// Weeks closed so far.
    pub fn weeks_recorded(&self) -> u32 {
        self.weeks
    }

    pub fn clear(&mut self) {
        self.sales.clear();
        self.cogs.clear();
        self.margin.clear();
        self.unsold.clear();
    }
}

/// Counters reset at the end of every simulated day.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DailyFlows {
    /// Goods tasked for sale today.
    pub inflow: u32,
    /// Goods sold today.
    pub outflow: u32,
    /// Sum of today's sale prices.
    pub sum_closing_price: Price,
}

impl DailyFlows {
    /// Count a sale at `price`.
    pub fn record_sale(&mut self, price: Price) {
        self.outflow += 1;
        self.sum_closing_price += price;
    }

    /// Mean of today's sale prices.
    pub fn average_closing_price(&self) -> Option<f64> {
        (self.outflow > 0).then(|| self.sum_closing_price as f64 / f64::from(self.outflow))
    }

    pub fn reset(&mut self) {
        *self = DailyFlows::default();
    }
}

/// Days the current inventory lasts at today's pace: 0 with no inventory,
/// infinite unless more goods leave than arrive.
pub fn days_of_inventory(inventory: usize, inflow: u32, outflow: u32) -> f64 {
    if inventory == 0 {
        return 0.0;
    }
    let net_outflow = i64::from(outflow) - i64::from(inflow);
    if net_outflow > 0 {
        inventory as f64 / net_outflow as f64
    } else {
        f64::INFINITY
    }
}

/// Quantity-weighted average price, sum(p_i * q_i) / sum(q_i). Days with a
/// negative or missing price are skipped; `None` without traded quantity.
pub fn weighted_average_price(prices: &[f64], quantities: &[f64]) -> Option<Decimal> {
    if prices.len() != quantities.len() {
        return None;
    }
    let mut num = Decimal::ZERO;
    let mut den = Decimal::ZERO;
    for (&p, &q) in prices.iter().zip(quantities) {
        if !(p.is_finite() && p >= 0.0 && q.is_finite() && q > 0.0) {
            continue;
        }
        let p = Decimal::from_f64(p)?;
        let q = Decimal::from_f64(q)?;
        num += p * q;
        den += q;
    }
    if den.is_zero() {
        return None;
    }
    Some(num / den)
}
