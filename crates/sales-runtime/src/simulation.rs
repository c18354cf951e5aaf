//! Day loop wiring a firm, its sales department and a market together.

use crate::customer::draw_customers;
use crate::firm::ProducerFirm;
use crate::market::{DailyMarket, OrderBookMarket, PeddlingMarket};
use crate::scenario::{MarketKind, ScenarioConfig, ScenarioError};
use crate::scheduler::PhaseScheduler;
use crate::search::SampleBuyerSearch;
use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use sales_core::{AgentId, DepartmentId, Good, GoodType, Phase, Price, Quote};
use sales_dept::stats::sold_percentage;
use sales_dept::{SalesContext, SalesDepartment, SalesError, SalesListener, Scheduler, WeeklyReport};
use sales_predict::{MovingAverage, PredictError, PredictorSpec};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

const FIRM: AgentId = AgentId(1);
const DEPARTMENT: DepartmentId = DepartmentId(1);
const FIRST_CUSTOMER: u32 = 1000;
/// Weeks averaged in the sales KPI.
const SALES_AVERAGE_WEEKS: usize = 4;
const DAYS_PER_WEEK: u32 = 7;

/// Department events counted since the last week end.
#[derive(Clone, Copy, Debug, Default)]
struct Tally {
    tasked: u32,
    sold: u32,
    stock_outs: u32,
}

struct TallyListener(Rc<RefCell<Tally>>);

impl SalesListener for TallyListener {
    fn sell_this_event(&mut self, _firm: AgentId, _department: DepartmentId, _good: &Good) {
        self.0.borrow_mut().tasked += 1;
    }

    fn stock_out_event(&mut self, _firm: AgentId, _department: DepartmentId, _buyer: AgentId) {
        self.0.borrow_mut().stock_outs += 1;
    }

    fn good_sold_event(&mut self, _department: DepartmentId, _good: &Good, _price: Price) {
        self.0.borrow_mut().sold += 1;
    }
}

/// KPIs of one closed week.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeekSummary {
    /// Date of the week's last day.
    pub ending: NaiveDate,
    pub report: WeeklyReport,
    /// Units tasked for sale this week.
    pub produced: u32,
    /// Customers turned away with nothing to buy.
    pub stock_outs: u32,
    pub last_price: Option<Price>,
    /// Predicted price with production unchanged.
    pub predicted_price: Option<Price>,
    /// Predicted price after producing one more unit a day.
    pub predicted_price_up: Option<Price>,
    /// Moving average of weekly sales.
    pub average_sales: Option<f64>,
}

/// Totals of a whole run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub start_date: NaiveDate,
    pub days: u32,
    pub weeks: usize,
    pub produced: u64,
    pub sold: u32,
    pub sold_percentage: Decimal,
    pub revenue: Price,
    pub inventory: usize,
    pub last_price: Option<Price>,
    pub average_sales: Option<f64>,
}

/// A single-firm, single-market simulation.
pub struct Simulation {
    scenario: ScenarioConfig,
    scheduler: PhaseScheduler,
    market: Box<dyn DailyMarket>,
    firm: ProducerFirm,
    department: SalesDepartment,
    tally: Rc<RefCell<Tally>>,
    sold_total: u32,
    weekly_sales: MovingAverage,
    weeks: Vec<WeekSummary>,
}

impl Simulation {
    pub fn new(scenario: ScenarioConfig) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let good_type = GoodType::new(scenario.good_type.clone());
        let mut rng = ChaCha8Rng::seed_from_u64(scenario.seed);
        let customers = draw_customers(&scenario.customers, FIRST_CUSTOMER, &mut rng);
        let mut market: Box<dyn DailyMarket> = match scenario.market {
            MarketKind::OrderBook => Box::new(OrderBookMarket::new(good_type.clone(), customers)),
            MarketKind::Peddling => Box::new(PeddlingMarket::new(good_type.clone(), customers)),
        };
        let firm = ProducerFirm::new(
            FIRM,
            good_type,
            scenario.production.unit_cost,
            scenario.production.daily_on(0),
        );

        let mut scheduler = PhaseScheduler::new();
        let mut department = SalesDepartment::new(
            DEPARTMENT,
            FIRM,
            market.as_market_mut(),
            scenario.sales.clone(),
            scenario.pricing.build(),
            Box::new(SampleBuyerSearch::new(scenario.search_sample, scenario.seed.wrapping_add(1))),
        )?;
        let tally = Rc::new(RefCell::new(Tally::default()));
        department.add_listener(Box::new(TallyListener(tally.clone())));
        department.set_predictor(scenario.predictor.build()?, &mut scheduler);

        info!(
            scenario = %scenario.name,
            market = ?scenario.market,
            customers = scenario.customers.count,
            predictor = scenario.predictor.name(),
            "simulation ready"
        );
        Ok(Self {
            weekly_sales: MovingAverage::new(SALES_AVERAGE_WEEKS)?,
            scenario,
            scheduler,
            market,
            firm,
            department,
            tally,
            sold_total: 0,
            weeks: Vec::new(),
        })
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    /// Next day to run.
    pub fn today(&self) -> u32 {
        self.scheduler.today()
    }

    pub fn department(&self) -> &SalesDepartment {
        &self.department
    }

    pub fn firm(&self) -> &ProducerFirm {
        &self.firm
    }

    pub fn market(&self) -> &dyn DailyMarket {
        &*self.market
    }

    /// Closed weeks so far.
    pub fn weeks(&self) -> &[WeekSummary] {
        &self.weeks
    }

    /// Swap the department's predictor mid-run.
    pub fn set_predictor(&mut self, spec: &PredictorSpec) -> Result<(), PredictError> {
        let predictor = spec.build()?;
        self.department.set_predictor(predictor, &mut self.scheduler);
        Ok(())
    }

    /// Run the scenario's number of days and summarize.
    pub fn run(&mut self) -> Result<RunSummary, SalesError> {
        self.run_days(self.scenario.days)?;
        Ok(self.summary())
    }

    pub fn run_days(&mut self, days: u32) -> Result<(), SalesError> {
        for _ in 0..days {
            self.run_day()?;
        }
        Ok(())
    }

    /// Run every phase of the current day, then move the clock on.
    pub fn run_day(&mut self) -> Result<(), SalesError> {
        let day = self.scheduler.today();
        for phase in Phase::ALL {
            self.scheduler.enter(phase);
            match phase {
                Phase::Dawn => {
                    self.market.open_day();
                    let daily = self.scenario.production.daily_on(day);
                    if daily != self.firm.daily_production() {
                        self.firm.set_daily_production(daily);
                    }
                    self.run_jobs()?;
                }
                Phase::Trade => {
                    self.run_jobs()?;
                    self.match_customers()?;
                }
                Phase::Production => {
                    self.produce()?;
                    self.run_jobs()?;
                }
                Phase::AdjustPrices => {
                    self.run_jobs()?;
                    if (day + 1) % DAYS_PER_WEEK == 0 {
                        self.close_week(day)?;
                    }
                }
                Phase::Cleanup => {
                    self.run_jobs()?;
                    let totals = self.market.close_day();
                    debug!(day, trades = totals.trades, volume = totals.volume, "day closed");
                }
                _ => self.run_jobs()?,
            }
        }
        self.scheduler.advance_day();
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        let produced = self.firm.produced();
        let tasked = u32::try_from(produced).unwrap_or(u32::MAX);
        RunSummary {
            scenario: self.scenario.name.clone(),
            start_date: self.scenario.start_date,
            days: self.scheduler.today(),
            weeks: self.weeks.len(),
            produced,
            sold: self.sold_total + self.tally.borrow().sold,
            sold_percentage: sold_percentage(self.sold_total + self.tally.borrow().sold, tasked),
            revenue: self.firm.cash(),
            inventory: self.firm.inventory(),
            last_price: self.department.last_closing_price(),
            average_sales: self.weekly_sales.value(),
        }
    }

    fn run_jobs(&mut self) -> Result<(), SalesError> {
        while let Some(job) = self.scheduler.pop_due() {
            if job.department != self.department.id() {
                warn!(department = job.department.0, "job for unknown department dropped");
                continue;
            }
            let mut ctx = SalesContext {
                firm: &mut self.firm,
                market: self.market.as_market_mut(),
                scheduler: &mut self.scheduler,
            };
            self.department.handle(job.action, &mut ctx)?;
        }
        Ok(())
    }

    /// Customers take crossing asks off the book, then those left empty
    /// handed ask the department for a price.
    fn match_customers(&mut self) -> Result<(), SalesError> {
        while let Some((bid, ask)) = self.market.next_cross() {
            if ask.originator != Some(self.department.id()) {
                warn!(quote = ask.id.0, "crossing ask from unknown department");
                break;
            }
            let mut ctx = SalesContext {
                firm: &mut self.firm,
                market: self.market.as_market_mut(),
                scheduler: &mut self.scheduler,
            };
            let bid_id = bid.id;
            let result = self
                .department
                .shop_here(&Quote::Buy(bid), &Quote::Sell(ask), &mut ctx)?;
            // a refused bid would keep crossing; drop it and serve the rest
            if !result.is_success() && !self.market.withdraw_bid(bid_id) {
                break;
            }
        }
        if !self.department.has_anything_to_sell() {
            let market = &*self.market;
            for customer in market.unserved_customers() {
                self.department.ask_for_sale_price(customer, market.as_market());
            }
        }
        Ok(())
    }

    fn produce(&mut self) -> Result<(), SalesError> {
        for good in self.firm.produce() {
            let mut ctx = SalesContext {
                firm: &mut self.firm,
                market: self.market.as_market_mut(),
                scheduler: &mut self.scheduler,
            };
            self.department.sell_this(good, &mut ctx)?;
        }
        Ok(())
    }

    fn close_week(&mut self, day: u32) -> Result<(), SalesError> {
        let report = self.department.week_end()?;
        self.weekly_sales.add(report.sales as f64);
        let tally = std::mem::take(&mut *self.tally.borrow_mut());
        self.sold_total += tally.sold;

        let market = self.market.as_market();
        let predicted_price = self.department.predict_sale_price_unchanged(market);
        let predicted_price_up =
            self.department
                .predict_sale_price_after_increasing(market, self.firm.unit_cost(), 1);
        let summary = WeekSummary {
            ending: self.scenario.date_of(day),
            report,
            produced: tally.tasked,
            stock_outs: tally.stock_outs,
            last_price: self.department.last_closing_price(),
            predicted_price,
            predicted_price_up,
            average_sales: self.weekly_sales.value(),
        };
        info!(
            week = summary.report.week,
            ending = %summary.ending,
            stock_outs = summary.stock_outs,
            predicted = ?summary.predicted_price,
            "week summarized"
        );
        self.weeks.push(summary);

        let mut ctx = SalesContext {
            firm: &mut self.firm,
            market: self.market.as_market_mut(),
            scheduler: &mut self.scheduler,
        };
        self.department.update_quotes(&mut ctx)?;
        Ok(())
    }
}
