#![deny(warnings)]

//! Headless CLI: load a sales scenario, run it and print weekly KPIs.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sales_runtime::{RunSummary, ScenarioConfig, Simulation, WeekSummary};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<PathBuf>,
    days: Option<u32>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next().map(PathBuf::from),
            "--days" => args.days = it.next().and_then(|s| s.parse().ok()),
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

#[derive(Serialize)]
struct Output<'a> {
    weeks: &'a [WeekSummary],
    summary: &'a RunSummary,
}

fn price(p: Option<i64>) -> String {
    p.map_or_else(|| "-".to_string(), |p| p.to_string())
}

fn percent(share: Decimal) -> String {
    format!("{:.1}%", share * Decimal::ONE_HUNDRED)
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(
        scenario = ?args.scenario,
        days = ?args.days,
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        "starting CLI"
    );

    let mut scenario = match &args.scenario {
        Some(path) => ScenarioConfig::load(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };
    if let Some(days) = args.days {
        scenario.days = days;
    }

    let mut sim = Simulation::new(scenario).context("building simulation")?;
    let summary = sim.run().context("running simulation")?;

    if args.json {
        let output = Output {
            weeks: sim.weeks(),
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let s = sim.scenario();
    println!(
        "Scenario OK | {} | market: {:?} | customers: {} | days: {} | predictor: {}",
        s.name,
        s.market,
        s.customers.count,
        summary.days,
        s.predictor.name()
    );
    for week in sim.weeks() {
        let r = &week.report;
        println!(
            "KPI | week {} ({}) | sales: {} | cogs: {} | margin: {} | unsold: {} | sold: {} | last price: {} | predicted: {} / +1: {} | stock-outs: {}",
            r.week,
            week.ending,
            r.sales,
            r.cogs,
            r.margin,
            r.unsold_value,
            percent(r.sold_percentage),
            price(week.last_price),
            price(week.predicted_price),
            price(week.predicted_price_up),
            week.stock_outs
        );
    }
    println!(
        "Summary | weeks: {} | produced: {} | sold: {} ({}) | revenue: {} | inventory: {} | last price: {} | avg weekly sales: {}",
        summary.weeks,
        summary.produced,
        summary.sold,
        percent(summary.sold_percentage),
        summary.revenue,
        summary.inventory,
        price(summary.last_price),
        summary
            .average_sales
            .map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
    );

    Ok(())
}
