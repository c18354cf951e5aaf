use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sales_predict::{PredictorSpec, RecursiveConfig};
use sales_runtime::{MarketKind, ScenarioConfig, Simulation};

fn scenario(market: MarketKind, predictor: PredictorSpec) -> ScenarioConfig {
    ScenarioConfig {
        market,
        predictor,
        ..ScenarioConfig::default()
    }
}

fn bench_days(c: &mut Criterion) {
    let mut sim = Simulation::new(scenario(MarketKind::OrderBook, PredictorSpec::Memory)).unwrap();
    c.bench_function("order_book_day", |b| {
        b.iter(|| {
            let _ = black_box(sim.run_day());
        })
    });

    let recursive = PredictorSpec::Recursive(RecursiveConfig {
        burn_in: 30,
        ..RecursiveConfig::default()
    });
    let mut sim = Simulation::new(scenario(MarketKind::Peddling, recursive)).unwrap();
    c.bench_function("peddling_day_recursive", |b| {
        b.iter(|| {
            let _ = black_box(sim.run_day());
        })
    });
}

criterion_group!(benches, bench_days);
criterion_main!(benches);
