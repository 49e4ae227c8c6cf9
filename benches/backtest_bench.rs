//! Performance benchmarks for the ledger and the simulation loop.
//!
//! Run with: cargo bench

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quillback::data::MemoryPrices;
use quillback::engine::{BacktestConfig, BacktestEngine};
use quillback::metrics::calculate_performance_metrics;
use quillback::portfolio::Portfolio;
use quillback::signal::MomentumSignals;
use quillback::types::{PriceBar, RebalanceFrequency, ValueSnapshot};

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

/// Synthetic daily bars for benchmarking.
fn generate_bars(count: usize) -> Vec<PriceBar> {
    let mut price = 100.0;
    (0..count)
        .map(|i| {
            let noise = ((i as f64 * 0.7).sin() * 2.0 + (i as f64 * 1.3).cos()) * 0.5;
            price += 0.001 * price + noise;
            price = price.max(50.0);

            PriceBar::new(
                start_date() + Duration::days(i as i64),
                price - 1.0,
                price + 2.0,
                price - 2.0,
                price + 0.5,
                1_000_000.0,
            )
        })
        .collect()
}

/// Benchmark the four ledger operations in a tight alternating loop.
fn bench_portfolio_ops(c: &mut Criterion) {
    c.bench_function("portfolio_long_round_trips", |b| {
        b.iter(|| {
            let mut p = Portfolio::new(1_000_000.0, 0.5);
            for i in 0..1_000u64 {
                let price = 50.0 + (i % 10) as f64;
                p.buy("X", black_box(100), price);
                p.sell("X", black_box(60), price);
            }
            p.cash
        })
    });

    c.bench_function("portfolio_short_round_trips", |b| {
        b.iter(|| {
            let mut p = Portfolio::new(1_000_000.0, 0.5);
            for i in 0..1_000u64 {
                let price = 50.0 + (i % 10) as f64;
                p.short_open("X", black_box(100), price);
                p.short_cover("X", black_box(60), price);
            }
            p.cash
        })
    });
}

/// Benchmark the metrics calculator over value-series sizes.
fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    for size in [252, 1_260, 2_520].iter() {
        let snapshots: Vec<ValueSnapshot> = (0..*size)
            .map(|i| {
                let wobble = ((i as f64) * 0.1).sin() * 500.0;
                ValueSnapshot::new(
                    start_date() + Duration::days(i as i64),
                    100_000.0 + i as f64 * 10.0 + wobble,
                )
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("calculate", size), &snapshots, |b, s| {
            b.iter(|| calculate_performance_metrics(black_box(s)))
        });
    }
    group.finish();
}

/// Benchmark a full single-instrument run with the momentum provider.
fn bench_engine_run(c: &mut Criterion) {
    let mut prices = MemoryPrices::new();
    prices.add("BENCH", generate_bars(400));

    let mut config = BacktestConfig::new(
        vec!["BENCH".to_string()],
        start_date() + Duration::days(70),
        start_date() + Duration::days(390),
    );
    config.show_progress = false;
    config.benchmark = None;
    config.workers = 2;
    config.rebalance_frequency = RebalanceFrequency::Weekly;

    let engine = BacktestEngine::new(config);
    let signals = MomentumSignals::default();

    c.bench_function("engine_run_320_days", |b| {
        b.iter(|| engine.run(black_box(&prices), &signals).unwrap())
    });
}

criterion_group!(benches, bench_portfolio_ops, bench_metrics, bench_engine_run);
criterion_main!(benches);
