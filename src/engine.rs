//! Backtest engine: the day-by-day simulation loop.

use crate::calendar::{business_days, rebalance_days};
use crate::data::{PriceProvider, PriceTable};
use crate::error::{BacktestError, Result};
use crate::metrics::{calculate_performance_metrics, PerformanceMetrics};
use crate::portfolio::Portfolio;
use crate::signal::SignalProvider;
use crate::sizing::{size_position, DEFAULT_MAX_POSITION_PCT};
use crate::types::{Action, RebalanceFrequency, Signal, TradeRecord, ValueSnapshot};
use chrono::{Duration, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Configuration for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Instrument universe.
    pub tickers: Vec<String>,
    /// First simulated day (inclusive).
    pub start_date: NaiveDate,
    /// Last simulated day (inclusive).
    pub end_date: NaiveDate,
    /// Starting cash.
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    /// Fraction of short proceeds pledged as collateral.
    #[serde(default = "default_margin")]
    pub margin_requirement: f64,
    /// How often signals are queried and trades executed.
    #[serde(default)]
    pub rebalance_frequency: RebalanceFrequency,
    /// Strategy identifier, opaque to the engine; used to pick the signal
    /// provider and echoed in logs.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Benchmark ticker for the buy-and-hold comparison.
    #[serde(default = "default_benchmark")]
    pub benchmark: Option<String>,
    /// Worker pool size for the rebalance-day signal fan-out.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Cap on any single position as a fraction of portfolio value.
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,
    /// Calendar days of history fetched before `start_date` to seed signal
    /// lookbacks.
    #[serde(default = "default_warmup_days")]
    pub warmup_days: i64,
    /// Show a progress bar while running.
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

fn default_capital() -> f64 {
    100_000.0
}
fn default_margin() -> f64 {
    0.5
}
fn default_strategy() -> String {
    "momentum".to_string()
}
fn default_benchmark() -> Option<String> {
    Some("SPY".to_string())
}
fn default_workers() -> usize {
    10
}
fn default_max_position_pct() -> f64 {
    DEFAULT_MAX_POSITION_PCT
}
fn default_warmup_days() -> i64 {
    60
}
fn default_true() -> bool {
    true
}

impl BacktestConfig {
    /// A config with the given universe and window and default everything
    /// else.
    pub fn new(tickers: Vec<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            tickers,
            start_date,
            end_date,
            initial_capital: default_capital(),
            margin_requirement: default_margin(),
            rebalance_frequency: RebalanceFrequency::default(),
            strategy: default_strategy(),
            benchmark: default_benchmark(),
            workers: default_workers(),
            max_position_pct: default_max_position_pct(),
            warmup_days: default_warmup_days(),
            show_progress: default_true(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(BacktestError::ConfigError(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if self.initial_capital <= 0.0 {
            return Err(BacktestError::ConfigError(
                "initial capital must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.margin_requirement) {
            return Err(BacktestError::ConfigError(
                "margin requirement must be in [0, 1]".to_string(),
            ));
        }
        if self.max_position_pct <= 0.0 || self.max_position_pct > 1.0 {
            return Err(BacktestError::ConfigError(
                "max position fraction must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Results of a backtest run.
///
/// This is the wire contract downstream report generators parse: field names,
/// nesting, and lowercase action strings are stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub metrics: PerformanceMetrics,
    pub benchmark_return: Option<f64>,
    pub final_value: f64,
    pub portfolio_values: Vec<ValueSnapshot>,
    pub trade_history: Vec<TradeRecord>,
}

/// The backtest engine. Owns the configuration; prices and signals come in
/// through their provider seams at run time.
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the simulation.
    ///
    /// Fetches price history once per instrument (plus benchmark) over the
    /// window extended back by the warm-up period, then walks each business
    /// day in `[start, end]`: instruments without a price at or before the
    /// day are skipped for that day only; days where nothing has a price are
    /// skipped entirely; on rebalance days signals are fanned out across the
    /// worker pool, sized, and executed; every priced day appends a value
    /// snapshot. Only a completely empty price fetch is fatal.
    pub fn run(
        &self,
        prices: &dyn PriceProvider,
        signals: &dyn SignalProvider,
    ) -> Result<BacktestReport> {
        self.config.validate()?;

        info!(
            "starting backtest: {} to {}, {} tickers, strategy={}, rebalance={}",
            self.config.start_date,
            self.config.end_date,
            self.config.tickers.len(),
            self.config.strategy,
            self.config.rebalance_frequency,
        );

        let table = self.fetch_price_table(prices)?;

        let days = business_days(self.config.start_date, self.config.end_date);
        if days.is_empty() {
            return Err(BacktestError::ConfigError(
                "no business days in the backtest window".to_string(),
            ));
        }
        let rebalance: HashSet<NaiveDate> = rebalance_days(
            self.config.start_date,
            self.config.end_date,
            self.config.rebalance_frequency,
        )
        .into_iter()
        .collect();

        info!(
            "{} business days, {} rebalance days",
            days.len(),
            rebalance.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| BacktestError::ConfigError(e.to_string()))?;

        let progress = if self.config.show_progress {
            let pb = ProgressBar::new(days.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut portfolio =
            Portfolio::new(self.config.initial_capital, self.config.margin_requirement);
        let mut snapshots = vec![ValueSnapshot::new(days[0], self.config.initial_capital)];
        let mut trades: Vec<TradeRecord> = Vec::new();

        for &day in &days {
            if let Some(ref pb) = progress {
                pb.inc(1);
            }

            // Last known price at or before today, per instrument.
            let mut current_prices: HashMap<String, f64> = HashMap::new();
            let mut available: Vec<&String> = Vec::new();
            for ticker in &self.config.tickers {
                if let Some(price) = table.latest_close(ticker, day) {
                    current_prices.insert(ticker.clone(), price);
                    available.push(ticker);
                }
            }
            if available.is_empty() {
                debug!("no instrument has a price on {}, skipping day", day);
                continue;
            }

            if rebalance.contains(&day) {
                let day_signals = self.fan_out_signals(&pool, signals, &available, day, &table);
                self.execute_rebalance(
                    &mut portfolio,
                    &mut trades,
                    &day_signals,
                    &current_prices,
                    day,
                );
            }

            snapshots.push(ValueSnapshot::new(
                day,
                portfolio.total_value(&current_prices),
            ));
        }

        if let Some(pb) = progress {
            pb.finish_with_message("backtest complete");
        }

        let mut metrics = calculate_performance_metrics(&snapshots);
        metrics.total_trades = trades.len();
        metrics.win_rate = win_rate(&trades);

        let benchmark_return = self.benchmark_return(&table);
        let final_value = snapshots
            .last()
            .map(|s| s.value)
            .unwrap_or(self.config.initial_capital);

        info!(
            "backtest complete: final value {:.0}, {} trades, total return {:.2}%",
            final_value,
            trades.len(),
            metrics.total_return.unwrap_or(0.0),
        );

        Ok(BacktestReport {
            metrics,
            benchmark_return,
            final_value,
            portfolio_values: snapshots,
            trade_history: trades,
        })
    }

    /// Fetch the full window (with warm-up) for universe and benchmark.
    /// A per-ticker fetch failure is recoverable; a completely empty result
    /// set is fatal.
    fn fetch_price_table(&self, prices: &dyn PriceProvider) -> Result<PriceTable> {
        let fetch_start = self.config.start_date - Duration::days(self.config.warmup_days);
        let mut table = PriceTable::new();

        let mut universe: Vec<&String> = self.config.tickers.iter().collect();
        if let Some(benchmark) = &self.config.benchmark {
            universe.push(benchmark);
        }

        for ticker in universe {
            match prices.price_history(ticker, fetch_start, self.config.end_date) {
                Ok(bars) => {
                    if bars.is_empty() {
                        warn!("no price history for {}", ticker);
                    }
                    table.insert(ticker.clone(), bars);
                }
                Err(e) => warn!("price fetch failed for {}: {}", ticker, e),
            }
        }

        if table.is_empty() {
            return Err(BacktestError::NoData);
        }
        Ok(table)
    }

    /// Query the provider for every priced instrument, one task per
    /// instrument on the worker pool. Workers read only the immutable price
    /// table; a failed task degrades to a zero-conviction HOLD for that
    /// instrument.
    fn fan_out_signals(
        &self,
        pool: &rayon::ThreadPool,
        signals: &dyn SignalProvider,
        available: &[&String],
        day: NaiveDate,
        table: &PriceTable,
    ) -> HashMap<String, Signal> {
        pool.install(|| {
            available
                .par_iter()
                .map(|ticker| {
                    let signal = match signals.signal(ticker, day, table) {
                        Ok(signal) => signal,
                        Err(e) => {
                            debug!("signal failed for {} on {}: {}", ticker, day, e);
                            Signal::hold()
                        }
                    };
                    ((*ticker).clone(), signal)
                })
                .collect()
        })
    }

    /// Size and execute the day's signals sequentially, in universe order.
    /// Each instrument's infeasibility (zero sizing, zero execution) is
    /// independent of the others; executed trades are recorded and never
    /// rolled back.
    fn execute_rebalance(
        &self,
        portfolio: &mut Portfolio,
        trades: &mut Vec<TradeRecord>,
        day_signals: &HashMap<String, Signal>,
        current_prices: &HashMap<String, f64>,
        day: NaiveDate,
    ) {
        for ticker in &self.config.tickers {
            let Some(signal) = day_signals.get(ticker) else {
                continue;
            };
            if signal.action == Action::Hold {
                continue;
            }

            let quantity = size_position(
                portfolio,
                current_prices,
                ticker,
                signal.action,
                signal.confidence,
                self.config.max_position_pct,
            );
            if quantity == 0 {
                continue;
            }

            let price = current_prices[ticker];
            let executed = match signal.action {
                Action::Buy => portfolio.buy(ticker, quantity, price),
                Action::Sell => portfolio.sell(ticker, quantity, price),
                Action::Short => portfolio.short_open(ticker, quantity, price),
                Action::Cover => portfolio.short_cover(ticker, quantity, price),
                Action::Hold => 0,
            };

            if executed > 0 {
                trades.push(TradeRecord {
                    date: day,
                    ticker: ticker.clone(),
                    action: signal.action,
                    quantity: executed,
                    price,
                    confidence: signal.confidence,
                });
            }
        }
    }

    /// Buy-and-hold return of the benchmark over `[start, end]`, when data
    /// is available.
    fn benchmark_return(&self, table: &PriceTable) -> Option<f64> {
        let benchmark = self.config.benchmark.as_deref()?;
        let (first, last) =
            table.first_last_close(benchmark, self.config.start_date, self.config.end_date)?;
        if first == 0.0 {
            return None;
        }
        Some((last - first) / first * 100.0)
    }
}

/// Fraction of trades classified as winning, as a percentage. `None` when no
/// trades executed.
///
/// Classification uses the signal's conviction (confidence > 0.5) as a proxy,
/// not the realized entry/exit price delta; `Portfolio::realized_gains` holds
/// the data for a P&L-based classification. A known approximation, kept for
/// report compatibility.
fn win_rate(trades: &[TradeRecord]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let winning = trades.iter().filter(|t| t.confidence > 0.5).count();
    Some(winning as f64 / trades.len() as f64 * 100.0)
}
