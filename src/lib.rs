//! Quillback - a signal-driven portfolio backtester.
//!
//! # Overview
//!
//! Quillback replays trading signals against historical daily prices and
//! reports risk-adjusted performance. It maintains a full long/short ledger:
//! volume-weighted cost bases, short-sale margin accounting, and per-ticker
//! realized gains, driven by a sequential day-by-day simulation loop.
//!
//! - **Clip, don't raise**: infeasible trades execute what cash, margin, or
//!   holdings allow, possibly nothing, and never abort a run
//! - **Typed data gaps**: an instrument without a price is skipped for that
//!   day only; only a completely empty price fetch is fatal
//! - **Parallel signals, sequential ledger**: rebalance-day signal queries
//!   fan out across a worker pool; all portfolio mutation stays on one thread
//! - **Stable reporting**: the JSON report (metrics, value curve, trade
//!   ledger) is a fixed wire contract for downstream report generators
//!
//! # Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use quillback::data::CsvPrices;
//! use quillback::engine::{BacktestConfig, BacktestEngine};
//! use quillback::signal::MomentumSignals;
//!
//! let config = BacktestConfig::new(
//!     vec!["AAPL".to_string(), "MSFT".to_string()],
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
//! );
//!
//! let prices = CsvPrices::new("data/prices");
//! let signals = MomentumSignals::default();
//!
//! let engine = BacktestEngine::new(config);
//! let report = engine.run(&prices, &signals).unwrap();
//!
//! println!("Return: {:.2}%", report.metrics.total_return.unwrap_or(0.0));
//! ```
//!
//! # Custom signal providers
//!
//! Implement [`signal::SignalProvider`] to drive the engine from your own
//! model. Providers see only the immutable, already-fetched price history:
//!
//! ```
//! use chrono::NaiveDate;
//! use quillback::data::PriceTable;
//! use quillback::error::Result;
//! use quillback::signal::SignalProvider;
//! use quillback::types::{Action, Signal};
//!
//! struct AlwaysBuy;
//!
//! impl SignalProvider for AlwaysBuy {
//!     fn signal(&self, _ticker: &str, _as_of: NaiveDate, _history: &PriceTable) -> Result<Signal> {
//!         Ok(Signal::new(Action::Buy, 0.7))
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`]: Core data types (PriceBar, Action, Signal, TradeRecord)
//! - [`position`]: Per-instrument holdings record
//! - [`portfolio`]: The cash/position/margin ledger
//! - [`sizing`]: Position sizing policy
//! - [`calendar`]: Business-day and rebalance schedules
//! - [`data`]: Price providers and the in-run price table
//! - [`signal`]: Signal providers (trait + built-ins)
//! - [`engine`]: The backtest loop
//! - [`metrics`]: Performance statistics
//! - [`config`]: TOML configuration files
//! - [`report`]: Terminal summary and JSON export

pub mod calendar;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod portfolio;
pub mod position;
pub mod report;
pub mod signal;
pub mod sizing;
pub mod types;

// Re-exports for convenience
pub use config::{build_signal_provider, BacktestFileConfig};
pub use data::{CsvPrices, MemoryPrices, PriceProvider, PriceTable};
pub use engine::{BacktestConfig, BacktestEngine, BacktestReport};
pub use error::{BacktestError, Result};
pub use metrics::{calculate_performance_metrics, PerformanceMetrics};
pub use portfolio::{Exposures, Portfolio, RealizedGains};
pub use position::Position;
pub use report::ResultFormatter;
pub use signal::{MomentumSignals, ScheduledSignals, SignalProvider};
pub use sizing::{size_position, DEFAULT_MAX_POSITION_PCT};
pub use types::{Action, PriceBar, RebalanceFrequency, Signal, TradeRecord, ValueSnapshot};
