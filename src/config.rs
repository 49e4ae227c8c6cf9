//! TOML configuration file support.
//!
//! Allows backtest runs to be described in a file for reproducibility.

use crate::data::CsvPrices;
use crate::engine::BacktestConfig;
use crate::error::{BacktestError, Result};
use crate::signal::{MomentumSignals, SignalProvider};
use crate::sizing::DEFAULT_MAX_POSITION_PCT;
use crate::types::RebalanceFrequency;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete backtest description loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BacktestFileConfig {
    /// Simulation settings.
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// Price data settings.
    #[serde(default)]
    pub data: DataSettings,
}

/// Simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Instrument universe.
    #[serde(default)]
    pub tickers: Vec<String>,
    /// Start date (YYYY-MM-DD).
    #[serde(default)]
    pub start_date: Option<String>,
    /// End date (YYYY-MM-DD).
    #[serde(default)]
    pub end_date: Option<String>,
    /// Initial capital.
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    /// Short-sale margin requirement.
    #[serde(default = "default_margin")]
    pub margin_requirement: f64,
    /// Rebalance frequency: "daily", "weekly", or "monthly".
    #[serde(default = "default_rebalance")]
    pub rebalance: String,
    /// Signal strategy name.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Benchmark ticker; empty disables the comparison.
    #[serde(default = "default_benchmark")]
    pub benchmark: String,
    /// Signal fan-out worker count.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Cap on any single position as a fraction of portfolio value.
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,
}

fn default_capital() -> f64 {
    100_000.0
}
fn default_margin() -> f64 {
    0.5
}
fn default_rebalance() -> String {
    "weekly".to_string()
}
fn default_strategy() -> String {
    "momentum".to_string()
}
fn default_benchmark() -> String {
    "SPY".to_string()
}
fn default_workers() -> usize {
    10
}
fn default_max_position_pct() -> f64 {
    DEFAULT_MAX_POSITION_PCT
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            start_date: None,
            end_date: None,
            initial_capital: default_capital(),
            margin_requirement: default_margin(),
            rebalance: default_rebalance(),
            strategy: default_strategy(),
            benchmark: default_benchmark(),
            workers: default_workers(),
            max_position_pct: default_max_position_pct(),
        }
    }
}

/// Price data settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataSettings {
    /// Directory of `<TICKER>.csv` files.
    pub path: Option<String>,
}

impl BacktestFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("loading configuration from {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: BacktestFileConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BacktestError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Convert into an engine configuration.
    pub fn to_backtest_config(&self) -> Result<BacktestConfig> {
        let start_date = parse_date("start_date", self.backtest.start_date.as_deref())?;
        let end_date = parse_date("end_date", self.backtest.end_date.as_deref())?;
        let rebalance_frequency: RebalanceFrequency = self.backtest.rebalance.parse()?;

        let mut config =
            BacktestConfig::new(self.backtest.tickers.clone(), start_date, end_date);
        config.initial_capital = self.backtest.initial_capital;
        config.margin_requirement = self.backtest.margin_requirement;
        config.rebalance_frequency = rebalance_frequency;
        config.strategy = self.backtest.strategy.clone();
        config.benchmark = if self.backtest.benchmark.is_empty() {
            None
        } else {
            Some(self.backtest.benchmark.clone())
        };
        config.workers = self.backtest.workers;
        config.max_position_pct = self.backtest.max_position_pct;
        Ok(config)
    }

    /// Build the CSV price provider from the data settings.
    pub fn price_provider(&self) -> Result<CsvPrices> {
        let path = self.data.path.as_deref().ok_or_else(|| {
            BacktestError::ConfigError("data.path is required".to_string())
        })?;
        Ok(CsvPrices::new(path))
    }

    /// Resolve the strategy name to a signal provider.
    pub fn signal_provider(&self) -> Result<Box<dyn SignalProvider>> {
        build_signal_provider(&self.backtest.strategy)
    }

    /// Generate an example configuration file.
    pub fn example() -> String {
        r#"# Quillback backtest configuration

[backtest]
tickers = ["AAPL", "MSFT", "GOOGL"]
start_date = "2024-01-01"
end_date = "2024-12-31"
initial_capital = 100000.0
margin_requirement = 0.5
rebalance = "weekly"     # daily | weekly | monthly
strategy = "momentum"
benchmark = "SPY"
workers = 10
max_position_pct = 0.2

[data]
path = "data/prices"     # directory of <TICKER>.csv files
"#
        .to_string()
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<NaiveDate> {
    let value = value.ok_or_else(|| {
        BacktestError::ConfigError(format!("backtest.{} is required", field))
    })?;
    Ok(NaiveDate::parse_from_str(value, "%Y-%m-%d")?)
}

/// Resolve a strategy name to its signal provider.
pub fn build_signal_provider(name: &str) -> Result<Box<dyn SignalProvider>> {
    match name.to_lowercase().as_str() {
        "momentum" => Ok(Box::new(MomentumSignals::default())),
        other => Err(BacktestError::ConfigError(format!(
            "unknown strategy: {}",
            other
        ))),
    }
}
