//! Core data types for the backtester.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BacktestError;

/// Daily OHLCV bar for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check that the bar data is internally consistent.
    pub fn validate(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

/// Trading action produced by a signal provider.
///
/// A closed set: every action dispatches into exactly one portfolio operation
/// (or no-op for `Hold`), checked exhaustively at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Short,
    Cover,
    #[default]
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Short => "short",
            Action::Cover => "cover",
            Action::Hold => "hold",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Action {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            "short" => Ok(Action::Short),
            "cover" => Ok(Action::Cover),
            "hold" => Ok(Action::Hold),
            other => Err(BacktestError::SignalError(format!(
                "unknown action: {}",
                other
            ))),
        }
    }
}

/// A trading signal: what to do and how strongly the provider believes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: Action,
    /// Conviction in [0, 1]; scales the position size.
    pub confidence: f64,
}

impl Signal {
    pub fn new(action: Action, confidence: f64) -> Self {
        Self { action, confidence }
    }

    /// A zero-conviction hold, used when a provider fails or has no opinion.
    pub fn hold() -> Self {
        Self {
            action: Action::Hold,
            confidence: 0.0,
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::hold()
    }
}

/// An executed trade, appended to the run's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub action: Action,
    pub quantity: u64,
    pub price: f64,
    pub confidence: f64,
}

/// Mark-to-market portfolio value on a simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub date: NaiveDate,
    pub value: f64,
}

impl ValueSnapshot {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// How often the engine is allowed to query signals and trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceFrequency {
    /// Every business day.
    Daily,
    /// Every Monday that is a business day.
    #[default]
    Weekly,
    /// The first business day of each calendar month.
    Monthly,
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RebalanceFrequency::Daily => "daily",
            RebalanceFrequency::Weekly => "weekly",
            RebalanceFrequency::Monthly => "monthly",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RebalanceFrequency {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(RebalanceFrequency::Daily),
            "weekly" => Ok(RebalanceFrequency::Weekly),
            "monthly" => Ok(RebalanceFrequency::Monthly),
            other => Err(BacktestError::ConfigError(format!(
                "unknown rebalance frequency: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_bar_validation() {
        let valid = PriceBar::new(d(2024, 1, 15), 100.0, 105.0, 98.0, 102.0, 1000.0);
        assert!(valid.validate());

        // High below low
        let invalid = PriceBar::new(d(2024, 1, 15), 100.0, 95.0, 98.0, 102.0, 1000.0);
        assert!(!invalid.validate());

        // Negative volume
        let invalid2 = PriceBar::new(d(2024, 1, 15), 100.0, 105.0, 98.0, 102.0, -1.0);
        assert!(!invalid2.validate());
    }

    #[test]
    fn test_action_round_trip() {
        for action in [
            Action::Buy,
            Action::Sell,
            Action::Short,
            Action::Cover,
            Action::Hold,
        ] {
            let parsed: Action = action.to_string().parse().unwrap();
            assert_eq!(parsed, action);
        }
        assert!("liquidate".parse::<Action>().is_err());
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Action::Buy).unwrap(), "\"buy\"");
        assert_eq!(serde_json::to_string(&Action::Cover).unwrap(), "\"cover\"");
    }

    #[test]
    fn test_snapshot_date_format() {
        let snap = ValueSnapshot::new(d(2024, 3, 4), 100_000.0);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"2024-03-04\""));
    }

    #[test]
    fn test_frequency_parsing() {
        assert_eq!(
            "monthly".parse::<RebalanceFrequency>().unwrap(),
            RebalanceFrequency::Monthly
        );
        assert!("fortnightly".parse::<RebalanceFrequency>().is_err());
    }
}
