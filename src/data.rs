//! Price data: the provider seam and the in-run price table.

use crate::error::{BacktestError, Result};
use crate::types::PriceBar;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source of historical daily prices.
///
/// Queried once per run per instrument over the full backtest window extended
/// backward by the warm-up period. "No data" is `Ok` with an empty vector or
/// a `DataError`; the engine recovers from either by skipping the instrument,
/// and aborts only when every instrument comes back empty.
pub trait PriceProvider {
    /// Daily bars for `ticker` within `[start, end]`, in chronological order.
    /// Gaps (non-trading days) are permitted.
    fn price_history(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<PriceBar>>;
}

/// In-memory provider, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryPrices {
    series: HashMap<String, Vec<PriceBar>>,
}

impl MemoryPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bars for a ticker. Bars are kept sorted by date.
    pub fn add(&mut self, ticker: impl Into<String>, mut bars: Vec<PriceBar>) {
        bars.sort_by_key(|b| b.date);
        self.series.insert(ticker.into(), bars);
    }
}

impl PriceProvider for MemoryPrices {
    fn price_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        Ok(self
            .series
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Raw CSV row with flexible column naming.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date", alias = "date", alias = "DATE")]
    date: String,
    #[serde(alias = "Open", alias = "open", default)]
    open: f64,
    #[serde(alias = "High", alias = "high", default)]
    high: f64,
    #[serde(alias = "Low", alias = "low", default)]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
}

/// Load daily bars from a CSV file with `date,open,high,low,close,volume`
/// columns (header names are matched case-insensitively for the common
/// variants). Rows that fail validation are skipped with a warning.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<PriceBar>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut bars = Vec::new();
    for row in reader.deserialize() {
        let row: CsvRow = row?;
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")?;
        let bar = PriceBar::new(date, row.open, row.high, row.low, row.close, row.volume);
        if bar.close > 0.0 {
            bars.push(bar);
        } else {
            warn!("skipping row with non-positive close in {}", path.display());
        }
    }

    bars.sort_by_key(|b| b.date);
    debug!("loaded {} bars from {}", bars.len(), path.display());
    Ok(bars)
}

/// Provider backed by a directory of `<TICKER>.csv` files.
#[derive(Debug)]
pub struct CsvPrices {
    dir: PathBuf,
}

impl CsvPrices {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PriceProvider for CsvPrices {
    fn price_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let path = self.dir.join(format!("{}.csv", ticker));
        if !path.exists() {
            return Err(BacktestError::DataError(format!(
                "no price file for {}: {}",
                ticker,
                path.display()
            )));
        }
        let bars = load_csv(&path)?;
        Ok(bars
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect())
    }
}

/// Immutable per-run price table: one date-sorted series per ticker.
///
/// Built once during engine initialization; shared read-only with signal
/// fan-out workers afterwards.
#[derive(Debug, Default)]
pub struct PriceTable {
    series: HashMap<String, Vec<PriceBar>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a ticker's history, dropping empty series.
    pub fn insert(&mut self, ticker: impl Into<String>, mut bars: Vec<PriceBar>) {
        if bars.is_empty() {
            return;
        }
        bars.sort_by_key(|b| b.date);
        self.series.insert(ticker.into(), bars);
    }

    /// True when no ticker has any bars at all.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// All bars for a ticker dated at or before `as_of`.
    pub fn bars_up_to(&self, ticker: &str, as_of: NaiveDate) -> &[PriceBar] {
        match self.series.get(ticker) {
            Some(bars) => {
                let idx = bars.partition_point(|b| b.date <= as_of);
                &bars[..idx]
            }
            None => &[],
        }
    }

    /// The last known close at or before `as_of`, if any.
    pub fn latest_close(&self, ticker: &str, as_of: NaiveDate) -> Option<f64> {
        self.bars_up_to(ticker, as_of).last().map(|b| b.close)
    }

    /// First and last closes with dates inside `[start, end]`.
    pub fn first_last_close(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<(f64, f64)> {
        let bars = self.series.get(ticker)?;
        let mut in_range = bars.iter().filter(|b| b.date >= start && b.date <= end);
        let first = in_range.next()?;
        let last = in_range.last().unwrap_or(first);
        Some((first.close, last.close))
    }
}
