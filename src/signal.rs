//! Signal providers: the trait the engine consumes, plus built-in providers.

use crate::data::PriceTable;
use crate::error::{BacktestError, Result};
use crate::types::{Action, Signal};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Source of trading signals.
///
/// Implementations must be `Send + Sync`: on rebalance days the engine fans
/// out one call per instrument across a worker pool. Workers receive only the
/// immutable, already-fetched price table; an `Err` from one instrument
/// degrades that instrument to HOLD for the day without affecting the others.
pub trait SignalProvider: Send + Sync {
    /// The signal for one instrument as of a date. Implementations must only
    /// consult history at or before `as_of`.
    fn signal(&self, ticker: &str, as_of: NaiveDate, history: &PriceTable) -> Result<Signal>;
}

/// Price-trend provider: N-day momentum filtered by a 14-period RSI.
///
/// Momentum above +10% with RSI under 70 buys; momentum below -10% with RSI
/// over 30 sells. Confidence scales the momentum magnitude into [0, 1],
/// saturating at 30%. Anything else, including insufficient history, holds.
#[derive(Debug, Clone)]
pub struct MomentumSignals {
    /// Momentum lookback in bars.
    pub lookback: usize,
}

impl MomentumSignals {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }
}

impl Default for MomentumSignals {
    fn default() -> Self {
        Self { lookback: 20 }
    }
}

const RSI_PERIOD: usize = 14;

impl SignalProvider for MomentumSignals {
    fn signal(&self, ticker: &str, as_of: NaiveDate, history: &PriceTable) -> Result<Signal> {
        let bars = history.bars_up_to(ticker, as_of);
        if self.lookback == 0 || bars.len() < self.lookback {
            return Ok(Signal::hold());
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let momentum = closes[closes.len() - 1] / closes[closes.len() - self.lookback] - 1.0;
        let rsi = rsi(&closes, RSI_PERIOD);

        // NaN RSI (not enough deltas, or a flat window) fails both branches.
        let signal = if momentum > 0.1 && rsi < 70.0 {
            Signal::new(Action::Buy, momentum.min(0.3) / 0.3)
        } else if momentum < -0.1 && rsi > 30.0 {
            Signal::new(Action::Sell, momentum.abs().min(0.3) / 0.3)
        } else {
            Signal::new(Action::Hold, 0.5)
        };
        Ok(signal)
    }
}

/// Simple-average RSI over the last `period` price changes. `NaN` when there
/// are not enough observations or no movement at all.
fn rsi(closes: &[f64], period: usize) -> f64 {
    if closes.len() < period + 1 {
        return f64::NAN;
    }

    let deltas: Vec<f64> = closes[closes.len() - period - 1..]
        .windows(2)
        .map(|w| w[1] - w[0])
        .collect();

    let avg_gain = deltas.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
    let avg_loss = -deltas.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;

    if avg_loss == 0.0 && avg_gain == 0.0 {
        return f64::NAN;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Replays a precomputed date -> ticker -> signal schedule.
///
/// The seam for externally generated signals (ranking models, analyst
/// output): compute once, replay deterministically. Dates or tickers missing
/// from the schedule are an error, which the engine treats as HOLD.
#[derive(Debug, Default)]
pub struct ScheduledSignals {
    schedule: HashMap<NaiveDate, HashMap<String, Signal>>,
}

impl ScheduledSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, ticker: impl Into<String>, signal: Signal) {
        self.schedule
            .entry(date)
            .or_default()
            .insert(ticker.into(), signal);
    }
}

impl SignalProvider for ScheduledSignals {
    fn signal(&self, ticker: &str, as_of: NaiveDate, _history: &PriceTable) -> Result<Signal> {
        self.schedule
            .get(&as_of)
            .and_then(|day| day.get(ticker))
            .copied()
            .ok_or_else(|| {
                BacktestError::SignalError(format!("no scheduled signal for {} on {}", ticker, as_of))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceBar;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn table_from_closes(ticker: &str, closes: &[f64]) -> PriceTable {
        let start = d(2024, 1, 1);
        let bars: Vec<PriceBar> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let date = start + chrono::Duration::days(i as i64);
                PriceBar::new(date, *c, *c, *c, *c, 1_000.0)
            })
            .collect();
        let mut table = PriceTable::new();
        table.insert(ticker, bars);
        table
    }

    #[test]
    fn test_insufficient_history_holds() {
        let table = table_from_closes("X", &[100.0, 101.0, 102.0]);
        let provider = MomentumSignals::default();
        let sig = provider.signal("X", d(2024, 1, 3), &table).unwrap();
        assert_eq!(sig.action, Action::Hold);
        assert_eq!(sig.confidence, 0.0);
    }

    /// A zigzag series: up `rise` on odd steps, down `fall` on even steps.
    fn zigzag(start: f64, rise: f64, fall: f64, len: usize) -> Vec<f64> {
        let mut closes = vec![start];
        for i in 1..len {
            let prev = closes[i - 1];
            closes.push(if i % 2 == 1 { prev + rise } else { prev - fall });
        }
        closes
    }

    #[test]
    fn test_uptrend_buys() {
        // Net climb of +3/-1.5 per pair: 20-day momentum ~ +15% with enough
        // down days to keep RSI below the overbought veto.
        let closes = zigzag(100.0, 3.0, 1.5, 30);
        let table = table_from_closes("X", &closes);
        let provider = MomentumSignals::default();
        let sig = provider.signal("X", d(2024, 2, 15), &table).unwrap();
        assert_eq!(sig.action, Action::Buy);
        assert!(sig.confidence > 0.0 && sig.confidence <= 1.0);
    }

    #[test]
    fn test_downtrend_sells() {
        // Mirror image: -3/+1.5 per pair keeps RSI above the oversold veto.
        let closes = zigzag(100.0, -3.0, -1.5, 30);
        let table = table_from_closes("X", &closes);
        let provider = MomentumSignals::default();
        let sig = provider.signal("X", d(2024, 2, 15), &table).unwrap();
        assert_eq!(sig.action, Action::Sell);
        assert!(sig.confidence > 0.0 && sig.confidence <= 1.0);
    }

    #[test]
    fn test_flat_market_holds() {
        let table = table_from_closes("X", &[100.0; 30]);
        let provider = MomentumSignals::default();
        let sig = provider.signal("X", d(2024, 2, 15), &table).unwrap();
        assert_eq!(sig.action, Action::Hold);
        assert_eq!(sig.confidence, 0.5);
    }

    #[test]
    fn test_gapless_climb_vetoed_by_rsi() {
        // No down days pins RSI at 100, which vetoes the buy despite the
        // strong momentum.
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * 1.05_f64.powi(i)).collect();
        let table = table_from_closes("X", &closes);
        let provider = MomentumSignals::default();
        let sig = provider.signal("X", d(2024, 2, 15), &table).unwrap();
        assert_eq!(sig.action, Action::Hold);
    }

    #[test]
    fn test_confidence_saturates() {
        // +9/-4 per pair: 20-day momentum ~ +43%, past the 30% saturation
        // point, while RSI (rs = 2.25) stays just under the veto.
        let closes = zigzag(100.0, 9.0, 4.0, 30);
        let table = table_from_closes("X", &closes);
        let provider = MomentumSignals::default();
        let sig = provider.signal("X", d(2024, 2, 15), &table).unwrap();
        assert_eq!(sig.action, Action::Buy);
        assert!((sig.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scheduled_signals_replay() {
        let mut provider = ScheduledSignals::new();
        provider.insert(d(2024, 1, 8), "X", Signal::new(Action::Buy, 0.9));
        let table = PriceTable::new();

        let sig = provider.signal("X", d(2024, 1, 8), &table).unwrap();
        assert_eq!(sig.action, Action::Buy);

        // Unscheduled lookups are typed errors, not silent holds.
        assert!(provider.signal("X", d(2024, 1, 9), &table).is_err());
        assert!(provider.signal("Y", d(2024, 1, 8), &table).is_err());
    }
}
