//! Performance metrics over a portfolio value series.

use crate::types::ValueSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// Default annual risk-free rate (4.34%).
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.0434;

/// Risk/return statistics for one backtest run.
///
/// Every statistic is optional: a degenerate series (fewer than two
/// snapshots, or fewer than two daily returns) yields the all-`None` default
/// rather than an error. An infinite Sortino ratio (no downside returns) is
/// reported as `None`; infinities are never serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    /// Largest peak-to-trough decline, as a percentage (<= 0).
    pub max_drawdown: Option<f64>,
    /// Date of the drawdown trough; present only when the drawdown is
    /// strictly negative.
    pub max_drawdown_date: Option<NaiveDate>,
    pub total_return: Option<f64>,
    pub annualized_return: Option<f64>,
    /// Set by the engine from the trade ledger, not computed here.
    pub win_rate: Option<f64>,
    pub total_trades: usize,
}

/// Compute metrics with the default annualization and risk-free rate.
pub fn calculate_performance_metrics(values: &[ValueSnapshot]) -> PerformanceMetrics {
    calculate_performance_metrics_with(values, TRADING_DAYS_PER_YEAR, DEFAULT_RISK_FREE_RATE)
}

/// Compute metrics over a value series.
///
/// Daily returns are simple percentage changes between consecutive values;
/// the Sharpe and Sortino ratios use returns in excess of the daily risk-free
/// rate and are annualized by `sqrt(trading_days)`.
pub fn calculate_performance_metrics_with(
    values: &[ValueSnapshot],
    trading_days: usize,
    risk_free_rate: f64,
) -> PerformanceMetrics {
    if values.len() < 2 {
        return PerformanceMetrics::default();
    }

    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0].value != 0.0)
        .map(|w| (w[1].value - w[0].value) / w[0].value)
        .collect();
    if returns.len() < 2 {
        return PerformanceMetrics::default();
    }

    let daily_rf = risk_free_rate / trading_days as f64;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();

    let mean_excess = mean(&excess);
    let std_excess = sample_std(&excess);
    let annualize = (trading_days as f64).sqrt();

    let sharpe = if std_excess > 1e-12 {
        annualize * mean_excess / std_excess
    } else {
        0.0
    };

    // Downside deviation over negative excess returns only. Fewer than two
    // negative observations leave the deviation undefined, in which case a
    // positive mean excess return maps to +infinity (reported as None).
    let negative: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_std = if negative.len() >= 2 {
        sample_std(&negative)
    } else {
        0.0
    };
    let sortino = if downside_std > 1e-12 {
        Some(annualize * mean_excess / downside_std)
    } else if mean_excess > 0.0 {
        None // +infinity at the output boundary
    } else {
        Some(0.0)
    };

    let (max_drawdown, max_drawdown_date) = max_drawdown(values);

    let first = values[0].value;
    let last = values[values.len() - 1].value;
    let total_return = (last - first) / first * 100.0;

    let days_elapsed = (values[values.len() - 1].date - values[0].date).num_days();
    let annualized_return = if days_elapsed > 0 {
        ((1.0 + total_return / 100.0).powf(365.0 / days_elapsed as f64) - 1.0) * 100.0
    } else {
        0.0
    };

    PerformanceMetrics {
        sharpe_ratio: Some(sharpe),
        sortino_ratio: sortino,
        max_drawdown: Some(max_drawdown),
        max_drawdown_date,
        total_return: Some(total_return),
        annualized_return: Some(annualized_return),
        win_rate: None,
        total_trades: 0,
    }
}

/// Minimum of `(value - running_max) / running_max` over the series, as a
/// percentage, and the first date the minimum occurs. The date is reported
/// only for a strictly negative drawdown.
fn max_drawdown(values: &[ValueSnapshot]) -> (f64, Option<NaiveDate>) {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    let mut worst_date = None;

    for snap in values {
        peak = peak.max(snap.value);
        if peak <= 0.0 {
            continue;
        }
        let drawdown = (snap.value - peak) / peak;
        if drawdown < worst {
            worst = drawdown;
            worst_date = Some(snap.date);
        }
    }

    (worst * 100.0, worst_date)
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n - 1 denominator), 0 for fewer than two
/// observations.
fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}
