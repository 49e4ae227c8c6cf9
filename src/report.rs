//! Terminal rendering and JSON export of backtest results.

use crate::engine::BacktestReport;
use crate::error::Result;
use crate::types::TradeRecord;
use colored::Colorize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

/// Formats a [`BacktestReport`] for humans and machines.
pub struct ResultFormatter;

impl ResultFormatter {
    /// Print a results summary to stdout.
    pub fn print_report(report: &BacktestReport) {
        let initial = report
            .portfolio_values
            .first()
            .map(|s| s.value)
            .unwrap_or(report.final_value);

        println!();
        println!("{}", "═".repeat(60).blue());
        println!("{}", " BACKTEST RESULTS ".bold().blue());
        println!("{}", "═".repeat(60).blue());
        println!();

        println!("{}", "Performance".bold().underline());
        println!("  Initial Capital: ${:>14.2}", initial);
        println!(
            "  Final Value:     ${:>14.2}  {}",
            report.final_value,
            Self::format_pct_change(report.metrics.total_return.unwrap_or(0.0))
        );
        println!(
            "  Total Return:    {}",
            Self::format_opt_pct(report.metrics.total_return)
        );
        println!(
            "  Annualized:      {}",
            Self::format_opt_pct(report.metrics.annualized_return)
        );
        if let Some(benchmark) = report.benchmark_return {
            let alpha = report.metrics.total_return.unwrap_or(0.0) - benchmark;
            println!("  Benchmark:       {:>15.2}%", benchmark);
            println!("  Excess Return:   {:>15.2}%", alpha);
        }
        println!();

        println!("{}", "Risk".bold().underline());
        println!(
            "  Sharpe Ratio:    {}",
            Self::format_opt(report.metrics.sharpe_ratio)
        );
        println!(
            "  Sortino Ratio:   {}",
            Self::format_opt(report.metrics.sortino_ratio)
        );
        println!(
            "  Max Drawdown:    {}",
            Self::format_opt_pct(report.metrics.max_drawdown)
        );
        if let Some(date) = report.metrics.max_drawdown_date {
            println!("  Drawdown Date:   {:>16}", date.to_string());
        }
        println!();

        println!("{}", "Trades".bold().underline());
        println!("  Total Trades:    {:>16}", report.metrics.total_trades);
        println!(
            "  Win Rate:        {}",
            Self::format_opt_pct(report.metrics.win_rate)
        );
        if !report.trade_history.is_empty() {
            println!();
            println!("{}", Self::trades_table(&report.trade_history, 10));
        }

        println!("{}", "═".repeat(60).blue());
    }

    /// Render the last `limit` trades as a table.
    pub fn trades_table(trades: &[TradeRecord], limit: usize) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Date", "Ticker", "Action", "Qty", "Price", "Confidence"]);

        let start = trades.len().saturating_sub(limit);
        for trade in &trades[start..] {
            builder.push_record([
                trade.date.to_string(),
                trade.ticker.clone(),
                trade.action.to_string(),
                trade.quantity.to_string(),
                format!("{:.2}", trade.price),
                format!("{:.2}", trade.confidence),
            ]);
        }

        builder.build().with(Style::sharp()).to_string()
    }

    /// Serialize the report to pretty JSON (the stable wire format).
    pub fn to_json(report: &BacktestReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    /// Write the report JSON to a file.
    pub fn save_json(report: &BacktestReport, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, Self::to_json(report)?)?;
        Ok(())
    }

    fn format_pct_change(pct: f64) -> String {
        if pct >= 0.0 {
            format!("(+{:.2}%)", pct).green().to_string()
        } else {
            format!("({:.2}%)", pct).red().to_string()
        }
    }

    fn format_opt(value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{:>16.2}", v),
            None => format!("{:>16}", "N/A"),
        }
    }

    fn format_opt_pct(value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{:>15.2}%", v),
            None => format!("{:>16}", "N/A"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PerformanceMetrics;
    use crate::types::{Action, ValueSnapshot};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_report() -> BacktestReport {
        BacktestReport {
            metrics: PerformanceMetrics {
                sharpe_ratio: Some(1.2),
                sortino_ratio: None,
                max_drawdown: Some(-4.5),
                max_drawdown_date: Some(d(2024, 2, 12)),
                total_return: Some(8.0),
                annualized_return: Some(16.4),
                win_rate: Some(60.0),
                total_trades: 5,
            },
            benchmark_return: Some(5.0),
            final_value: 108_000.0,
            portfolio_values: vec![
                ValueSnapshot::new(d(2024, 1, 1), 100_000.0),
                ValueSnapshot::new(d(2024, 3, 29), 108_000.0),
            ],
            trade_history: vec![TradeRecord {
                date: d(2024, 1, 8),
                ticker: "AAPL".to_string(),
                action: Action::Buy,
                quantity: 100,
                price: 185.5,
                confidence: 0.8,
            }],
        }
    }

    #[test]
    fn test_json_round_trip() {
        let report = sample_report();
        let json = ResultFormatter::to_json(&report).unwrap();
        assert!(json.contains("\"sharpe_ratio\": 1.2"));
        assert!(json.contains("\"sortino_ratio\": null"));
        assert!(json.contains("\"action\": \"buy\""));

        let parsed: BacktestReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.final_value, report.final_value);
        assert_eq!(parsed.trade_history.len(), 1);
    }

    #[test]
    fn test_save_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        ResultFormatter::save_json(&sample_report(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("portfolio_values"));
    }

    #[test]
    fn test_trades_table_limits_rows() {
        let mut trades = Vec::new();
        for i in 0..20 {
            trades.push(TradeRecord {
                date: d(2024, 1, 1) + chrono::Duration::days(i),
                ticker: format!("T{}", i),
                action: Action::Buy,
                quantity: 1,
                price: 10.0,
                confidence: 0.5,
            });
        }
        let table = ResultFormatter::trades_table(&trades, 10);
        // Only the last 10 rows (T10..T19) survive.
        assert!(table.contains("T19"));
        assert!(table.contains("T10"));
        assert!(!table.contains("T0"));
    }
}
