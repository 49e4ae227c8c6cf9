//! Position sizing policy.

use crate::portfolio::Portfolio;
use crate::types::Action;
use std::collections::HashMap;

/// Default cap on any single position, as a fraction of total portfolio value.
pub const DEFAULT_MAX_POSITION_PCT: f64 = 0.2;

/// Advise a trade quantity for the given action.
///
/// Pure policy: reads the ledger, never mutates it. The target notional is
/// `total_value * max_position_pct * confidence`; entries are additionally
/// bounded by affordability (cash for longs, margin capacity for shorts) and
/// exits liquidate the full open lot. Returns 0 when the price is not
/// positive or nothing is affordable.
pub fn size_position(
    portfolio: &Portfolio,
    prices: &HashMap<String, f64>,
    ticker: &str,
    action: Action,
    confidence: f64,
    max_position_pct: f64,
) -> u64 {
    let price = prices.get(ticker).copied().unwrap_or(0.0);
    if price <= 0.0 {
        return 0;
    }

    let total_value = portfolio.total_value(prices);
    let max_position_value = total_value * max_position_pct * confidence;

    match action {
        Action::Buy => {
            let budget = portfolio.cash.min(max_position_value);
            if budget <= 0.0 {
                return 0;
            }
            (budget / price).floor() as u64
        }
        Action::Sell => portfolio.position(ticker).map_or(0, |p| p.long),
        Action::Short => {
            let capacity = portfolio.cash / portfolio.margin_requirement();
            let budget = capacity.min(max_position_value);
            if budget <= 0.0 {
                return 0;
            }
            (budget / price).floor() as u64
        }
        Action::Cover => portfolio.position(ticker).map_or(0, |p| p.short),
        Action::Hold => 0,
    }
}
