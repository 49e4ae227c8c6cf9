//! Portfolio ledger: cash, positions, margin, and realized gains.

use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Cumulative realized profit and loss for one instrument, split by side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RealizedGains {
    pub long: f64,
    pub short: f64,
}

/// Notional exposure breakdown at a set of prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exposures {
    pub long_exposure: f64,
    pub short_exposure: f64,
    pub gross_exposure: f64,
    pub net_exposure: f64,
    /// Long over short notional; `f64::INFINITY` when there is no short
    /// exposure.
    pub long_short_ratio: f64,
}

/// The accounting ledger for one backtest run.
///
/// All four trade operations share a contract: clip the requested quantity to
/// what is feasible, mutate state exactly once, and return the executed
/// quantity. Infeasible requests execute zero shares; nothing here returns an
/// error. Cash never goes negative as the result of a single operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    /// Spendable cash.
    pub cash: f64,
    /// Fraction of short-sale proceeds held back as collateral, in [0, 1].
    margin_requirement: f64,
    /// Holdings by ticker, created lazily on first reference.
    positions: HashMap<String, Position>,
    /// Cumulative realized P&L by ticker.
    realized_gains: HashMap<String, RealizedGains>,
    /// Total margin pledged across all short positions, maintained
    /// incrementally by the trade operations.
    margin_used: f64,
}

impl Portfolio {
    /// Create a ledger with initial cash. The margin requirement is clamped
    /// into [0, 1].
    pub fn new(initial_cash: f64, margin_requirement: f64) -> Self {
        Self {
            cash: initial_cash,
            margin_requirement: margin_requirement.clamp(0.0, 1.0),
            positions: HashMap::new(),
            realized_gains: HashMap::new(),
            margin_used: 0.0,
        }
    }

    pub fn margin_requirement(&self) -> f64 {
        self.margin_requirement
    }

    pub fn margin_used(&self) -> f64 {
        self.margin_used
    }

    /// Holdings for a ticker, if it has ever been referenced.
    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn realized_gains(&self) -> &HashMap<String, RealizedGains> {
        &self.realized_gains
    }

    fn entry(&mut self, ticker: &str) -> &mut Position {
        self.realized_gains.entry(ticker.to_string()).or_default();
        self.positions.entry(ticker.to_string()).or_default()
    }

    /// Buy shares long. Clips the quantity to what cash affords at `price`
    /// and recomputes the long cost basis as a volume-weighted average.
    /// Returns the executed quantity.
    pub fn buy(&mut self, ticker: &str, quantity: u64, price: f64) -> u64 {
        if quantity == 0 {
            return 0;
        }

        let mut quantity = quantity;
        let mut cost = quantity as f64 * price;
        if cost > self.cash {
            quantity = if price > 0.0 {
                (self.cash / price).floor() as u64
            } else {
                0
            };
            cost = quantity as f64 * price;
        }
        if quantity == 0 {
            return 0;
        }

        let pos = self.entry(ticker);
        let old_shares = pos.long;
        let total_cost = pos.long_cost_basis * old_shares as f64 + cost;
        pos.long_cost_basis = total_cost / (old_shares + quantity) as f64;
        pos.long += quantity;
        self.cash -= cost;

        debug!("buy {} x{} @ {:.2}, cash {:.2}", ticker, quantity, price, self.cash);
        quantity
    }

    /// Sell long shares. Clips the quantity to the open long lot, books the
    /// realized gain against the long cost basis, and resets the basis when
    /// the lot closes. Returns the executed quantity.
    pub fn sell(&mut self, ticker: &str, quantity: u64, price: f64) -> u64 {
        let pos = self.entry(ticker);
        let quantity = quantity.min(pos.long);
        if quantity == 0 {
            return 0;
        }

        let realized = (price - pos.long_cost_basis) * quantity as f64;
        pos.long -= quantity;
        if pos.long == 0 {
            pos.long_cost_basis = 0.0;
        }
        self.cash += quantity as f64 * price;
        self.realized_gains
            .entry(ticker.to_string())
            .or_default()
            .long += realized;

        debug!(
            "sell {} x{} @ {:.2}, realized {:.2}",
            ticker, quantity, price, realized
        );
        quantity
    }

    /// Open (or add to) a short position. The sale proceeds are credited to
    /// cash minus the margin pledged (`proceeds * margin_requirement`); the
    /// quantity is clipped to what cash can collateralize. Returns the
    /// executed quantity.
    pub fn short_open(&mut self, ticker: &str, quantity: u64, price: f64) -> u64 {
        if quantity == 0 {
            return 0;
        }

        let mut quantity = quantity;
        let mut proceeds = price * quantity as f64;
        let mut margin_required = proceeds * self.margin_requirement;
        if margin_required > self.cash {
            quantity = if price > 0.0 {
                (self.cash / (price * self.margin_requirement)).floor() as u64
            } else {
                0
            };
            if quantity == 0 {
                return 0;
            }
            proceeds = price * quantity as f64;
            margin_required = proceeds * self.margin_requirement;
        }

        let pos = self.entry(ticker);
        let old_shares = pos.short;
        let total_cost = pos.short_cost_basis * old_shares as f64 + price * quantity as f64;
        pos.short_cost_basis = total_cost / (old_shares + quantity) as f64;
        pos.short += quantity;
        pos.short_margin_used += margin_required;
        self.margin_used += margin_required;
        self.cash += proceeds - margin_required;

        debug!(
            "short {} x{} @ {:.2}, margin {:.2}, cash {:.2}",
            ticker, quantity, price, margin_required, self.cash
        );
        quantity
    }

    /// Buy back short shares. Clips the quantity to the open short lot,
    /// releases margin proportionally to the fraction covered, books the
    /// realized gain against the short cost basis, and resets basis and margin
    /// when the lot closes. Returns the executed quantity.
    pub fn short_cover(&mut self, ticker: &str, quantity: u64, price: f64) -> u64 {
        let pos = self.entry(ticker);
        let quantity = quantity.min(pos.short);
        if quantity == 0 {
            return 0;
        }

        let cover_cost = quantity as f64 * price;
        let realized = (pos.short_cost_basis - price) * quantity as f64;

        let portion = if pos.short > 0 {
            quantity as f64 / pos.short as f64
        } else {
            1.0
        };
        let margin_to_release = portion * pos.short_margin_used;

        pos.short -= quantity;
        pos.short_margin_used -= margin_to_release;
        if pos.short == 0 {
            pos.short_cost_basis = 0.0;
            pos.short_margin_used = 0.0;
        }
        self.margin_used -= margin_to_release;
        self.cash += margin_to_release - cover_cost;
        self.realized_gains
            .entry(ticker.to_string())
            .or_default()
            .short += realized;

        debug!(
            "cover {} x{} @ {:.2}, released {:.2}, realized {:.2}",
            ticker, quantity, price, margin_to_release, realized
        );
        quantity
    }

    /// Mark-to-market value: cash plus net holdings at the supplied prices.
    ///
    /// An instrument missing from `prices` contributes zero. The engine always
    /// supplies last-known-at-or-before prices, so this only affects
    /// instruments that have never priced; callers supplying their own maps
    /// are responsible for completeness.
    pub fn total_value(&self, prices: &HashMap<String, f64>) -> f64 {
        let mut total = self.cash;
        for (ticker, pos) in &self.positions {
            let price = prices.get(ticker).copied().unwrap_or(0.0);
            total += pos.long as f64 * price;
            total -= pos.short as f64 * price;
        }
        total
    }

    /// Notional long/short exposure at the supplied prices.
    pub fn exposures(&self, prices: &HashMap<String, f64>) -> Exposures {
        let mut long_exposure = 0.0;
        let mut short_exposure = 0.0;
        for (ticker, pos) in &self.positions {
            let price = prices.get(ticker).copied().unwrap_or(0.0);
            long_exposure += pos.long as f64 * price;
            short_exposure += pos.short as f64 * price;
        }

        Exposures {
            long_exposure,
            short_exposure,
            gross_exposure: long_exposure + short_exposure,
            net_exposure: long_exposure - short_exposure,
            long_short_ratio: if short_exposure > 0.0 {
                long_exposure / short_exposure
            } else {
                f64::INFINITY
            },
        }
    }
}
