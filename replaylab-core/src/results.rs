//! Backtest results: the immutable output of one run.
//!
//! Summary statistics are pure functions over closed trades. Every collection
//! in `BacktestResults` is ordered, so serializing the same run twice yields
//! byte-identical JSON.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{ClosedTrade, Position, Signal, TradeRecord};

/// Bumped whenever the serialized layout changes.
pub const SCHEMA_VERSION: u32 = 2;

/// Per-stage outcome counts for the signals of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    /// Distinct signals produced by the strategy.
    pub signals: usize,
    /// Repeats of an already collected (ticker, timestamp, type) key.
    pub duplicates: usize,
    pub filtered: usize,
    pub position_rejected: usize,
    pub portfolio_rejected: usize,
    /// Entries sized to zero shares.
    pub zero_sized: usize,
    /// Fills skipped by the simulator (no cash or nothing to close).
    pub skipped: usize,
    pub executed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_trades: usize,
    /// Sum of net P&L over closed trades.
    pub total_profit: f64,
    /// `total_profit` as a percentage of initial capital.
    pub total_profit_pct: f64,
    /// Percentage of closed trades with positive net P&L.
    pub win_rate: f64,
    /// Mean per-trade return, in percent.
    pub avg_return_pct: f64,
    /// Worst peak-to-trough decline of capital plus cumulative realized P&L, in percent (≤ 0).
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub avg_hours_held: f64,
    /// Mean per-trade efficiency, in percent.
    #[serde(default)]
    pub avg_efficiency: f64,
}

impl SummaryStats {
    pub fn compute(trades: &[ClosedTrade], initial_capital: f64, risk_free_rate: f64) -> Self {
        if trades.is_empty() {
            return Self::default();
        }
        let total_profit: f64 = trades.iter().map(|t| t.net_pnl).sum();
        let returns: Vec<f64> = trades.iter().map(ClosedTrade::return_pct).collect();
        Self {
            total_trades: trades.len(),
            total_profit,
            total_profit_pct: if initial_capital > 0.0 {
                total_profit / initial_capital * 100.0
            } else {
                0.0
            },
            win_rate: win_rate(trades) * 100.0,
            avg_return_pct: mean(&returns) * 100.0,
            max_drawdown: max_drawdown(trades, initial_capital) * 100.0,
            sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
            avg_hours_held: mean(&trades.iter().map(ClosedTrade::hours_held).collect::<Vec<_>>()),
            avg_efficiency: mean(&trades.iter().map(|t| t.efficiency).collect::<Vec<_>>()),
        }
    }
}

// ─── Metric functions ────────────────────────────────────────────────

/// Fraction of trades with positive net P&L.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Maximum drawdown of `initial_capital + cumulative net P&L`, as a negative fraction.
///
/// Trades are taken in exit order.
pub fn max_drawdown(trades: &[ClosedTrade], initial_capital: f64) -> f64 {
    let mut ordered: Vec<&ClosedTrade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.exit_timestamp);

    let mut value = initial_capital;
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;
    for trade in ordered {
        value += trade.net_pnl;
        peak = peak.max(value);
        if peak > 0.0 {
            max_dd = max_dd.min((value - peak) / peak);
        }
    }
    max_dd
}

/// Annualized Sharpe ratio of per-trade returns.
///
/// Sharpe = mean(r - rf/252) / std(r - rf/252) * sqrt(252). Returns 0.0 with
/// fewer than 2 trades or zero variance.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean(&excess) / std * 252.0_f64.sqrt()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// First 16 hex characters of the blake3 hash of `value`'s JSON encoding.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    let hex = blake3::hash(&bytes).to_hex();
    Ok(hex.as_str()[..16].to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResults {
    pub schema_version: u32,
    pub run_hash: String,
    pub strategy: String,
    pub tickers: Vec<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub steps: usize,
    pub initial_capital: f64,
    /// Cash after releasing every pending settlement.
    pub final_cash: f64,
    /// Final cash plus open positions at their last mark.
    pub final_equity: f64,
    pub counts: StageCounts,
    pub summary: SummaryStats,
    pub signals: Vec<Signal>,
    pub trades: Vec<TradeRecord>,
    pub closed_trades: Vec<ClosedTrade>,
    pub open_positions: Vec<Position>,
}

impl BacktestResults {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Final equity relative to initial capital, as a fraction.
    pub fn total_return(&self) -> f64 {
        if self.initial_capital <= 0.0 {
            return 0.0;
        }
        self.final_equity / self.initial_capital - 1.0
    }
}
