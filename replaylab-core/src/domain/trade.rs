//! Trade records: the journal's append-only entries and completed round trips.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::signal::{Side, SignalType};

/// What an executed fill did to the ticker's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Open,
    ScaleIn,
    PartialClose,
    Close,
}

/// One executed fill. Immutable once appended to the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ticker: String,
    pub side: Side,
    pub signal_type: SignalType,
    pub action: TradeAction,
    /// Fill price after slippage.
    pub price: f64,
    pub quantity: f64,
    pub timestamp: NaiveDateTime,
    pub commission: f64,
    /// Net of commission; present only on closing fills.
    pub realized_pnl: Option<f64>,
}

/// Entry → exit summary produced by each closing fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub ticker: String,
    pub side: Side,
    pub entry_timestamp: NaiveDateTime,
    pub exit_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub gross_pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,
    /// Percent (0 to 100) of the best move during the holding window that
    /// the trade captured. Scored by the engine once the run finishes.
    #[serde(default)]
    pub efficiency: f64,
}

impl ClosedTrade {
    /// Return on the trade as a fraction of entry cost.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.quantity == 0.0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.quantity)
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    pub fn hours_held(&self) -> f64 {
        (self.exit_timestamp - self.entry_timestamp).num_seconds() as f64 / 3600.0
    }

    /// Share of the best favourable move in `window` that the trade captured, in percent.
    ///
    /// Longs measure against the highest high, shorts against the lowest low.
    /// Clamped to `0..=100`; 0 when the window never moved in the trade's favour.
    pub fn efficiency_over(&self, window: &[Bar]) -> f64 {
        let bars = window.iter().filter(|b| !b.is_void());
        let (captured, potential) = match self.side {
            Side::Long => {
                let best = bars.map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
                (self.exit_price - self.entry_price, best - self.entry_price)
            }
            Side::Short => {
                let best = bars.map(|b| b.low).fold(f64::INFINITY, f64::min);
                (self.entry_price - self.exit_price, self.entry_price - best)
            }
        };
        if potential <= 0.0 || !potential.is_finite() {
            return 0.0;
        }
        (captured / potential * 100.0).clamp(0.0, 100.0)
    }
}
