use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::signal::Side;

/// Open position for one ticker. Quantity is always positive; direction is `side`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub side: Side,
    pub quantity: f64,
    pub average_entry_price: f64,
    pub open_timestamp: NaiveDateTime,
    /// Number of fills that opened or scaled into this position.
    pub entry_count: usize,
}

impl Position {
    pub fn open(
        ticker: impl Into<String>,
        side: Side,
        quantity: f64,
        price: f64,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            quantity,
            average_entry_price: price,
            open_timestamp: timestamp,
            entry_count: 1,
        }
    }

    /// Capital committed at entry prices.
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.average_entry_price
    }

    /// Mark-to-market value of the committed capital.
    pub fn market_value(&self, current_price: f64) -> f64 {
        self.cost_basis() + self.unrealized_pnl(current_price)
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        let per_share = match self.side {
            Side::Long => current_price - self.average_entry_price,
            Side::Short => self.average_entry_price - current_price,
        };
        per_share * self.quantity
    }

    /// Fractional P&L relative to `anchor`, signed for the position side.
    pub fn pnl_pct_from(&self, anchor: f64, current_price: f64) -> Option<f64> {
        if anchor <= 0.0 {
            return None;
        }
        let raw = (current_price - anchor) / anchor;
        Some(match self.side {
            Side::Long => raw,
            Side::Short => -raw,
        })
    }

    /// Add shares at `price`, updating the weighted average entry.
    pub fn scale_in(&mut self, quantity: f64, price: f64) {
        let total = self.quantity + quantity;
        if total > 0.0 {
            self.average_entry_price =
                (self.cost_basis() + quantity * price) / total;
        }
        self.quantity = total;
        self.entry_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn short_pnl_is_inverted() {
        let pos = Position::open("SPY", Side::Short, 10.0, 100.0, t0());
        assert_eq!(pos.unrealized_pnl(90.0), 100.0);
        assert_eq!(pos.market_value(90.0), 1100.0);
        assert_eq!(pos.pnl_pct_from(100.0, 110.0), Some(-0.1));
    }

    #[test]
    fn scale_in_weights_average_price() {
        let mut pos = Position::open("SPY", Side::Long, 10.0, 100.0, t0());
        pos.scale_in(30.0, 120.0);
        assert_eq!(pos.quantity, 40.0);
        assert!((pos.average_entry_price - 115.0).abs() < 1e-12);
        assert_eq!(pos.entry_count, 2);
    }

    #[test]
    fn pnl_pct_rejects_non_positive_anchor() {
        let pos = Position::open("SPY", Side::Long, 1.0, 100.0, t0());
        assert_eq!(pos.pnl_pct_from(0.0, 10.0), None);
    }
}
