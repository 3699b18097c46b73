//! Reference prices for stop-loss and take-profit thresholds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::PriceField;
use crate::filter::Operand;
use crate::params::{ParamError, Params};

use super::PositionRuleContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    /// The position's average entry price.
    #[default]
    EntryPrice,
    /// Highest value of the anchor field over the lookback.
    RollingMax,
    /// Lowest value of the anchor field over the lookback.
    RollingMin,
}

impl FromStr for AnchorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry_price" => Ok(Self::EntryPrice),
            "rolling_max" => Ok(Self::RollingMax),
            "rolling_min" => Ok(Self::RollingMin),
            other => Err(format!(
                "unknown anchor type '{other}', expected entry_price, rolling_max or rolling_min"
            )),
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EntryPrice => "entry_price",
            Self::RollingMax => "rolling_max",
            Self::RollingMin => "rolling_min",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorConfig {
    pub kind: AnchorKind,
    pub field: PriceField,
    /// `None` means all history up to the signal.
    pub lookback_bars: Option<usize>,
}

impl AnchorConfig {
    pub fn entry_price() -> Self {
        Self {
            kind: AnchorKind::EntryPrice,
            field: PriceField::Close,
            lookback_bars: None,
        }
    }

    /// Parse an optional `anchor` table. `default_field` is used when the
    /// table names no field.
    pub fn from_params(params: &Params, default_field: PriceField) -> Result<Self, ParamError> {
        let Some(table) = params.nested("anchor")? else {
            return Ok(Self {
                field: default_field,
                ..Self::entry_price()
            });
        };
        let kind = table.parse_or("type", AnchorKind::EntryPrice)?;
        let field = table.parse_or("field", default_field)?;
        let lookback_bars = match table.usize_or("lookback_bars", 0)? {
            0 => None,
            n => Some(n),
        };
        Ok(Self {
            kind,
            field,
            lookback_bars,
        })
    }

    /// Anchor price at the signal, or `None` when it cannot be determined.
    pub fn price(&self, context: &PositionRuleContext<'_>) -> Option<f64> {
        match self.kind {
            AnchorKind::EntryPrice => context.position.map(|p| p.average_entry_price),
            AnchorKind::RollingMax | AnchorKind::RollingMin => {
                let history = context.history;
                let start = match self.lookback_bars {
                    Some(n) if history.len() > n => history.len() - n,
                    _ => 0,
                };
                let values = history[start..].iter().map(|b| b.field(self.field));
                let folded = if self.kind == AnchorKind::RollingMax {
                    values.fold(f64::NEG_INFINITY, f64::max)
                } else {
                    values.fold(f64::INFINITY, f64::min)
                };
                folded.is_finite().then_some(folded)
            }
        }
    }
}

/// Side-adjusted fractional P&L of an exit signal against the anchor.
///
/// `None` unless the signal exits the held position and both the current
/// price and a positive anchor are available.
pub fn exit_pnl_pct(
    context: &PositionRuleContext<'_>,
    current: &Operand,
    anchor: &AnchorConfig,
) -> Option<f64> {
    let position = context.exiting()?;
    let price = current.value(context.signal, context.history)?;
    let anchor_price = anchor.price(context)?;
    position.pnl_pct_from(anchor_price, price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Position, Side, Signal, SignalType};
    use crate::test_support::{make_bars, ts};

    #[test]
    fn rolling_max_uses_lookback_tail() {
        let bars = make_bars(&[100.0, 130.0, 110.0, 105.0]);
        let signal = Signal::new(ts(3), "SPY", SignalType::Sell, Side::Long, 105.0);
        let pos = Position::open("SPY", Side::Long, 1.0, 90.0, ts(0));
        let ctx = PositionRuleContext::new(&signal, &bars, Some(&pos));

        let all = AnchorConfig {
            kind: AnchorKind::RollingMax,
            field: PriceField::Close,
            lookback_bars: None,
        };
        assert_eq!(all.price(&ctx), Some(130.0));

        let tail = AnchorConfig {
            lookback_bars: Some(2),
            ..all
        };
        assert_eq!(tail.price(&ctx), Some(110.0));

        let min = AnchorConfig {
            kind: AnchorKind::RollingMin,
            ..tail
        };
        assert_eq!(min.price(&ctx), Some(105.0));
    }

    #[test]
    fn entry_anchor_reads_position() {
        let signal = Signal::new(ts(1), "SPY", SignalType::Sell, Side::Long, 95.0);
        let pos = Position::open("SPY", Side::Long, 1.0, 100.0, ts(0));
        let ctx = PositionRuleContext::new(&signal, &[], Some(&pos));
        assert_eq!(AnchorConfig::entry_price().price(&ctx), Some(100.0));
        let pnl = exit_pnl_pct(&ctx, &Operand::SignalPrice, &AnchorConfig::entry_price()).unwrap();
        assert!((pnl + 0.05).abs() < 1e-12);
    }

    #[test]
    fn anchor_table_parses() {
        let params: Params = serde_json::from_str(
            r#"{"anchor": {"type": "rolling_max", "field": "high", "lookback_bars": 20}}"#,
        )
        .unwrap();
        let cfg = AnchorConfig::from_params(&params, PriceField::Close).unwrap();
        assert_eq!(cfg.kind, AnchorKind::RollingMax);
        assert_eq!(cfg.field, PriceField::High);
        assert_eq!(cfg.lookback_bars, Some(20));

        let bad: Params = serde_json::from_str(r#"{"anchor": {"type": "vwap"}}"#).unwrap();
        assert!(AnchorConfig::from_params(&bad, PriceField::Close).is_err());
    }
}
