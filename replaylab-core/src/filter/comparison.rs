//! Comparison operators and operand lookup shared by value filters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, PriceField, Signal};

use super::FilterContext;

/// Tolerance for `==` and `!=`.
pub const FLOAT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparison {
    /// `false` whenever either side is NaN.
    pub fn holds(self, left: f64, right: f64) -> bool {
        if left.is_nan() || right.is_nan() {
            return false;
        }
        match self {
            Self::Gt => left > right,
            Self::Lt => left < right,
            Self::Ge => left >= right,
            Self::Le => left <= right,
            Self::Eq => (left - right).abs() < FLOAT_EPSILON,
            Self::Ne => (left - right).abs() >= FLOAT_EPSILON,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            ">=" => Ok(Self::Ge),
            "<=" => Ok(Self::Le),
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            other => Err(format!(
                "invalid operator '{other}', expected one of > < >= <= == !="
            )),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Where a filter reads its left-hand value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// The signal's own price.
    SignalPrice,
    /// A field of the most recent bar at signal time.
    Bar(PriceField),
    /// A numeric metadata entry attached by the strategy.
    Metadata(String),
}

impl Operand {
    /// Read the operand from a signal and the history visible at its timestamp.
    pub fn value(&self, signal: &Signal, history: &[Bar]) -> Option<f64> {
        match self {
            Self::SignalPrice => Some(signal.price),
            Self::Bar(field) => history.last().map(|b| b.field(*field)),
            Self::Metadata(key) => signal.metadata.get(key).and_then(|v| v.as_f64()),
        }
    }

    pub fn resolve(&self, context: &FilterContext<'_>) -> Option<f64> {
        self.value(context.signal, context.history)
    }

    /// The bar field this operand reads, if any. `price` maps to close.
    pub fn price_field(&self) -> Option<PriceField> {
        match self {
            Self::SignalPrice => Some(PriceField::Close),
            Self::Bar(field) => Some(*field),
            Self::Metadata(_) => None,
        }
    }
}

impl FromStr for Operand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(Self::SignalPrice),
            "open" | "high" | "low" | "close" | "volume" => s.parse().map(Self::Bar),
            "" => Err("empty field name".into()),
            key => Ok(Self::Metadata(key.to_string())),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignalPrice => f.write_str("price"),
            Self::Bar(field) => write!(f, "{field}"),
            Self::Metadata(key) => f.write_str(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, SignalType};
    use crate::test_support::{make_bars, ts};

    #[test]
    fn operators_follow_their_symbols() {
        assert!(Comparison::Gt.holds(2.0, 1.0));
        assert!(!Comparison::Gt.holds(1.0, 1.0));
        assert!(Comparison::Ge.holds(1.0, 1.0));
        assert!(Comparison::Lt.holds(0.5, 1.0));
        assert!(Comparison::Le.holds(1.0, 1.0));
        assert!(Comparison::Eq.holds(1.0, 1.0 + 1e-12));
        assert!(Comparison::Ne.holds(1.0, 1.1));
        assert!(!Comparison::Ne.holds(1.0, 1.0 + 1e-12));
    }

    #[test]
    fn nan_never_compares() {
        assert!(!Comparison::Ne.holds(f64::NAN, 1.0));
        assert!(!Comparison::Lt.holds(1.0, f64::NAN));
    }

    #[test]
    fn parse_round_trips_symbols() {
        for op in ["<", ">", "<=", ">=", "==", "!="] {
            assert_eq!(op.parse::<Comparison>().unwrap().symbol(), op);
        }
        assert!("=>".parse::<Comparison>().is_err());
    }

    #[test]
    fn operands_resolve_from_context() {
        let bars = make_bars(&[10.0, 12.0]);
        let signal = Signal::new(ts(1), "SPY", SignalType::Buy, Side::Long, 12.5)
            .with_metadata("fast", 11.0);
        let ctx = FilterContext::new(&signal, &bars);

        assert_eq!("price".parse::<Operand>().unwrap().resolve(&ctx), Some(12.5));
        assert_eq!("high".parse::<Operand>().unwrap().resolve(&ctx), Some(13.0));
        assert_eq!("fast".parse::<Operand>().unwrap().resolve(&ctx), Some(11.0));
        assert_eq!("slow".parse::<Operand>().unwrap().resolve(&ctx), None);
    }
}
