//! Signal: a candidate buy/sell instruction emitted by a strategy before gating.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Direction of the position a strategy trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => f.write_str("LONG"),
            Self::Short => f.write_str("SHORT"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LONG" => Ok(Self::Long),
            "SHORT" => Ok(Self::Short),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

/// Opaque key-value annotations attached by the emitting strategy.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Identity used for idempotent collection within a run.
pub type SignalKey = (String, NaiveDateTime, SignalType);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: NaiveDateTime,
    pub ticker: String,
    pub signal_type: SignalType,
    pub side: Side,
    pub price: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Signal {
    pub fn new(
        timestamp: NaiveDateTime,
        ticker: impl Into<String>,
        signal_type: SignalType,
        side: Side,
        price: f64,
    ) -> Self {
        Self {
            timestamp,
            ticker: ticker.into(),
            signal_type,
            side,
            price,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// LONG+buy or SHORT+sell: the signal opens or adds to a position.
    pub fn is_entry(&self) -> bool {
        matches!(
            (self.side, self.signal_type),
            (Side::Long, SignalType::Buy) | (Side::Short, SignalType::Sell)
        )
    }

    /// True when this signal closes a position held on `held`.
    pub fn is_exit_for(&self, held: Side) -> bool {
        matches!(
            (held, self.signal_type),
            (Side::Long, SignalType::Sell) | (Side::Short, SignalType::Buy)
        )
    }

    pub fn key(&self) -> SignalKey {
        (self.ticker.clone(), self.timestamp, self.signal_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn entry_and_exit_depend_on_side() {
        let long_buy = Signal::new(t0(), "AAPL", SignalType::Buy, Side::Long, 10.0);
        let short_sell = Signal::new(t0(), "AAPL", SignalType::Sell, Side::Short, 10.0);
        let long_sell = Signal::new(t0(), "AAPL", SignalType::Sell, Side::Long, 10.0);

        assert!(long_buy.is_entry());
        assert!(short_sell.is_entry());
        assert!(!long_sell.is_entry());
        assert!(long_sell.is_exit_for(Side::Long));
        assert!(!long_buy.is_exit_for(Side::Long));
        assert!(long_buy.is_exit_for(Side::Short));
    }

    #[test]
    fn serializes_with_wire_names() {
        let s = Signal::new(t0(), "MSFT", SignalType::Sell, Side::Short, 42.5)
            .with_metadata("sma_fast", 41.0);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"signal_type\":\"sell\""));
        assert!(json.contains("\"side\":\"SHORT\""));
        assert!(json.contains("sma_fast"));
    }

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("short".parse::<Side>().unwrap(), Side::Short);
        assert_eq!("LONG".parse::<Side>().unwrap(), Side::Long);
        assert!("flat".parse::<Side>().is_err());
    }

    #[test]
    fn empty_metadata_is_omitted() {
        let s = Signal::new(t0(), "MSFT", SignalType::Buy, Side::Long, 1.0);
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("metadata"));
    }
}
