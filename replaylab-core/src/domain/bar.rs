//! Bar: the fundamental market data unit, and the per-ticker series that holds them.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// OHLCV record for one ticker at one point in time.
///
/// The ticker lives on the owning `OhlcvSeries`; bars themselves are
/// immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity: positive prices, high bounds everything, low bounds everything.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Read one field by name.
    pub fn field(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Volume => self.volume as f64,
        }
    }
}

/// Column selector used by studies, filters and rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
}

impl FromStr for PriceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "close" | "price" => Ok(Self::Close),
            "volume" => Ok(Self::Volume),
            other => Err(format!("unknown price field '{other}'")),
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
        };
        f.write_str(s)
    }
}

/// Ordered bar history for one ticker. Timestamps are strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvSeries {
    ticker: String,
    bars: Vec<Bar>,
}

impl OhlcvSeries {
    /// Build a series, rejecting duplicate or out-of-order timestamps.
    pub fn new(ticker: impl Into<String>, bars: Vec<Bar>) -> Result<Self, ConfigurationError> {
        let ticker = ticker.into();
        if let Some(pair) = bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(ConfigurationError::UnorderedBars {
                ticker,
                timestamp: pair[1].timestamp,
            });
        }
        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Every bar with `timestamp <= t`. Never includes a later bar.
    pub fn up_to(&self, t: NaiveDateTime) -> &[Bar] {
        let end = self.bars.partition_point(|b| b.timestamp <= t);
        &self.bars[..end]
    }

    /// Bars in the inclusive range `[start, end]`.
    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[Bar] {
        let lo = self.bars.partition_point(|b| b.timestamp < start);
        let hi = self.bars.partition_point(|b| b.timestamp <= end);
        if lo >= hi {
            return &[];
        }
        &self.bars[lo..hi]
    }

    /// Bar stamped exactly at `t`, if any.
    pub fn bar_at(&self, t: NaiveDateTime) -> Option<&Bar> {
        self.bars
            .binary_search_by(|b| b.timestamp.cmp(&t))
            .ok()
            .map(|i| &self.bars[i])
    }
}
