//! Moving-average crossover detection shared by the SMA and EMA strategies.

use serde_json::json;

use crate::domain::{Bar, PriceField, Side, Signal, SignalType};
use crate::params::{ParamError, Params};
use crate::study::{StudyKind, StudySpec};

use super::{build_price_signal, round4};

/// Direction of the fast-minus-slow sign change on the last bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cross {
    Bullish,
    Bearish,
}

/// Parameters and evaluation for a two-average crossover.
#[derive(Debug, Clone)]
pub struct Crossover {
    pub kind: StudyKind,
    pub short: usize,
    pub long: usize,
    pub window: usize,
    pub side: Side,
}

impl Crossover {
    pub fn new(
        kind: StudyKind,
        short: usize,
        long: usize,
        window: usize,
        side: Side,
    ) -> Result<Self, ParamError> {
        if short >= long {
            return Err(ParamError::invalid(
                "short",
                format!("short ({short}) must be less than long ({long})"),
            ));
        }
        if short < 2 {
            return Err(ParamError::invalid(
                "short",
                format!("short must be at least 2, got {short}"),
            ));
        }
        Ok(Self {
            kind,
            short,
            long,
            window,
            side,
        })
    }

    /// Read `short`, `long`, `window` and `side` with the given defaults.
    pub fn from_params(
        kind: StudyKind,
        params: &Params,
        defaults: (usize, usize, usize),
    ) -> Result<Self, ParamError> {
        let short = params.usize_or("short", defaults.0)?;
        let long = params.usize_or("long", defaults.1)?;
        let window = params.usize_or("window", defaults.2)?;
        let side = params.parse_or("side", Side::Long)?;
        Self::new(kind, short, long, window, side)
    }

    pub fn specs(&self) -> Vec<StudySpec> {
        vec![
            StudySpec::new(self.kind, self.short, PriceField::Close),
            StudySpec::new(self.kind, self.long, PriceField::Close),
        ]
    }

    /// Detect a strict sign change of (fast − slow) between the last two bars.
    pub fn detect(&self, window: &[Bar]) -> Option<(Cross, f64, f64)> {
        let specs = self.specs();
        let fast = specs[0].build().evaluate(window)?;
        let slow = specs[1].build().evaluate(window)?;
        let n = window.len();
        if n < 2 {
            return None;
        }
        let prev = fast[n - 2] - slow[n - 2];
        let curr = fast[n - 1] - slow[n - 1];
        if !(prev.is_finite() && curr.is_finite()) {
            return None;
        }
        let cross = if prev < 0.0 && curr > 0.0 {
            Cross::Bullish
        } else if prev > 0.0 && curr < 0.0 {
            Cross::Bearish
        } else {
            return None;
        };
        Some((cross, fast[n - 1], slow[n - 1]))
    }

    /// Emit a signal of `signal_type` when the last bar crosses in `wanted` direction.
    pub fn signal(
        &self,
        window: &[Bar],
        ticker: &str,
        wanted: Cross,
        signal_type: SignalType,
    ) -> Vec<Signal> {
        let Some((cross, fast, slow)) = self.detect(window) else {
            return Vec::new();
        };
        if cross != wanted {
            return Vec::new();
        }
        let Some(signal) = build_price_signal(window, ticker, signal_type, self.side) else {
            return Vec::new();
        };
        let difference = fast - slow;
        let difference_pct = if slow != 0.0 {
            round4(difference / slow * 100.0)
        } else {
            0.0
        };
        vec![signal
            .with_metadata("fast", round4(fast))
            .with_metadata("slow", round4(slow))
            .with_metadata("difference", round4(difference))
            .with_metadata("difference_pct", difference_pct)
            .with_metadata("periods", json!([self.short, self.long]))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_bars;

    fn v_shape() -> Vec<f64> {
        // Falls for 10 bars then rallies hard: fast SMA crosses above slow.
        let mut closes: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        closes.extend((0..10).map(|i| 92.0 + 3.0 * i as f64));
        closes
    }

    #[test]
    fn rejects_bad_periods() {
        assert!(Crossover::new(StudyKind::Sma, 20, 10, 100, Side::Long).is_err());
        assert!(Crossover::new(StudyKind::Sma, 1, 10, 100, Side::Long).is_err());
        assert!(Crossover::new(StudyKind::Sma, 10, 10, 100, Side::Long).is_err());
    }

    #[test]
    fn bullish_cross_fires_exactly_once() {
        let x = Crossover::new(StudyKind::Sma, 2, 5, 50, Side::Long).unwrap();
        let bars = make_bars(&v_shape());
        let fired: Vec<usize> = (5..=bars.len())
            .filter(|&end| matches!(x.detect(&bars[..end]), Some((Cross::Bullish, _, _))))
            .collect();
        assert_eq!(fired.len(), 1, "fired at {fired:?}");
    }

    #[test]
    fn signal_carries_metadata() {
        let x = Crossover::new(StudyKind::Sma, 2, 5, 50, Side::Long).unwrap();
        let bars = make_bars(&v_shape());
        let end = (5..=bars.len())
            .find(|&end| matches!(x.detect(&bars[..end]), Some((Cross::Bullish, _, _))))
            .unwrap();
        let signals = x.signal(&bars[..end], "SPY", Cross::Bullish, SignalType::Buy);
        assert_eq!(signals.len(), 1);
        assert!(signals[0].metadata.contains_key("difference_pct"));
        assert!(x
            .signal(&bars[..end], "SPY", Cross::Bearish, SignalType::Sell)
            .is_empty());
    }

    #[test]
    fn flat_series_never_crosses() {
        let x = Crossover::new(StudyKind::Ema, 2, 4, 50, Side::Long).unwrap();
        let bars = make_bars(&[10.0; 30]);
        assert!(x.detect(&bars).is_none());
    }
}
