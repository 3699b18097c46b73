//! Exponential Moving Average (EMA).
//!
//! Recursive with span-based smoothing: alpha = 2 / (window + 1).
//! Seeded with the first value, so every index carries a value:
//! EMA[0] = x[0], EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1].
//! A NaN input taints the remainder of the series.

use crate::domain::{Bar, PriceField};

use super::Study;

#[derive(Debug, Clone)]
pub struct Ema {
    window: usize,
    field: PriceField,
    name: String,
}

impl Ema {
    /// # Panics
    ///
    /// Panics if `window` is 0.
    pub fn new(window: usize, field: PriceField) -> Self {
        assert!(window >= 1, "EMA window must be >= 1");
        Self {
            window,
            field,
            name: format!("ema_{window}_{field}"),
        }
    }

    pub fn alpha(&self) -> f64 {
        2.0 / (self.window as f64 + 1.0)
    }
}

impl Study for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_bars(&self) -> usize {
        self.window
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let alpha = self.alpha();
        let mut result = Vec::with_capacity(bars.len());
        let mut prev: Option<f64> = None;

        for bar in bars {
            let x = bar.field(self.field);
            let next = match prev {
                _ if x.is_nan() => f64::NAN,
                None => x,
                Some(p) if p.is_nan() => f64::NAN,
                Some(p) => alpha * x + (1.0 - alpha) * p,
            };
            result.push(next);
            prev = Some(next);
        }

        result
    }
}
