//! Studies: stateless indicator computations consumed by strategies.
//!
//! A study maps a bar window to a numeric series of the same length. Callers
//! go through `evaluate`, which validates the window before computing and
//! returns `None` when the window is too short. Studies never look beyond the
//! bars they are given, so a value at index `i` depends only on bars `0..=i`.

pub mod ema;
pub mod sma;

pub use ema::Ema;
pub use sma::Sma;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, PriceField};

pub trait Study: Send + Sync {
    /// Series name, e.g. "sma_20_close".
    fn name(&self) -> &str;

    /// Bars required before the output is meaningful.
    fn min_bars(&self) -> usize;

    /// Compute over the full window. Output length equals `bars.len()`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;

    /// Validate-then-compute. `None` when the window is shorter than `min_bars()`.
    fn evaluate(&self, bars: &[Bar]) -> Option<Vec<f64>> {
        if bars.len() < self.min_bars() || bars.is_empty() {
            return None;
        }
        Some(self.compute(bars))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyKind {
    Sma,
    Ema,
}

/// Serializable description of a study a strategy depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySpec {
    pub name: String,
    pub kind: StudyKind,
    pub window: usize,
    pub field: PriceField,
}

impl StudySpec {
    pub fn new(kind: StudyKind, window: usize, field: PriceField) -> Self {
        let prefix = match kind {
            StudyKind::Sma => "sma",
            StudyKind::Ema => "ema",
        };
        Self {
            name: format!("{prefix}_{window}_{field}"),
            kind,
            window,
            field,
        }
    }

    pub fn min_bars(&self) -> usize {
        self.window
    }

    pub fn build(&self) -> Box<dyn Study> {
        match self.kind {
            StudyKind::Sma => Box::new(Sma::new(self.window, self.field)),
            StudyKind::Ema => Box::new(Ema::new(self.window, self.field)),
        }
    }
}

/// Last value of a series, if finite.
pub fn last_value(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_bars;

    #[test]
    fn spec_names_include_field() {
        let spec = StudySpec::new(StudyKind::Sma, 20, PriceField::Close);
        assert_eq!(spec.name, "sma_20_close");
        assert_eq!(spec.build().name(), "sma_20_close");
        assert_eq!(spec.min_bars(), 20);
    }

    #[test]
    fn evaluate_rejects_short_windows() {
        let study = StudySpec::new(StudyKind::Ema, 5, PriceField::Close).build();
        assert!(study.evaluate(&make_bars(&[1.0, 2.0, 3.0])).is_none());
        assert!(study.evaluate(&make_bars(&[1.0; 5])).is_some());
    }

    #[test]
    fn last_value_skips_nan() {
        assert_eq!(last_value(&[1.0, f64::NAN]), None);
        assert_eq!(last_value(&[1.0, 2.0]), Some(2.0));
        assert_eq!(last_value(&[]), None);
    }
}
