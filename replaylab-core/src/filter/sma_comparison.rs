//! Trend gate: compare a fast SMA against a slow SMA of the ticker's history.

use crate::domain::PriceField;
use crate::params::{FromConfig, ParamError, Params};
use crate::study::{last_value, Sma, Study};

use super::comparison::Comparison;
use super::{Filter, FilterContext};

#[derive(Debug, Clone)]
pub struct SmaComparison {
    fast: Sma,
    slow: Sma,
    operator: Comparison,
    name: String,
}

impl SmaComparison {
    /// # Panics
    ///
    /// Panics if either window is 0.
    pub fn new(fast_window: usize, slow_window: usize, field: PriceField, operator: Comparison) -> Self {
        Self {
            fast: Sma::new(fast_window, field),
            slow: Sma::new(slow_window, field),
            operator,
            name: format!("sma_comparison({fast_window} {operator} {slow_window} on {field})"),
        }
    }
}

impl FromConfig for SmaComparison {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        let fast_window = params.usize("fast_window")?;
        let slow_window = params.usize("slow_window")?;
        if fast_window == 0 || slow_window == 0 {
            return Err(ParamError::invalid("fast_window", "windows must be at least 1"));
        }
        let field = params.parse_or("field", PriceField::Close)?;
        let operator = params.parse_or("operator", Comparison::Gt)?;
        Ok(Self::new(fast_window, slow_window, field, operator))
    }
}

impl Filter for SmaComparison {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &FilterContext<'_>) -> bool {
        let fast = self.fast.evaluate(context.history).and_then(|s| last_value(&s));
        let slow = self.slow.evaluate(context.history).and_then(|s| last_value(&s));
        match (fast, slow) {
            (Some(f), Some(s)) => self.operator.holds(f, s),
            _ => false,
        }
    }
}
