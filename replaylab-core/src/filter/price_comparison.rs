//! Compare one signal value against a constant threshold.

use crate::params::{FromConfig, ParamError, Params};

use super::comparison::{Comparison, Operand};
use super::{Filter, FilterContext};

/// Passes when `field <operator> value`.
///
/// `field` is `price` (the signal price), a bar field of the latest bar, or a
/// metadata key. A missing value rejects.
#[derive(Debug, Clone)]
pub struct PriceComparison {
    field: Operand,
    operator: Comparison,
    value: f64,
    name: String,
}

impl PriceComparison {
    pub fn new(field: Operand, operator: Comparison, value: f64) -> Self {
        let name = format!("price_comparison({field} {operator} {value})");
        Self {
            field,
            operator,
            value,
            name,
        }
    }

    /// Signal price strictly above `value`.
    pub fn above(value: f64) -> Self {
        Self::new(Operand::SignalPrice, Comparison::Gt, value)
    }

    /// Signal price strictly below `value`.
    pub fn below(value: f64) -> Self {
        Self::new(Operand::SignalPrice, Comparison::Lt, value)
    }
}

impl FromConfig for PriceComparison {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        let field = params
            .str("field")?
            .parse::<Operand>()
            .map_err(|e| ParamError::invalid("field", e))?;
        let operator = params
            .str("operator")?
            .parse::<Comparison>()
            .map_err(|e| ParamError::invalid("operator", e))?;
        let value = params.f64("value")?;
        Ok(Self::new(field, operator, value))
    }
}

impl Filter for PriceComparison {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &FilterContext<'_>) -> bool {
        match self.field.resolve(context) {
            Some(left) => self.operator.holds(left, self.value),
            None => false,
        }
    }
}
