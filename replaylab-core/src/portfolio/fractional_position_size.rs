use crate::params::{FromConfig, ParamError, Params};

use super::{PortfolioDecision, PortfolioRule, PortfolioRuleContext};

/// Sizes each entry as a fixed fraction of current equity.
#[derive(Debug, Clone)]
pub struct FractionalPositionSize {
    fraction_of_equity: f64,
    name: String,
}

impl FractionalPositionSize {
    pub fn new(fraction_of_equity: f64) -> Self {
        Self {
            fraction_of_equity,
            name: format!("fractional_position_size_{fraction_of_equity}"),
        }
    }
}

impl Default for FractionalPositionSize {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl FromConfig for FractionalPositionSize {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        let fraction = params.f64_or("fraction_of_equity", 0.01)?;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ParamError::invalid(
                "fraction_of_equity",
                format!("{fraction} is outside (0, 1]"),
            ));
        }
        Ok(Self::new(fraction))
    }
}

impl PortfolioRule for FractionalPositionSize {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &PortfolioRuleContext<'_>) -> PortfolioDecision {
        if context.signal.is_entry() {
            PortfolioDecision::allocate(self.fraction_of_equity)
        } else {
            PortfolioDecision::neutral()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_fraction() {
        assert!(FractionalPositionSize::from_config(&Params::new().with("fraction_of_equity", 0.0)).is_err());
        assert!(FractionalPositionSize::from_config(&Params::new().with("fraction_of_equity", 1.5)).is_err());
        assert!(FractionalPositionSize::from_config(&Params::new()).is_ok());
    }
}
