//! Cross-ticker capital allocation: portfolio state, rules and the manager.

pub mod decision;
pub mod fractional_position_size;
pub mod manager;
pub mod max_capital_deployed;
pub mod max_positions_per_ticker;
pub mod state;

pub use decision::PortfolioDecision;
pub use fractional_position_size::FractionalPositionSize;
pub use manager::{PortfolioManager, PortfolioManagerConfig};
pub use max_capital_deployed::MaxCapitalDeployed;
pub use max_positions_per_ticker::MaxPositionsPerTicker;
pub use state::{PortfolioState, TradingCalendar};

use crate::domain::{Bar, Signal};
use crate::error::ConfigurationError;
use crate::params::{FromConfig, ParamError, Params};
use crate::registry::Registry;

#[derive(Debug, Clone, Copy)]
pub struct PortfolioRuleContext<'a> {
    pub signal: &'a Signal,
    pub history: &'a [Bar],
    pub state: &'a PortfolioState,
}

impl<'a> PortfolioRuleContext<'a> {
    pub fn new(signal: &'a Signal, history: &'a [Bar], state: &'a PortfolioState) -> Self {
        Self {
            signal,
            history,
            state,
        }
    }
}

pub trait PortfolioRule: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, context: &PortfolioRuleContext<'_>) -> PortfolioDecision;

    /// Maximum concurrent entries per ticker this rule enforces, if any.
    fn position_limit(&self) -> Option<usize> {
        None
    }
}

pub type PortfolioRuleFactory = fn(&Params) -> Result<Box<dyn PortfolioRule>, ParamError>;

fn boxed<T: PortfolioRule + FromConfig + 'static>(
    params: &Params,
) -> Result<Box<dyn PortfolioRule>, ParamError> {
    Ok(Box::new(T::from_config(params)?))
}

pub fn register_builtins(
    registry: &mut Registry<PortfolioRuleFactory>,
) -> Result<(), ConfigurationError> {
    registry.register_type::<MaxCapitalDeployed>(boxed::<MaxCapitalDeployed>)?;
    registry.register_type::<MaxPositionsPerTicker>(boxed::<MaxPositionsPerTicker>)?;
    registry.register_type::<FractionalPositionSize>(boxed::<FractionalPositionSize>)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_register_under_derived_names() {
        let mut registry = Registry::new("portfolio rule");
        register_builtins(&mut registry).unwrap();
        assert_eq!(
            registry.all_identifiers().into_iter().collect::<Vec<_>>(),
            vec![
                "fractional-position-size",
                "max-capital-deployed",
                "max-positions-per-ticker"
            ]
        );
    }
}
