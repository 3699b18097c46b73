//! Per-ticker position rules and the manager that composes them.
//!
//! Rules see a signal, the ticker's history and the currently held position
//! (if any) and return a `PositionDecision`. They never mutate anything:
//! positions change only when the execution simulator applies a fill.

pub mod anchor;
pub mod decision;
pub mod manager;
pub mod scaling;
pub mod stop_loss;
pub mod take_profit;

pub use anchor::{AnchorConfig, AnchorKind};
pub use decision::PositionDecision;
pub use manager::{PositionManager, PositionManagerConfig, PositionVerdict};
pub use scaling::Scaling;
pub use stop_loss::StopLoss;
pub use take_profit::TakeProfit;

use crate::domain::{Bar, Position, Signal};
use crate::error::ConfigurationError;
use crate::params::{FromConfig, ParamError, Params};
use crate::registry::Registry;

/// Read-only view handed to each position rule.
#[derive(Debug, Clone, Copy)]
pub struct PositionRuleContext<'a> {
    pub signal: &'a Signal,
    /// The signal ticker's bars with `timestamp <= signal.timestamp`.
    pub history: &'a [Bar],
    /// Open position on the signal's ticker, if any.
    pub position: Option<&'a Position>,
}

impl<'a> PositionRuleContext<'a> {
    pub fn new(signal: &'a Signal, history: &'a [Bar], position: Option<&'a Position>) -> Self {
        Self {
            signal,
            history,
            position,
        }
    }

    /// The held position when this signal would exit it.
    pub fn exiting(&self) -> Option<&'a Position> {
        self.position
            .filter(|p| p.quantity > 0.0 && self.signal.is_exit_for(p.side))
    }
}

pub trait PositionRule: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, context: &PositionRuleContext<'_>) -> PositionDecision;

    /// A one-shot rule fires at most once per position lifecycle.
    fn one_shot(&self) -> bool {
        false
    }

    /// Whether this rule permits partial exits. Any `false` turns a partial
    /// exit into a full close.
    fn allows_scale_out(&self) -> bool {
        true
    }
}

pub type PositionRuleFactory = fn(&Params) -> Result<Box<dyn PositionRule>, ParamError>;

fn boxed<T: PositionRule + FromConfig + 'static>(
    params: &Params,
) -> Result<Box<dyn PositionRule>, ParamError> {
    Ok(Box::new(T::from_config(params)?))
}

pub fn register_builtins(
    registry: &mut Registry<PositionRuleFactory>,
) -> Result<(), ConfigurationError> {
    registry.register_type::<StopLoss>(boxed::<StopLoss>)?;
    registry.register_type::<TakeProfit>(boxed::<TakeProfit>)?;
    registry.register_type::<Scaling>(boxed::<Scaling>)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, SignalType};
    use crate::test_support::ts;

    #[test]
    fn exiting_requires_matching_side() {
        let long = Position::open("SPY", Side::Long, 10.0, 100.0, ts(0));
        let sell = Signal::new(ts(1), "SPY", SignalType::Sell, Side::Long, 90.0);
        let buy = Signal::new(ts(1), "SPY", SignalType::Buy, Side::Long, 90.0);

        assert!(PositionRuleContext::new(&sell, &[], Some(&long)).exiting().is_some());
        assert!(PositionRuleContext::new(&buy, &[], Some(&long)).exiting().is_none());
        assert!(PositionRuleContext::new(&sell, &[], None).exiting().is_none());
    }

    #[test]
    fn builtins_register_under_derived_names() {
        let mut registry = Registry::new("position rule");
        register_builtins(&mut registry).unwrap();
        assert_eq!(
            registry.all_identifiers().into_iter().collect::<Vec<_>>(),
            vec!["scaling", "stop-loss", "take-profit"]
        );
    }
}
