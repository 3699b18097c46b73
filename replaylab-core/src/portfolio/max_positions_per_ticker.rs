use crate::params::{FromConfig, ParamError, Params};

use super::{PortfolioDecision, PortfolioRule, PortfolioRuleContext};

/// Caps how many entries may accumulate in one ticker's open position.
#[derive(Debug, Clone)]
pub struct MaxPositionsPerTicker {
    max_positions: usize,
    name: String,
}

impl MaxPositionsPerTicker {
    pub fn new(max_positions: usize) -> Self {
        Self {
            max_positions,
            name: format!("max_positions_per_ticker_{max_positions}"),
        }
    }
}

impl Default for MaxPositionsPerTicker {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FromConfig for MaxPositionsPerTicker {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        Ok(Self::new(params.usize_or("max_positions", 1)?))
    }
}

impl PortfolioRule for MaxPositionsPerTicker {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &PortfolioRuleContext<'_>) -> PortfolioDecision {
        if !context.signal.is_entry() {
            return PortfolioDecision::neutral();
        }
        let open = context
            .state
            .position(&context.signal.ticker)
            .map_or(0, |p| p.entry_count);
        if open >= self.max_positions {
            PortfolioDecision::reject()
        } else {
            PortfolioDecision::neutral()
        }
    }

    fn position_limit(&self) -> Option<usize> {
        Some(self.max_positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Position, Side, Signal, SignalType};
    use crate::portfolio::{PortfolioState, TradingCalendar};
    use crate::test_support::ts;

    #[test]
    fn counts_entries_into_open_position() {
        let rule = MaxPositionsPerTicker::new(2);
        let signal = Signal::new(ts(2), "SPY", SignalType::Buy, Side::Long, 10.0);
        let mut state = PortfolioState::new(1_000.0, TradingCalendar::default(), 2);
        assert!(rule.evaluate(&PortfolioRuleContext::new(&signal, &[], &state)).allow_entry);

        let mut pos = Position::open("SPY", Side::Long, 1.0, 10.0, ts(0));
        state.insert_position(pos.clone());
        assert!(rule.evaluate(&PortfolioRuleContext::new(&signal, &[], &state)).allow_entry);

        pos.scale_in(1.0, 11.0);
        state.insert_position(pos);
        assert!(!rule.evaluate(&PortfolioRuleContext::new(&signal, &[], &state)).allow_entry);
        assert_eq!(rule.position_limit(), Some(2));
    }
}
