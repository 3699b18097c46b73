use crate::params::{FromConfig, ParamError, Params};

use super::{PortfolioDecision, PortfolioRule, PortfolioRuleContext};

/// Blocks new entries once `deployed / (cash + deployed)` reaches the limit.
#[derive(Debug, Clone)]
pub struct MaxCapitalDeployed {
    max_deployed_pct: f64,
    name: String,
}

impl MaxCapitalDeployed {
    pub fn new(max_deployed_pct: f64) -> Self {
        Self {
            max_deployed_pct,
            name: format!("max_capital_deployed_{max_deployed_pct}"),
        }
    }
}

impl Default for MaxCapitalDeployed {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl FromConfig for MaxCapitalDeployed {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        let pct = params.f64_or("max_deployed_pct", 0.5)?;
        if !(pct > 0.0) {
            return Err(ParamError::invalid("max_deployed_pct", "must be positive"));
        }
        Ok(Self::new(pct))
    }
}

impl PortfolioRule for MaxCapitalDeployed {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &PortfolioRuleContext<'_>) -> PortfolioDecision {
        if !context.signal.is_entry() {
            return PortfolioDecision::neutral();
        }
        let deployed = context.state.deployed();
        let capital = context.state.cash() + deployed;
        if capital <= 0.0 {
            return PortfolioDecision::neutral();
        }
        if deployed / capital >= self.max_deployed_pct {
            PortfolioDecision::reject()
        } else {
            PortfolioDecision::neutral()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Position, Side, Signal, SignalType};
    use crate::portfolio::{PortfolioState, TradingCalendar};
    use crate::test_support::ts;

    fn state_with_deployed(cash: f64, deployed: f64) -> PortfolioState {
        let mut state = PortfolioState::new(cash, TradingCalendar::default(), 2);
        if deployed > 0.0 {
            state.insert_position(Position::open("QQQ", Side::Long, 1.0, deployed, ts(0)));
        }
        state
    }

    #[test]
    fn blocks_at_limit() {
        let rule = MaxCapitalDeployed::default();
        let signal = Signal::new(ts(1), "SPY", SignalType::Buy, Side::Long, 10.0);

        let under = state_with_deployed(600.0, 400.0);
        assert!(rule.evaluate(&PortfolioRuleContext::new(&signal, &[], &under)).allow_entry);

        let at = state_with_deployed(500.0, 500.0);
        assert!(!rule.evaluate(&PortfolioRuleContext::new(&signal, &[], &at)).allow_entry);
    }

    #[test]
    fn exits_are_never_blocked() {
        let rule = MaxCapitalDeployed::new(0.1);
        let signal = Signal::new(ts(1), "QQQ", SignalType::Sell, Side::Long, 10.0);
        let state = state_with_deployed(0.0, 1_000.0);
        assert!(rule.evaluate(&PortfolioRuleContext::new(&signal, &[], &state)).allow_entry);
    }
}
