//! PortfolioManager: the last gate before execution, and the sizer.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PortfolioDecision, PortfolioRule, PortfolioRuleContext};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioManagerConfig {
    /// Trading days before sale proceeds become available cash.
    pub settlement_lag_days: usize,
    /// Equity fraction used when no rule sets an allocation.
    pub default_allocation_fraction: f64,
}

impl Default for PortfolioManagerConfig {
    fn default() -> Self {
        Self {
            settlement_lag_days: 2,
            default_allocation_fraction: 0.01,
        }
    }
}

pub struct PortfolioManager {
    rules: Vec<Box<dyn PortfolioRule>>,
    config: PortfolioManagerConfig,
}

impl PortfolioManager {
    pub fn new(rules: Vec<Box<dyn PortfolioRule>>, config: PortfolioManagerConfig) -> Self {
        Self { rules, config }
    }

    pub fn config(&self) -> &PortfolioManagerConfig {
        &self.config
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn PortfolioRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Combined decision of every rule. Logs the first rule that rejects.
    pub fn decide(&self, context: &PortfolioRuleContext<'_>) -> PortfolioDecision {
        let mut combined = PortfolioDecision::neutral();
        for rule in &self.rules {
            let decision = rule.evaluate(context);
            if combined.allow_entry && !decision.allow_entry {
                debug!(
                    rule = rule.name(),
                    ticker = %context.signal.ticker,
                    timestamp = %context.signal.timestamp,
                    cash = context.state.cash(),
                    "portfolio rule rejected signal"
                );
            }
            combined = combined.combine(decision);
        }
        combined
    }

    /// Whole shares to buy for an accepted entry: `floor(fraction * equity / price)`.
    pub fn size(&self, decision: &PortfolioDecision, equity: f64, price: f64) -> f64 {
        if !(price > 0.0) || !(equity > 0.0) {
            return 0.0;
        }
        let fraction = decision
            .allocation_fraction
            .unwrap_or(self.config.default_allocation_fraction);
        (fraction * equity / price).floor().max(0.0)
    }

    /// Tightest per-ticker entry limit across rules.
    pub fn max_positions_per_ticker(&self) -> Option<usize> {
        self.rules.iter().filter_map(|r| r.position_limit()).min()
    }
}

impl Default for PortfolioManager {
    fn default() -> Self {
        Self::new(Vec::new(), PortfolioManagerConfig::default())
    }
}

impl std::fmt::Debug for PortfolioManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioManager")
            .field("rules", &self.rules().map(|r| r.name()).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, Signal, SignalType};
    use crate::portfolio::{
        FractionalPositionSize, MaxCapitalDeployed, MaxPositionsPerTicker, PortfolioState,
        TradingCalendar,
    };
    use crate::test_support::ts;

    #[test]
    fn sizes_from_combined_allocation() {
        let pm = PortfolioManager::new(
            vec![
                Box::new(FractionalPositionSize::new(0.02)),
                Box::new(FractionalPositionSize::new(0.05)),
            ],
            PortfolioManagerConfig::default(),
        );
        let state = PortfolioState::new(10_000.0, TradingCalendar::default(), 2);
        let signal = Signal::new(ts(0), "SPY", SignalType::Buy, Side::Long, 99.0);
        let decision = pm.decide(&PortfolioRuleContext::new(&signal, &[], &state));
        assert_eq!(decision.allocation_fraction, Some(0.05));
        // 0.05 * 10_000 / 99 = 5.05 → 5 shares.
        assert_eq!(pm.size(&decision, state.equity(), 99.0), 5.0);
    }

    #[test]
    fn default_allocation_applies_without_sizing_rule() {
        let pm = PortfolioManager::default();
        assert_eq!(pm.size(&PortfolioDecision::neutral(), 100_000.0, 50.0), 20.0);
        assert_eq!(pm.size(&PortfolioDecision::neutral(), 100.0, 50.0), 0.0);
    }

    #[test]
    fn any_rejection_rejects() {
        let pm = PortfolioManager::new(
            vec![
                Box::new(FractionalPositionSize::default()),
                Box::new(MaxCapitalDeployed::new(0.0001)),
            ],
            PortfolioManagerConfig::default(),
        );
        let mut state = PortfolioState::new(1_000.0, TradingCalendar::default(), 2);
        state.insert_position(crate::domain::Position::open("QQQ", Side::Long, 1.0, 10.0, ts(0)));
        let signal = Signal::new(ts(1), "SPY", SignalType::Buy, Side::Long, 10.0);
        assert!(!pm.decide(&PortfolioRuleContext::new(&signal, &[], &state)).allow_entry);
    }

    #[test]
    fn tightest_position_limit_wins() {
        let pm = PortfolioManager::new(
            vec![
                Box::new(MaxPositionsPerTicker::new(3)),
                Box::new(MaxPositionsPerTicker::new(1)),
            ],
            PortfolioManagerConfig::default(),
        );
        assert_eq!(pm.max_positions_per_ticker(), Some(1));
        assert_eq!(PortfolioManager::default().max_positions_per_ticker(), None);
    }
}
