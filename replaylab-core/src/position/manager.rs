//! PositionManager: turns a filtered signal plus the held position into an
//! entry or an exit of a given size.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PositionDecision, PositionRule, PositionRuleContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionManagerConfig {
    /// Accept entry signals on a ticker that already has an open position.
    pub allow_scale_in: bool,
    /// Allow rule-driven partial exits. When false any exit closes everything.
    pub allow_scale_out: bool,
    /// Every exit signal closes the full position.
    pub close_full_on_exit: bool,
}

impl Default for PositionManagerConfig {
    fn default() -> Self {
        Self {
            allow_scale_in: false,
            allow_scale_out: true,
            close_full_on_exit: true,
        }
    }
}

/// What the position stage decided for one signal.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionVerdict {
    /// Open a new position or add to the existing one.
    Enter,
    /// Close `fraction` of the held quantity.
    Exit { fraction: f64 },
    Rejected { reason: String },
}

pub struct PositionManager {
    rules: Vec<Box<dyn PositionRule>>,
    config: PositionManagerConfig,
    /// (ticker, rule index) pairs of one-shot rules that already fired.
    fired: BTreeSet<(String, usize)>,
}

impl PositionManager {
    pub fn new(rules: Vec<Box<dyn PositionRule>>, config: PositionManagerConfig) -> Self {
        Self {
            rules,
            config,
            fired: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &PositionManagerConfig {
        &self.config
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn PositionRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Combined decision of every active rule, without side effects.
    pub fn combined(&self, context: &PositionRuleContext<'_>) -> PositionDecision {
        PositionDecision::combine_all(
            self.active_rules(context.signal.ticker.as_str())
                .map(|(_, rule)| rule.evaluate(context)),
        )
    }

    pub fn decide(&mut self, context: &PositionRuleContext<'_>) -> PositionVerdict {
        let signal = context.signal;
        let held = context.position.filter(|p| p.quantity > 0.0);

        if signal.is_entry() {
            if let Some(position) = held {
                if position.side != signal.side {
                    return self.reject(context, "opposite position open".to_string());
                }
                if !self.config.allow_scale_in {
                    return self.reject(context, "position already open".to_string());
                }
            }
            let denied = self
                .active_rules(&signal.ticker)
                .find(|(_, rule)| !rule.evaluate(context).allow_entry)
                .map(|(_, rule)| rule.name().to_string());
            return match denied {
                Some(rule) => self.reject(context, format!("entry denied by {rule}")),
                None => PositionVerdict::Enter,
            };
        }

        if context.exiting().is_none() {
            return self.reject(context, "no open position".to_string());
        }

        let mut fraction = 0.0_f64;
        let mut triggered = Vec::new();
        for (index, rule) in self.active_rules(&signal.ticker) {
            let decision = rule.evaluate(context);
            if decision.exit_fraction > 0.0 {
                fraction = fraction.max(decision.exit_fraction);
                if rule.one_shot() {
                    triggered.push(index);
                }
            }
        }
        for index in triggered {
            self.fired.insert((signal.ticker.clone(), index));
        }

        let scale_out = self.config.allow_scale_out && self.rules.iter().all(|r| r.allows_scale_out());
        let fraction = if self.config.close_full_on_exit || fraction <= 0.0 || !scale_out {
            1.0
        } else {
            fraction.min(1.0)
        };
        PositionVerdict::Exit { fraction }
    }

    /// Forget one-shot firings once the ticker's position is fully closed.
    pub fn position_closed(&mut self, ticker: &str) {
        self.fired.retain(|(t, _)| t != ticker);
    }

    fn active_rules<'s>(
        &'s self,
        ticker: &'s str,
    ) -> impl Iterator<Item = (usize, &'s dyn PositionRule)> + 's {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(i, r)| !(r.one_shot() && self.fired.contains(&(ticker.to_string(), *i))))
            .map(|(i, r)| (i, r.as_ref()))
    }

    fn reject(&self, context: &PositionRuleContext<'_>, reason: String) -> PositionVerdict {
        debug!(
            ticker = %context.signal.ticker,
            timestamp = %context.signal.timestamp,
            signal_type = %context.signal.signal_type,
            reason = %reason,
            "position manager rejected signal"
        );
        PositionVerdict::Rejected { reason }
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new(Vec::new(), PositionManagerConfig::default())
    }
}

impl std::fmt::Debug for PositionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionManager")
            .field("rules", &self.rules().map(|r| r.name()).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Position, Side, Signal, SignalType};
    use crate::position::{Scaling, StopLoss, TakeProfit};
    use crate::test_support::ts;

    fn sell(price: f64) -> Signal {
        Signal::new(ts(2), "SPY", SignalType::Sell, Side::Long, price)
    }

    fn buy() -> Signal {
        Signal::new(ts(2), "SPY", SignalType::Buy, Side::Long, 100.0)
    }

    fn held() -> Position {
        Position::open("SPY", Side::Long, 10.0, 100.0, ts(0))
    }

    fn partial_config() -> PositionManagerConfig {
        PositionManagerConfig {
            close_full_on_exit: false,
            ..Default::default()
        }
    }

    #[test]
    fn entry_without_position_is_accepted() {
        let mut pm = PositionManager::default();
        let s = buy();
        assert_eq!(pm.decide(&PositionRuleContext::new(&s, &[], None)), PositionVerdict::Enter);
    }

    #[test]
    fn entry_on_open_position_needs_scale_in() {
        let s = buy();
        let pos = held();
        let ctx = PositionRuleContext::new(&s, &[], Some(&pos));
        assert!(matches!(
            PositionManager::default().decide(&ctx),
            PositionVerdict::Rejected { .. }
        ));

        let mut pm = PositionManager::new(
            vec![],
            PositionManagerConfig {
                allow_scale_in: true,
                ..Default::default()
            },
        );
        assert_eq!(pm.decide(&ctx), PositionVerdict::Enter);

        // A scaling rule still vetoes.
        let mut pm = PositionManager::new(
            vec![Box::new(Scaling::default())],
            PositionManagerConfig {
                allow_scale_in: true,
                ..Default::default()
            },
        );
        assert!(matches!(pm.decide(&ctx), PositionVerdict::Rejected { .. }));
    }

    #[test]
    fn exit_without_position_is_rejected() {
        let s = sell(90.0);
        let verdict = PositionManager::default().decide(&PositionRuleContext::new(&s, &[], None));
        assert!(matches!(verdict, PositionVerdict::Rejected { .. }));
    }

    #[test]
    fn close_full_on_exit_overrides_rule_fraction() {
        let mut pm = PositionManager::new(
            vec![Box::new(StopLoss::new(0.05, 0.3))],
            PositionManagerConfig::default(),
        );
        let s = sell(90.0);
        let pos = held();
        assert_eq!(
            pm.decide(&PositionRuleContext::new(&s, &[], Some(&pos))),
            PositionVerdict::Exit { fraction: 1.0 }
        );
    }

    #[test]
    fn partial_exit_takes_max_rule_fraction() {
        let mut pm = PositionManager::new(
            vec![
                Box::new(StopLoss::with_anchor(
                    crate::filter::Operand::SignalPrice,
                    0.05,
                    0.3,
                    crate::position::AnchorConfig::entry_price(),
                    false,
                )),
                Box::new(StopLoss::with_anchor(
                    crate::filter::Operand::SignalPrice,
                    0.08,
                    0.6,
                    crate::position::AnchorConfig::entry_price(),
                    false,
                )),
            ],
            partial_config(),
        );
        let s = sell(90.0);
        let pos = held();
        assert_eq!(
            pm.decide(&PositionRuleContext::new(&s, &[], Some(&pos))),
            PositionVerdict::Exit { fraction: 0.6 }
        );
    }

    #[test]
    fn scale_out_disallowed_promotes_to_full_close() {
        let mut pm = PositionManager::new(
            vec![Box::new(TakeProfit::new(0.05, 0.25))],
            PositionManagerConfig {
                allow_scale_out: false,
                ..partial_config()
            },
        );
        let s = sell(110.0);
        let pos = held();
        assert_eq!(
            pm.decide(&PositionRuleContext::new(&s, &[], Some(&pos))),
            PositionVerdict::Exit { fraction: 1.0 }
        );
    }

    #[test]
    fn one_shot_rule_fires_once_per_position() {
        let mut pm = PositionManager::new(vec![Box::new(TakeProfit::new(0.05, 0.25))], partial_config());
        let s = sell(110.0);
        let pos = held();
        let ctx = PositionRuleContext::new(&s, &[], Some(&pos));

        assert_eq!(pm.decide(&ctx), PositionVerdict::Exit { fraction: 0.25 });
        // Already fired: a plain exit signal closes the rest.
        assert_eq!(pm.decide(&ctx), PositionVerdict::Exit { fraction: 1.0 });

        pm.position_closed("SPY");
        assert_eq!(pm.decide(&ctx), PositionVerdict::Exit { fraction: 0.25 });
    }

    #[test]
    fn combined_is_pure() {
        let pm = PositionManager::new(vec![Box::new(TakeProfit::new(0.05, 0.25))], partial_config());
        let s = sell(110.0);
        let pos = held();
        let ctx = PositionRuleContext::new(&s, &[], Some(&pos));
        assert_eq!(pm.combined(&ctx).exit_fraction, 0.25);
        assert_eq!(pm.combined(&ctx).exit_fraction, 0.25);
    }
}
