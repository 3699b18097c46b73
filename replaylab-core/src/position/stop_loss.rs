//! Exit part of a position once its loss against the anchor reaches a threshold.

use crate::filter::Operand;
use crate::params::{check_fraction, FromConfig, ParamError, Params};

use super::anchor::{exit_pnl_pct, AnchorConfig};
use super::{PositionDecision, PositionRule, PositionRuleContext};

#[derive(Debug, Clone)]
pub struct StopLoss {
    field_price: Operand,
    loss_pct: f64,
    fraction: f64,
    anchor: AnchorConfig,
    one_shot: bool,
    name: String,
}

impl StopLoss {
    /// # Panics
    ///
    /// Panics if `loss_pct` is negative. `from_config` reports that as a
    /// `ParamError` instead.
    pub fn new(loss_pct: f64, fraction: f64) -> Self {
        Self::with_anchor(Operand::SignalPrice, loss_pct, fraction, AnchorConfig::entry_price(), true)
    }

    /// # Panics
    ///
    /// Panics if `loss_pct` is negative.
    pub fn with_anchor(
        field_price: Operand,
        loss_pct: f64,
        fraction: f64,
        anchor: AnchorConfig,
        one_shot: bool,
    ) -> Self {
        assert!(loss_pct >= 0.0, "loss_pct must be non-negative");
        Self {
            name: format!("stop_loss_{loss_pct}_{}", anchor.kind),
            field_price,
            loss_pct,
            fraction,
            anchor,
            one_shot,
        }
    }
}

impl FromConfig for StopLoss {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        let field_price: Operand = params
            .str("field_price")?
            .parse()
            .map_err(|e: String| ParamError::invalid("field_price", e))?;
        let loss_pct = params.f64("loss_pct")?;
        if loss_pct < 0.0 {
            return Err(ParamError::invalid("loss_pct", "must be non-negative"));
        }
        let fraction = check_fraction("fraction", params.f64("fraction")?)?;
        let default_field = field_price.price_field().unwrap_or_default();
        let anchor = AnchorConfig::from_params(params, default_field)?;
        let one_shot = params.bool_or("one_shot", true)?;
        Ok(Self::with_anchor(field_price, loss_pct, fraction, anchor, one_shot))
    }
}

impl PositionRule for StopLoss {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &PositionRuleContext<'_>) -> PositionDecision {
        match exit_pnl_pct(context, &self.field_price, &self.anchor) {
            Some(pnl) if pnl <= -self.loss_pct => PositionDecision::exit(self.fraction),
            _ => PositionDecision::neutral(),
        }
    }

    fn one_shot(&self) -> bool {
        self.one_shot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Position, Side, Signal, SignalType};
    use crate::test_support::ts;

    fn eval(rule: &StopLoss, side: Side, signal_type: SignalType, price: f64) -> f64 {
        let pos = Position::open("SPY", side, 10.0, 100.0, ts(0));
        let signal = Signal::new(ts(1), "SPY", signal_type, side, price);
        rule.evaluate(&PositionRuleContext::new(&signal, &[], Some(&pos)))
            .exit_fraction
    }

    #[test]
    fn triggers_at_threshold_on_long_exit() {
        let rule = StopLoss::new(0.05, 0.5);
        assert_eq!(eval(&rule, Side::Long, SignalType::Sell, 95.0), 0.5);
        assert_eq!(eval(&rule, Side::Long, SignalType::Sell, 96.0), 0.0);
    }

    #[test]
    fn short_losses_are_price_rises() {
        let rule = StopLoss::new(0.05, 1.0);
        assert_eq!(eval(&rule, Side::Short, SignalType::Buy, 106.0), 1.0);
        assert_eq!(eval(&rule, Side::Short, SignalType::Buy, 94.0), 0.0);
    }

    #[test]
    fn entry_signals_never_trigger() {
        let rule = StopLoss::new(0.05, 1.0);
        assert_eq!(eval(&rule, Side::Long, SignalType::Buy, 50.0), 0.0);
    }

    #[test]
    fn from_config_requires_core_params() {
        let err = StopLoss::from_config(&Params::new().with("field_price", "price")).unwrap_err();
        assert!(matches!(err, ParamError::Missing { .. }));

        let bad_fraction = StopLoss::from_config(
            &Params::new()
                .with("field_price", "price")
                .with("loss_pct", 0.05)
                .with("fraction", 2.0),
        );
        assert!(bad_fraction.is_err());

        let ok = StopLoss::from_config(
            &Params::new()
                .with("field_price", "close")
                .with("loss_pct", 0.05)
                .with("fraction", 1.0)
                .with("one_shot", false),
        )
        .unwrap();
        assert!(!ok.one_shot());
    }

    #[test]
    #[should_panic(expected = "loss_pct must be non-negative")]
    fn new_panics_on_negative_loss() {
        StopLoss::new(-0.01, 1.0);
    }

    #[test]
    fn from_config_rejects_negative_loss() {
        let err = StopLoss::from_config(
            &Params::new()
                .with("field_price", "price")
                .with("loss_pct", -0.01)
                .with("fraction", 1.0),
        )
        .unwrap_err();
        assert!(matches!(err, ParamError::Invalid { .. }));
    }
}
