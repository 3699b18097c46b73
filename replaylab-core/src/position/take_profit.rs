//! Exit part of a position once its gain against the anchor reaches a target.

use crate::filter::Operand;
use crate::params::{check_fraction, FromConfig, ParamError, Params};

use super::anchor::{exit_pnl_pct, AnchorConfig};
use super::{PositionDecision, PositionRule, PositionRuleContext};

#[derive(Debug, Clone)]
pub struct TakeProfit {
    field_price: Operand,
    target_pct: f64,
    fraction: f64,
    anchor: AnchorConfig,
    one_shot: bool,
    name: String,
}

impl TakeProfit {
    pub fn new(target_pct: f64, fraction: f64) -> Self {
        Self::with_anchor(Operand::SignalPrice, target_pct, fraction, AnchorConfig::entry_price(), true)
    }

    pub fn with_anchor(
        field_price: Operand,
        target_pct: f64,
        fraction: f64,
        anchor: AnchorConfig,
        one_shot: bool,
    ) -> Self {
        Self {
            name: format!("take_profit_{target_pct}_{}", anchor.kind),
            field_price,
            target_pct,
            fraction,
            anchor,
            one_shot,
        }
    }
}

impl FromConfig for TakeProfit {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        let field_price: Operand = params
            .str("field_price")?
            .parse()
            .map_err(|e: String| ParamError::invalid("field_price", e))?;
        let target_pct = params.f64("target_pct")?;
        let fraction = check_fraction("fraction", params.f64("fraction")?)?;
        let default_field = field_price.price_field().unwrap_or_default();
        let anchor = AnchorConfig::from_params(params, default_field)?;
        let one_shot = params.bool_or("one_shot", true)?;
        Ok(Self::with_anchor(field_price, target_pct, fraction, anchor, one_shot))
    }
}

impl PositionRule for TakeProfit {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &PositionRuleContext<'_>) -> PositionDecision {
        match exit_pnl_pct(context, &self.field_price, &self.anchor) {
            Some(pnl) if pnl >= self.target_pct => PositionDecision::exit(self.fraction),
            _ => PositionDecision::neutral(),
        }
    }

    fn one_shot(&self) -> bool {
        self.one_shot
    }
}
