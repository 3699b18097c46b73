//! Controls adding to and partially closing an open position.

use crate::params::{FromConfig, ParamError, Params};

use super::{PositionDecision, PositionRule, PositionRuleContext};

#[derive(Debug, Clone)]
pub struct Scaling {
    allow_scale_in: bool,
    allow_scale_out: bool,
    name: String,
}

impl Scaling {
    pub fn new(allow_scale_in: bool, allow_scale_out: bool) -> Self {
        Self {
            allow_scale_in,
            allow_scale_out,
            name: format!("scaling(in={allow_scale_in}, out={allow_scale_out})"),
        }
    }
}

impl Default for Scaling {
    fn default() -> Self {
        Self::new(false, true)
    }
}

impl FromConfig for Scaling {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        Ok(Self::new(
            params.bool_or("allow_scale_in", false)?,
            params.bool_or("allow_scale_out", true)?,
        ))
    }
}

impl PositionRule for Scaling {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &PositionRuleContext<'_>) -> PositionDecision {
        let holding = context.position.is_some_and(|p| p.quantity > 0.0);
        if context.signal.is_entry() && holding && !self.allow_scale_in {
            PositionDecision::deny_entry()
        } else {
            PositionDecision::neutral()
        }
    }

    fn allows_scale_out(&self) -> bool {
        self.allow_scale_out
    }
}
