use serde::{Deserialize, Serialize};

/// Verdict of one portfolio rule.
///
/// Combines like `PositionDecision`: AND on `allow_entry`, MAX on
/// `allocation_fraction` where `None` is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDecision {
    pub allow_entry: bool,
    /// Fraction of equity to commit to the entry, if the rule sizes it.
    pub allocation_fraction: Option<f64>,
}

impl Default for PortfolioDecision {
    fn default() -> Self {
        Self::neutral()
    }
}

impl PortfolioDecision {
    pub const fn neutral() -> Self {
        Self {
            allow_entry: true,
            allocation_fraction: None,
        }
    }

    pub const fn reject() -> Self {
        Self {
            allow_entry: false,
            allocation_fraction: None,
        }
    }

    pub fn allocate(fraction: f64) -> Self {
        Self {
            allow_entry: true,
            allocation_fraction: Some(fraction),
        }
    }

    pub fn combine(self, other: Self) -> Self {
        let allocation_fraction = match (self.allocation_fraction, other.allocation_fraction) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        Self {
            allow_entry: self.allow_entry && other.allow_entry,
            allocation_fraction,
        }
    }

    pub fn combine_all<I: IntoIterator<Item = Self>>(decisions: I) -> Self {
        decisions.into_iter().fold(Self::neutral(), Self::combine)
    }
}
