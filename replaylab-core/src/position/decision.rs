use serde::{Deserialize, Serialize};

/// Verdict of one position rule.
///
/// `combine` is AND on `allow_entry` and MAX on `exit_fraction`, so folding a
/// rule set is associative, commutative and has `neutral()` as identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionDecision {
    pub allow_entry: bool,
    /// Fraction of the held quantity to close, in `[0, 1]`.
    pub exit_fraction: f64,
}

impl Default for PositionDecision {
    fn default() -> Self {
        Self::neutral()
    }
}

impl PositionDecision {
    /// Allow entry, force no exit.
    pub const fn neutral() -> Self {
        Self {
            allow_entry: true,
            exit_fraction: 0.0,
        }
    }

    pub const fn deny_entry() -> Self {
        Self {
            allow_entry: false,
            exit_fraction: 0.0,
        }
    }

    /// Exit `fraction` of the position. Out-of-range values are clamped.
    pub fn exit(fraction: f64) -> Self {
        Self {
            allow_entry: true,
            exit_fraction: clamp_fraction(fraction),
        }
    }

    pub fn combine(self, other: Self) -> Self {
        Self {
            allow_entry: self.allow_entry && other.allow_entry,
            exit_fraction: clamp_fraction(self.exit_fraction.max(other.exit_fraction)),
        }
    }

    pub fn combine_all<I: IntoIterator<Item = Self>>(decisions: I) -> Self {
        decisions.into_iter().fold(Self::neutral(), Self::combine)
    }
}

fn clamp_fraction(f: f64) -> f64 {
    if f.is_nan() {
        0.0
    } else {
        f.clamp(0.0, 1.0)
    }
}
