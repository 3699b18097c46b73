//! Execution: apply accepted intents to portfolio state and journal the fills.
//!
//! Fills happen at the signal price adjusted for slippage. Buys fill higher and
//! sells fill lower, each by `slippage_bps`. Commission is charged per share on
//! every fill.

pub mod journal;
pub mod simulator;

pub use journal::TradeJournal;
pub use simulator::{ExecutionSimulator, Fill, Intent};

use serde::{Deserialize, Serialize};

use crate::domain::SignalType;
use crate::strategy::round4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Adverse price adjustment in basis points.
    pub slippage_bps: f64,
    /// Commission per share per fill.
    pub commission_per_share: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage_bps: 5.0,
            commission_per_share: 0.005,
        }
    }
}

impl ExecutionConfig {
    /// Frictionless fills, handy for tests and what-if runs.
    pub fn zero_cost() -> Self {
        Self {
            slippage_bps: 0.0,
            commission_per_share: 0.0,
        }
    }

    /// Fill price for a `signal_type` order at `price`, rounded to 4 decimals.
    pub fn fill_price(&self, signal_type: SignalType, price: f64) -> f64 {
        let slip = self.slippage_bps / 10_000.0;
        match signal_type {
            SignalType::Buy => round4(price * (1.0 + slip)),
            SignalType::Sell => round4(price * (1.0 - slip)),
        }
    }

    pub fn commission(&self, quantity: f64) -> f64 {
        quantity * self.commission_per_share
    }
}
