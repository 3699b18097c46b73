//! Error taxonomy for the simulation engine.
//!
//! Three fatal categories surface to callers:
//! - `ConfigurationError`: invalid run setup, raised before any simulation starts
//! - `ResolutionError`: unknown type identifier, raised at pipeline build time
//! - `InvariantViolationError`: a rule-composition defect reached execution; aborts the run
//!
//! Insufficient history is deliberately absent: it is a normal no-signal outcome.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::data::DataError;
use crate::pipeline::PipelineBuildError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("granularity must be positive, got {seconds}s")]
    NonPositiveGranularity { seconds: i64 },

    #[error("{kind} registry: identifier '{identifier}' already bound to {existing}, refusing {attempted}")]
    DuplicateIdentifier {
        kind: &'static str,
        identifier: String,
        existing: &'static str,
        attempted: &'static str,
    },

    #[error("bars for '{ticker}' are not strictly increasing at {timestamp}")]
    UnorderedBars {
        ticker: String,
        timestamp: NaiveDateTime,
    },

    #[error("invalid backtest config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} registry has no implementation named '{identifier}' (known: {known})")]
pub struct ResolutionError {
    pub kind: &'static str,
    pub identifier: String,
    pub known: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolationError {
    #[error("{ticker}: closing {requested} would leave negative quantity (held {held})")]
    NegativeQuantity {
        ticker: String,
        held: f64,
        requested: f64,
    },

    #[error("{ticker}: opening entry #{attempted} exceeds per-ticker limit of {limit}")]
    ConcurrencyLimit {
        ticker: String,
        limit: usize,
        attempted: usize,
    },

    #[error("{ticker}: strategy emitted signal at {signal_time} after decision time {decision_time}")]
    FutureSignal {
        ticker: String,
        signal_time: NaiveDateTime,
        decision_time: NaiveDateTime,
    },

    #[error("{ticker}: signal price must be positive and finite, got {price}")]
    InvalidPrice { ticker: String, price: f64 },

    #[error("{ticker}: cannot add {requested} exposure to an open {held} position")]
    SideConflict {
        ticker: String,
        held: crate::domain::Side,
        requested: crate::domain::Side,
    },
}

/// Umbrella error for a full backtest run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Pipeline(#[from] PipelineBuildError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolationError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("run cancelled before processing {at}")]
    Cancelled { at: NaiveDateTime },
}
