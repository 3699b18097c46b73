//! ReplayLab Core: deterministic bar-replay backtesting.
//!
//! This crate contains the whole simulation:
//! - Domain types (bars, signals, positions, trades)
//! - Time stepping and look-ahead-safe strategy evaluation
//! - Type registries resolving declarative pipeline entries by identifier
//! - Signal gating through filters, position rules and portfolio rules
//! - Execution simulation with slippage, commission and settlement lag
//! - Serializable results with summary statistics

pub mod cancel;
pub mod collector;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod execution;
pub mod filter;
pub mod params;
pub mod pipeline;
pub mod portfolio;
pub mod position;
pub mod registry;
pub mod results;
pub mod strategy;
pub mod study;
pub mod time_stepper;
pub mod wrapper;

#[cfg(test)]
mod test_support;

pub use cancel::CancellationToken;
pub use collector::SignalCollector;
pub use data::{DataError, DataSource, InMemoryDataSource, Universe};
pub use domain::{Bar, ClosedTrade, OhlcvSeries, Position, PriceField, Side, Signal, SignalType, TradeRecord};
pub use engine::{run_backtest, BacktestConfig};
pub use error::{ConfigurationError, EngineError, InvariantViolationError, ResolutionError};
pub use params::{FromConfig, ParamError, Params};
pub use pipeline::{PipelineBuildError, PipelineConfig, PipelineEntry};
pub use registry::Registries;
pub use results::{BacktestResults, StageCounts, SummaryStats};
pub use time_stepper::{Granularity, TimeStepper};
pub use wrapper::BacktestStrategyWrapper;
