//! ReplayLab Runner: run files, data loading, sweeps and export.
//!
//! This crate builds on `replaylab-core` to provide:
//! - TOML run configuration with content-addressed run IDs
//! - CSV and seeded synthetic bar loading with dataset hashing
//! - A runner that owns registries and a cancellation token
//! - Parallel parameter sweeps
//! - JSON/CSV artifact export
//! - Tracing subscriber setup

pub mod config;
pub mod data_loader;
pub mod export;
pub mod logging;
pub mod runner;
pub mod sweep;

pub use config::{ConfigError, DataConfig, RunConfig, RunId};
pub use data_loader::{load_source, LoadError, LoadedData};
pub use export::{export_json, import_json, load_artifacts, save_artifacts};
pub use logging::init_tracing;
pub use runner::{RunError, RunOutcome, Runner};
pub use sweep::{ParamGrid, ParamSweep, SweepResults};
