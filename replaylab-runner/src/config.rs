//! Serializable run configuration.
//!
//! A run file is a TOML document with two tables:
//!
//! ```toml
//! [backtest]
//! tickers = ["SPY", "QQQ"]
//! start = "2024-01-02T00:00:00"
//! end = "2024-06-28T00:00:00"
//! strategy = { type = "sma-crossover", parameters = { short = 10, long = 20 } }
//!
//! [data]
//! source = "csv"
//! dir = "data/daily"
//! ```
//!
//! `[backtest]` is the engine's `BacktestConfig` verbatim; `[data]` says
//! where bars come from.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use replaylab_core::{BacktestConfig, ConfigurationError};

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigurationError),

    #[error("config is not serializable: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where a run's bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataConfig {
    /// One `<TICKER>.csv` per ticker under `dir`.
    Csv { dir: PathBuf },
    /// Seeded random walk. Tagged in the run outcome.
    Synthetic {
        #[serde(default = "default_seed")]
        seed: u64,
    },
}

fn default_seed() -> u64 {
    42
}

impl Default for DataConfig {
    fn default() -> Self {
        Self::Synthetic {
            seed: default_seed(),
        }
    }
}

impl DataConfig {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic { .. })
    }
}

/// Everything needed to reproduce one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub data: DataConfig,
}

impl RunConfig {
    pub fn new(backtest: BacktestConfig, data: DataConfig) -> Self {
        Self { backtest, data }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML run file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backtest.validate()?;
        Ok(())
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs (data settings included) share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
