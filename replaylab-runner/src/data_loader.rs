//! Bar loading for the runner.
//!
//! Resolves a run's `[data]` table into an in-memory data source:
//! 1. `csv` → one `<TICKER>.csv` per ticker (date or datetime stamps)
//! 2. `synthetic` → seeded random walk over weekdays
//!
//! Either way every ticker must load; a missing file fails the run.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use replaylab_core::data::{DataError, InMemoryDataSource};
use replaylab_core::domain::Bar;

use crate::config::{DataConfig, RunConfig};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}, row {row}: {reason}")]
    InvalidBar {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Loaded bars plus provenance.
#[derive(Debug)]
pub struct LoadedData {
    pub source: InMemoryDataSource,
    /// BLAKE3 over every bar, in ticker order.
    pub dataset_hash: String,
    pub synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "datetime", alias = "time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(t);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Read one ticker's bars from a headered CSV file.
///
/// Rows may arrive in any order; they are sorted by timestamp. Duplicate
/// timestamps and non-finite prices are rejected.
pub fn load_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut bars = Vec::new();
    for (i, record) in reader.deserialize::<CsvRow>().enumerate() {
        let row = i + 1;
        let invalid = |reason: String| LoadError::InvalidBar {
            path: path.to_path_buf(),
            row,
            reason,
        };
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let timestamp = parse_timestamp(&record.timestamp)
            .ok_or_else(|| invalid(format!("unparseable timestamp '{}'", record.timestamp)))?;
        if !record.volume.is_finite() || record.volume < 0.0 {
            return Err(invalid(format!("invalid volume {}", record.volume)));
        }
        let bar = Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume.round() as u64,
        };
        if !bar.is_sane() {
            return Err(invalid("prices are not finite and positive".into()));
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.timestamp);
    if let Some(pair) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
        return Err(LoadError::InvalidBar {
            path: path.to_path_buf(),
            row: 0,
            reason: format!("duplicate timestamp {}", pair[0].timestamp),
        });
    }
    debug!(path = %path.display(), bars = bars.len(), "loaded CSV");
    Ok(bars)
}

/// Load `<dir>/<TICKER>.csv` for every ticker.
pub fn load_csv_dir(dir: &Path, tickers: &[String]) -> Result<InMemoryDataSource, LoadError> {
    let mut source = InMemoryDataSource::new();
    for ticker in tickers {
        let path = dir.join(format!("{ticker}.csv"));
        if !path.exists() {
            return Err(LoadError::Data(DataError::TickerNotFound {
                ticker: ticker.clone(),
            }));
        }
        source.insert_bars(ticker.clone(), load_csv(&path)?)?;
    }
    Ok(source)
}

/// Generate synthetic daily bars for testing/development.
///
/// A random walk from 100.0, seeded from `seed` and the ticker so each
/// ticker gets its own stable path. Weekends are skipped.
pub fn generate_synthetic_bars(
    ticker: &str,
    seed: u64,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Bar> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(ticker.as_bytes());
    let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;
    while current <= end {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        if let Some(timestamp) = current.and_hms_opt(0, 0, 0) {
            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        price = close;
        current += chrono::Duration::days(1);
    }
    bars
}

/// Synthetic source covering `[start, end]` for every ticker.
pub fn synthetic_source(
    tickers: &[String],
    seed: u64,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<InMemoryDataSource, LoadError> {
    let mut source = InMemoryDataSource::new();
    for ticker in tickers {
        let bars = generate_synthetic_bars(ticker, seed, start.date(), end.date());
        source.insert_bars(ticker.clone(), bars)?;
    }
    Ok(source)
}

/// Resolve a run's data table into loaded bars.
pub fn load_source(config: &RunConfig) -> Result<LoadedData, LoadError> {
    let backtest = &config.backtest;
    let (source, synthetic) = match &config.data {
        DataConfig::Csv { dir } => (load_csv_dir(dir, &backtest.tickers)?, false),
        DataConfig::Synthetic { seed } => {
            warn!(
                seed,
                "generating synthetic data; results will be tagged as synthetic"
            );
            let from = backtest.history_start.unwrap_or(backtest.start);
            (
                synthetic_source(&backtest.tickers, *seed, from, backtest.end)?,
                true,
            )
        }
    };
    let dataset_hash = dataset_hash(&source, &backtest.tickers);
    info!(
        tickers = backtest.tickers.len(),
        synthetic,
        dataset_hash = &dataset_hash[..16],
        "data loaded"
    );
    Ok(LoadedData {
        source,
        dataset_hash,
        synthetic,
    })
}

/// Deterministic BLAKE3 hash over all bars of `tickers`, in sorted ticker order.
pub fn dataset_hash(source: &InMemoryDataSource, tickers: &[String]) -> String {
    let mut sorted: Vec<&String> = tickers.iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut hasher = blake3::Hasher::new();
    for ticker in sorted {
        hasher.update(ticker.as_bytes());
        let Some(series) = source.series(ticker) else {
            continue;
        };
        for bar in series.bars() {
            hasher.update(bar.timestamp.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
