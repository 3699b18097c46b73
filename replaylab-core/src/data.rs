//! Data source trait and structured error types.
//!
//! The engine only reads OHLCV history through `DataSource`, so storage
//! backends (CSV import, a time-series database, synthetic generators) can be
//! swapped or mocked. All history is loaded before a run starts.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::{Bar, OhlcvSeries};
use crate::error::ConfigurationError;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("ticker not found: {ticker}")]
    TickerNotFound { ticker: String },

    #[error("invalid series: {0}")]
    InvalidSeries(#[from] ConfigurationError),

    #[error("data error: {0}")]
    Other(String),
}

/// Read-only provider of ordered bar history.
pub trait DataSource: Send + Sync {
    /// Bars for `ticker` with `start <= timestamp <= end`, ascending.
    fn query(
        &self,
        ticker: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, DataError>;

    /// Tickers this source can serve, sorted.
    fn tickers(&self) -> Vec<String>;
}

/// Resident map of validated series.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    series: BTreeMap<String, OhlcvSeries>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a ticker's history.
    pub fn insert(&mut self, series: OhlcvSeries) {
        self.series.insert(series.ticker().to_string(), series);
    }

    /// Validate and insert raw bars.
    pub fn insert_bars(
        &mut self,
        ticker: impl Into<String>,
        bars: Vec<Bar>,
    ) -> Result<(), DataError> {
        self.insert(OhlcvSeries::new(ticker, bars)?);
        Ok(())
    }

    pub fn series(&self, ticker: &str) -> Option<&OhlcvSeries> {
        self.series.get(ticker)
    }
}

impl DataSource for InMemoryDataSource {
    fn query(
        &self,
        ticker: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, DataError> {
        let series = self
            .series
            .get(ticker)
            .ok_or_else(|| DataError::TickerNotFound {
                ticker: ticker.to_string(),
            })?;
        Ok(series.between(start, end).to_vec())
    }

    fn tickers(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }
}

/// The resident, ticker-sorted set of series a run trades.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    series: Vec<OhlcvSeries>,
}

impl Universe {
    /// Sort by ticker; duplicate tickers are a configuration error.
    pub fn new(mut series: Vec<OhlcvSeries>) -> Result<Self, ConfigurationError> {
        series.sort_by(|a, b| a.ticker().cmp(b.ticker()));
        if let Some(pair) = series.windows(2).find(|w| w[0].ticker() == w[1].ticker()) {
            return Err(ConfigurationError::Invalid(format!(
                "ticker '{}' appears more than once in the universe",
                pair[0].ticker()
            )));
        }
        Ok(Self { series })
    }

    /// Load every ticker from `source` over `[start, end]`.
    pub fn load(
        source: &dyn DataSource,
        tickers: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Self, DataError> {
        let mut series = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let bars = source.query(ticker, start, end)?;
            series.push(OhlcvSeries::new(ticker.clone(), bars)?);
        }
        Ok(Self::new(series)?)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OhlcvSeries> {
        self.series.iter()
    }

    pub fn series(&self) -> &[OhlcvSeries] {
        &self.series
    }

    pub fn get(&self, ticker: &str) -> Option<&OhlcvSeries> {
        self.series
            .binary_search_by(|s| s.ticker().cmp(ticker))
            .ok()
            .map(|i| &self.series[i])
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.series.iter().map(OhlcvSeries::ticker).collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
