//! Synthetic data shared by the integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use replaylab_core::domain::{Bar, Side, Signal, SignalType};
use replaylab_core::params::{ParamError, Params};
use replaylab_core::registry::Registries;
use replaylab_core::strategy::{build_price_signal, Strategy};
use replaylab_core::InMemoryDataSource;

/// Daily timestamp `i` days after 2024-01-02 00:00.
pub fn ts(i: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i)
}

/// Daily bars from close prices with a fixed volume.
pub fn bars_from_closes(closes: &[f64], volume: u64) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: ts(i as i64),
                open,
                high: open.max(close) + 0.5,
                low: (open.min(close) - 0.5).max(0.01),
                close,
                volume,
            }
        })
        .collect()
}

/// Deterministic pseudo-random walk, floored at 10.
pub fn walk(n: usize, seed: u64) -> Vec<f64> {
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            let x = (i as u64 ^ seed)
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            price += ((x >> 33) % 200) as f64 * 0.05 - 5.0;
            price = f64::max(price, 10.0);
            (price * 100.0).round() / 100.0
        })
        .collect()
}

/// Source with one random-walk series per ticker.
pub fn walk_source(tickers: &[&str], n: usize) -> InMemoryDataSource {
    let mut source = InMemoryDataSource::new();
    for (i, ticker) in tickers.iter().enumerate() {
        source
            .insert_bars(*ticker, bars_from_closes(&walk(n, i as u64 + 1), 1_000_000))
            .unwrap();
    }
    source
}

/// Buys on every bar once `min_bars` are visible, within a fixed window.
#[derive(Debug)]
pub struct EveryBar {
    pub window: usize,
    pub min_bars: usize,
}

impl Strategy for EveryBar {
    fn name(&self) -> &str {
        "every_bar"
    }
    fn side(&self) -> Side {
        Side::Long
    }
    fn window(&self) -> Option<usize> {
        Some(self.window)
    }
    fn required_min_bars(&self) -> usize {
        self.min_bars
    }
    fn buy(&self, window: &[Bar], ticker: &str) -> Vec<Signal> {
        build_price_signal(window, ticker, SignalType::Buy, Side::Long)
            .into_iter()
            .collect()
    }
    fn sell(&self, _window: &[Bar], _ticker: &str) -> Vec<Signal> {
        Vec::new()
    }
}

fn every_bar(params: &Params) -> Result<Box<dyn Strategy>, ParamError> {
    Ok(Box::new(EveryBar {
        window: params.usize_or("window", 10)?,
        min_bars: params.usize_or("min_bars", 1)?,
    }))
}

/// Built-ins plus `every-bar`.
pub fn registries() -> Registries {
    let mut registries = Registries::with_builtins().unwrap();
    registries
        .strategies
        .register("every-bar", std::any::type_name::<EveryBar>(), every_bar)
        .unwrap();
    registries
}
