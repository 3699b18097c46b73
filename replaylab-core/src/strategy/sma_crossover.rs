//! SMA crossover: buy when the short SMA crosses above the long SMA, sell on the reverse.

use crate::domain::{Bar, Side, Signal, SignalType};
use crate::params::{FromConfig, ParamError, Params};
use crate::study::{StudyKind, StudySpec};

use super::crossover::{Cross, Crossover};
use super::Strategy;

#[derive(Debug, Clone)]
pub struct SmaCrossover {
    inner: Crossover,
    name: String,
}

impl SmaCrossover {
    pub const DEFAULT_SHORT: usize = 10;
    pub const DEFAULT_LONG: usize = 20;
    pub const DEFAULT_WINDOW: usize = 120;

    pub fn new(short: usize, long: usize, window: usize, side: Side) -> Result<Self, ParamError> {
        Ok(Self::wrap(Crossover::new(
            StudyKind::Sma,
            short,
            long,
            window,
            side,
        )?))
    }

    fn wrap(inner: Crossover) -> Self {
        let name = format!("sma_crossover_{}_{}", inner.short, inner.long);
        Self { inner, name }
    }
}

impl FromConfig for SmaCrossover {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        Crossover::from_params(
            StudyKind::Sma,
            params,
            (Self::DEFAULT_SHORT, Self::DEFAULT_LONG, Self::DEFAULT_WINDOW),
        )
        .map(Self::wrap)
    }
}

impl Strategy for SmaCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn side(&self) -> Side {
        self.inner.side
    }

    fn window(&self) -> Option<usize> {
        Some(self.inner.window)
    }

    fn study_specs(&self) -> Vec<StudySpec> {
        self.inner.specs()
    }

    fn buy(&self, window: &[Bar], ticker: &str) -> Vec<Signal> {
        self.inner
            .signal(window, ticker, Cross::Bullish, SignalType::Buy)
    }

    fn sell(&self, window: &[Bar], ticker: &str) -> Vec<Signal> {
        self.inner
            .signal(window, ticker, Cross::Bearish, SignalType::Sell)
    }
}
