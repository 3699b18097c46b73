//! BacktestStrategyWrapper: the temporal isolation boundary.
//!
//! Every strategy call in a backtest goes through `evaluate`, which:
//! 1. drops every bar stamped after the decision time `t`
//! 2. truncates to the last `window` bars when a lookback is configured
//! 3. skips the call (no signals, no error) when fewer than `required_min_bars` remain
//! 4. invokes `buy` then `sell` and checks that nothing returned is dated after `t`

use chrono::NaiveDateTime;
use tracing::trace;

use crate::domain::{Bar, Signal};
use crate::error::InvariantViolationError;
use crate::strategy::Strategy;

pub struct BacktestStrategyWrapper {
    strategy: Box<dyn Strategy>,
    window: Option<usize>,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
}

impl BacktestStrategyWrapper {
    /// Wrap `strategy`, using its declared window as the lookback.
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        let window = strategy.window().filter(|&w| w > 0);
        Self {
            strategy,
            window,
            start: None,
            end: None,
        }
    }

    /// Lookback used when the strategy declares no window of its own.
    pub fn with_default_lookback(mut self, lookback: Option<usize>) -> Self {
        if self.window.is_none() {
            self.window = lookback.filter(|&w| w > 0);
        }
        self
    }

    /// Override the lookback regardless of the strategy's declaration.
    pub fn with_window(mut self, window: Option<usize>) -> Self {
        self.window = window.filter(|&w| w > 0);
        self
    }

    /// Restrict the visible history to `[start, end]`.
    pub fn with_bounds(mut self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub fn window(&self) -> Option<usize> {
        self.window
    }

    /// The exact slice the strategy would receive at decision time `t`.
    ///
    /// `bars` must be sorted ascending by timestamp.
    pub fn view<'a>(&self, bars: &'a [Bar], t: NaiveDateTime) -> &'a [Bar] {
        let cutoff = match self.end {
            Some(end) if end < t => end,
            _ => t,
        };
        let hi = bars.partition_point(|b| b.timestamp <= cutoff);
        let lo = match self.start {
            Some(start) => bars[..hi].partition_point(|b| b.timestamp < start),
            None => 0,
        };
        let visible = &bars[lo..hi];
        match self.window {
            Some(n) if visible.len() > n => &visible[visible.len() - n..],
            _ => visible,
        }
    }

    /// Evaluate the strategy for `ticker` at decision time `t`.
    ///
    /// Insufficient history returns an empty vector. A strategy that emits a
    /// signal dated after `t`, or with a non-positive price, is a defect.
    pub fn evaluate(
        &self,
        bars: &[Bar],
        ticker: &str,
        t: NaiveDateTime,
    ) -> Result<Vec<Signal>, InvariantViolationError> {
        let window = self.view(bars, t);
        let required = self.strategy.required_min_bars();
        if window.len() < required || window.is_empty() {
            trace!(
                ticker,
                %t,
                available = window.len(),
                required,
                "insufficient history, skipping strategy"
            );
            return Ok(Vec::new());
        }

        let mut signals = self.strategy.buy(window, ticker);
        signals.extend(self.strategy.sell(window, ticker));

        for signal in &signals {
            if signal.timestamp > t {
                return Err(InvariantViolationError::FutureSignal {
                    ticker: ticker.to_string(),
                    signal_time: signal.timestamp,
                    decision_time: t,
                });
            }
            if !(signal.price.is_finite() && signal.price > 0.0) {
                return Err(InvariantViolationError::InvalidPrice {
                    ticker: ticker.to_string(),
                    price: signal.price,
                });
            }
        }
        Ok(signals)
    }
}

impl std::fmt::Debug for BacktestStrategyWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacktestStrategyWrapper")
            .field("strategy", &self.strategy.name())
            .field("window", &self.window)
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}
