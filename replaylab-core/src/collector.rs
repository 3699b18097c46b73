//! SignalCollector: evaluates the wrapped strategy across the universe and
//! deduplicates what comes back.
//!
//! Within one timestamp, tickers are independent and are evaluated on the
//! rayon pool. Results are gathered back in ticker order before anything is
//! deduplicated, so the output never depends on thread scheduling.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::data::Universe;
use crate::domain::{Signal, SignalKey};
use crate::error::{EngineError, InvariantViolationError};
use crate::time_stepper::TimeStepper;
use crate::wrapper::BacktestStrategyWrapper;

#[derive(Debug, Clone, Default)]
pub struct SignalCollector {
    seen: HashSet<SignalKey>,
    duplicates: usize,
    sequential: bool,
}

impl SignalCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables parallel per-ticker evaluation.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.sequential = !parallel;
        self
    }

    /// Signals discarded as repeats of an already-collected key.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Distinct signals accepted so far.
    pub fn collected(&self) -> usize {
        self.seen.len()
    }

    /// Evaluate every ticker at `t` and return the signals not seen before,
    /// ordered by ticker then emission order.
    pub fn collect_at(
        &mut self,
        wrapper: &BacktestStrategyWrapper,
        universe: &Universe,
        t: NaiveDateTime,
    ) -> Result<Vec<Signal>, InvariantViolationError> {
        let evaluate = |series: &crate::domain::OhlcvSeries| {
            wrapper.evaluate(series.bars(), series.ticker(), t)
        };
        let per_ticker: Vec<Result<Vec<Signal>, InvariantViolationError>> = if self.sequential {
            universe.iter().map(evaluate).collect()
        } else {
            universe.series().par_iter().map(evaluate).collect()
        };

        let mut fresh = Vec::new();
        for result in per_ticker {
            for signal in result? {
                if self.seen.insert(signal.key()) {
                    fresh.push(signal);
                } else {
                    self.duplicates += 1;
                    debug!(
                        ticker = %signal.ticker,
                        timestamp = %signal.timestamp,
                        signal_type = %signal.signal_type,
                        "duplicate signal discarded"
                    );
                }
            }
        }
        Ok(fresh)
    }

    /// Drive `stepper` to completion and return every distinct signal.
    ///
    /// Cancellation is checked before each timestamp.
    pub fn collect(
        &mut self,
        stepper: &TimeStepper,
        wrapper: &BacktestStrategyWrapper,
        universe: &Universe,
        cancel: &CancellationToken,
    ) -> Result<Vec<Signal>, EngineError> {
        let total = stepper.len();
        let mut progress = Progress::new(total);
        let mut all = Vec::new();

        for (i, t) in stepper.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled { at: t });
            }
            all.extend(self.collect_at(wrapper, universe, t)?);
            progress.tick(i + 1, all.len());
        }

        info!(
            strategy = wrapper.strategy().name(),
            signals = all.len(),
            duplicates = self.duplicates,
            "signal collection complete"
        );
        Ok(all)
    }
}

/// Emits an `info!` event each time another 10% of the timeline is done.
#[derive(Debug, Clone)]
pub(crate) struct Progress {
    total: usize,
    next_pct: usize,
}

impl Progress {
    pub(crate) fn new(total: usize) -> Self {
        Self { total, next_pct: 10 }
    }

    pub(crate) fn tick(&mut self, done: usize, signals: usize) {
        if self.total == 0 {
            return;
        }
        let pct = done * 100 / self.total;
        if pct >= self.next_pct {
            info!(pct, done, total = self.total, signals, "backtest progress");
            self.next_pct = (pct / 10 + 1) * 10;
        }
    }
}
