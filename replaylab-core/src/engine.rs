//! Backtest engine: replays history one decision timestamp at a time.
//!
//! Per timestamp:
//! 1. Release settled cash and mark held positions at the last close ≤ t
//! 2. Collect fresh, deduplicated signals from the wrapped strategy
//! 3. Gate each signal through filters, position rules and portfolio rules
//! 4. Size accepted entries and hand everything that survives to execution
//!
//! Every component is built and validated before the first step, and the
//! run is a pure function of its config and data.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::collector::{Progress, SignalCollector};
use crate::data::{DataSource, Universe};
use crate::domain::{ClosedTrade, Signal};
use crate::error::{ConfigurationError, EngineError, InvariantViolationError};
use crate::execution::{ExecutionConfig, ExecutionSimulator, Intent};
use crate::filter::FilterContext;
use crate::pipeline::{build_strategy, Pipeline, PipelineBuildError, PipelineConfig, PipelineEntry};
use crate::portfolio::{PortfolioRuleContext, PortfolioState, TradingCalendar};
use crate::position::{PositionRuleContext, PositionVerdict};
use crate::registry::Registries;
use crate::results::{fingerprint, BacktestResults, StageCounts, SummaryStats, SCHEMA_VERSION};
use crate::time_stepper::{Granularity, TimeStepper};
use crate::wrapper::BacktestStrategyWrapper;

fn default_initial_capital() -> f64 {
    100_000.0
}

fn default_risk_free_rate() -> f64 {
    0.04
}

fn default_parallel() -> bool {
    true
}

/// Everything one run needs besides the data itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub tickers: Vec<String>,
    /// First decision timestamp.
    pub start: NaiveDateTime,
    /// Last decision timestamp (inclusive).
    pub end: NaiveDateTime,
    /// Earliest bar loaded, so studies are warm at `start`. Defaults to `start`.
    #[serde(default)]
    pub history_start: Option<NaiveDateTime>,
    #[serde(default)]
    pub granularity: Granularity,
    /// Lookback used when the strategy declares no window.
    #[serde(default)]
    pub lookback_bars: Option<usize>,
    pub strategy: PipelineEntry,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Annual rate used by the Sharpe ratio.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Evaluate tickers on the rayon pool. Output does not depend on it.
    #[serde(default = "default_parallel", skip_serializing)]
    pub parallel: bool,
}

impl BacktestConfig {
    pub fn new(
        tickers: Vec<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        strategy: PipelineEntry,
    ) -> Self {
        Self {
            tickers,
            start,
            end,
            history_start: None,
            granularity: Granularity::default(),
            lookback_bars: None,
            strategy,
            pipeline: PipelineConfig::default(),
            execution: ExecutionConfig::default(),
            initial_capital: default_initial_capital(),
            risk_free_rate: default_risk_free_rate(),
            parallel: true,
        }
    }

    /// Reject setups that cannot run, before any data is loaded.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.tickers.is_empty() {
            return Err(ConfigurationError::Invalid("no tickers configured".into()));
        }
        if self.start > self.end {
            return Err(ConfigurationError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }
        if let Some(history_start) = self.history_start {
            if history_start > self.start {
                return Err(ConfigurationError::Invalid(format!(
                    "history_start {history_start} is after start {}",
                    self.start
                )));
            }
        }
        self.granularity.step()?;
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigurationError::Invalid(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigurationError::Invalid("risk_free_rate must be finite".into()));
        }
        let costs = [
            ("slippage_bps", self.execution.slippage_bps),
            ("commission_per_share", self.execution.commission_per_share),
        ];
        for (name, value) in costs {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigurationError::Invalid(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        let fraction = self.pipeline.portfolio.default_allocation_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigurationError::Invalid(format!(
                "default_allocation_fraction must be in (0, 1], got {fraction}"
            )));
        }
        Ok(())
    }

    /// Stable identity of this configuration.
    pub fn run_hash(&self) -> Result<String, ConfigurationError> {
        fingerprint(self)
            .map_err(|e| ConfigurationError::Invalid(format!("config is not serializable: {e}")))
    }
}

/// Run one backtest to completion.
///
/// Configuration and pipeline problems are reported before any data is
/// read. Checks `cancel` before every timestamp.
pub fn run_backtest(
    config: &BacktestConfig,
    registries: &Registries,
    source: &dyn DataSource,
    cancel: &CancellationToken,
) -> Result<BacktestResults, EngineError> {
    config.validate()?;
    let run_hash = config.run_hash()?;

    // ─── Build ───
    let strategy = build_strategy(&config.strategy, registries);
    let pipeline = config.pipeline.build(registries);
    let (strategy, pipeline) = match (strategy, pipeline) {
        (Ok(strategy), Ok(pipeline)) => (strategy, pipeline),
        (strategy, pipeline) => {
            let mut issues: Vec<_> = strategy.err().into_iter().collect();
            if let Err(err) = pipeline {
                issues.extend(err.issues);
            }
            return Err(PipelineBuildError { issues }.into());
        }
    };

    // ─── Load ───
    let history_start = config.history_start.unwrap_or(config.start);
    let universe = Universe::load(source, &config.tickers, history_start, config.end)?;
    let granularity = config.granularity.resolve(universe.series())?;
    let stepper = TimeStepper::with_granularity(config.start, config.end, granularity)?;

    let wrapper = BacktestStrategyWrapper::new(strategy)
        .with_default_lookback(config.lookback_bars)
        .with_bounds(None, Some(config.end));
    let strategy_name = wrapper.strategy().name().to_string();

    info!(
        run_hash = %run_hash,
        strategy = %strategy_name,
        tickers = universe.len(),
        steps = stepper.len(),
        ?granularity,
        "backtest started"
    );

    let mut run = Run {
        state: PortfolioState::new(
            config.initial_capital,
            TradingCalendar::from_universe(&universe),
            pipeline.portfolio.config().settlement_lag_days,
        ),
        position_limit: pipeline.portfolio.max_positions_per_ticker(),
        pipeline,
        simulator: ExecutionSimulator::new(config.execution),
        universe: &universe,
        counts: StageCounts::default(),
    };
    let mut collector = SignalCollector::new().with_parallelism(config.parallel);
    let mut progress = Progress::new(stepper.len());
    let mut signals = Vec::new();

    // ─── Replay ───
    for (i, t) in stepper.iter().enumerate() {
        if cancel.is_cancelled() {
            info!(at = %t, "backtest cancelled");
            return Err(EngineError::Cancelled { at: t });
        }
        run.state.release_settlements(t.date());
        run.mark(t);

        let fresh = collector.collect_at(&wrapper, &universe, t)?;
        for signal in &fresh {
            run.process(signal)?;
        }
        signals.extend(fresh);
        progress.tick(i + 1, signals.len());
    }

    // ─── Results ───
    let Run {
        mut state,
        simulator,
        mut counts,
        ..
    } = run;
    counts.signals = collector.collected();
    counts.duplicates = collector.duplicates();

    let final_equity = state.net_liquidation_value();
    state.settle_all();
    let open_positions = state.positions().values().cloned().collect();
    let (trades, mut closed_trades) = simulator.into_journal().into_parts();
    score_efficiency(&mut closed_trades, &universe);
    let summary = SummaryStats::compute(&closed_trades, config.initial_capital, config.risk_free_rate);

    info!(
        run_hash = %run_hash,
        signals = counts.signals,
        executed = counts.executed,
        closed = summary.total_trades,
        total_profit = summary.total_profit,
        "backtest complete"
    );

    Ok(BacktestResults {
        schema_version: SCHEMA_VERSION,
        run_hash,
        strategy: strategy_name,
        tickers: universe.tickers().into_iter().map(str::to_string).collect(),
        start: config.start,
        end: config.end,
        steps: stepper.len(),
        initial_capital: config.initial_capital,
        final_cash: state.cash(),
        final_equity,
        counts,
        summary,
        signals,
        trades,
        closed_trades,
        open_positions,
    })
}

/// Fill in each round trip's efficiency from the bars it was held over.
fn score_efficiency(closed: &mut [ClosedTrade], universe: &Universe) {
    for trade in closed {
        let window = universe.get(&trade.ticker).map_or(&[][..], |series| {
            series.between(trade.entry_timestamp, trade.exit_timestamp)
        });
        let efficiency = trade.efficiency_over(window);
        trade.efficiency = efficiency;
    }
}

/// Mutable state of a run in progress.
struct Run<'u> {
    pipeline: Pipeline,
    state: PortfolioState,
    simulator: ExecutionSimulator,
    position_limit: Option<usize>,
    universe: &'u Universe,
    counts: StageCounts,
}

impl Run<'_> {
    /// Mark every held ticker at its last close at or before `t`.
    fn mark(&mut self, t: NaiveDateTime) {
        let marks: Vec<(String, f64)> = self
            .state
            .positions()
            .keys()
            .filter_map(|ticker| {
                let bar = self.universe.get(ticker)?.up_to(t).last()?;
                Some((ticker.clone(), bar.close))
            })
            .collect();
        for (ticker, price) in marks {
            self.state.mark(&ticker, price);
        }
    }

    fn process(&mut self, signal: &Signal) -> Result<(), InvariantViolationError> {
        let history = self
            .universe
            .get(&signal.ticker)
            .map_or(&[][..], |series| series.up_to(signal.timestamp));

        if !self.pipeline.filters.evaluate(&FilterContext::new(signal, history)) {
            self.counts.filtered += 1;
            return Ok(());
        }

        let verdict = self.pipeline.position.decide(&PositionRuleContext::new(
            signal,
            history,
            self.state.position(&signal.ticker),
        ));
        let intent = match verdict {
            PositionVerdict::Rejected { .. } => {
                self.counts.position_rejected += 1;
                return Ok(());
            }
            PositionVerdict::Enter => {
                let decision = self
                    .pipeline
                    .portfolio
                    .decide(&PortfolioRuleContext::new(signal, history, &self.state));
                if !decision.allow_entry {
                    self.counts.portfolio_rejected += 1;
                    return Ok(());
                }
                let quantity =
                    self.pipeline
                        .portfolio
                        .size(&decision, self.state.equity(), signal.price);
                if quantity <= 0.0 {
                    self.counts.zero_sized += 1;
                    warn!(
                        ticker = %signal.ticker,
                        timestamp = %signal.timestamp,
                        price = signal.price,
                        equity = self.state.equity(),
                        "entry sized to zero shares"
                    );
                    return Ok(());
                }
                Intent::Enter { quantity }
            }
            PositionVerdict::Exit { fraction } => {
                let decision = self
                    .pipeline
                    .portfolio
                    .decide(&PortfolioRuleContext::new(signal, history, &self.state));
                if !decision.allow_entry {
                    self.counts.portfolio_rejected += 1;
                    return Ok(());
                }
                Intent::Exit { fraction }
            }
        };

        match self
            .simulator
            .execute(signal, intent, &mut self.state, self.position_limit)?
        {
            Some(fill) => {
                self.counts.executed += 1;
                if fill.closed_position {
                    self.pipeline.position.position_closed(&signal.ticker);
                }
            }
            None => {
                self.counts.skipped += 1;
                debug!(ticker = %signal.ticker, timestamp = %signal.timestamp, "fill skipped");
            }
        }
        Ok(())
    }
}
