//! Parameter sweep over strategy parameters, capital and universe.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{info, warn};

use replaylab_core::pipeline::build_strategy;
use replaylab_core::DataSource;

use crate::config::RunConfig;
use crate::runner::{RunOutcome, Runner};

/// Parameter grid specification.
///
/// Every combination of the listed values becomes one run. Strategy
/// parameters are overlaid on the base config's strategy entry.
#[derive(Debug, Clone, Default)]
pub struct ParamGrid {
    /// Strategy parameter name → values to try.
    pub strategy_params: BTreeMap<String, Vec<Value>>,

    /// Initial capital values to test. Empty keeps the base value.
    pub initial_capitals: Vec<f64>,

    /// Ticker sets to test. Empty keeps the base universe.
    pub universes: Vec<Vec<String>>,
}

impl ParamGrid {
    /// A small grid for the built-in crossover strategies.
    ///
    /// Short windows: 5, 10, 20
    /// Long windows: 20, 50, 100
    pub fn crossover_default() -> Self {
        let mut strategy_params = BTreeMap::new();
        strategy_params.insert("short".to_string(), vec![5.into(), 10.into(), 20.into()]);
        strategy_params.insert("long".to_string(), vec![20.into(), 50.into(), 100.into()]);
        Self {
            strategy_params,
            initial_capitals: Vec::new(),
            universes: Vec::new(),
        }
    }

    /// Total number of combinations, invalid ones included.
    pub fn size(&self) -> usize {
        self.strategy_params
            .values()
            .map(Vec::len)
            .product::<usize>()
            * self.initial_capitals.len().max(1)
            * self.universes.len().max(1)
    }

    /// Cartesian product of the strategy parameters, in key order.
    fn parameter_sets(&self) -> Vec<Vec<(&str, &Value)>> {
        let mut sets: Vec<Vec<(&str, &Value)>> = vec![Vec::new()];
        for (name, values) in &self.strategy_params {
            sets = sets
                .iter()
                .flat_map(|set| {
                    values.iter().map(move |value| {
                        let mut next = set.clone();
                        next.push((name.as_str(), value));
                        next
                    })
                })
                .collect();
        }
        sets
    }

    /// Generates every configuration in the grid.
    ///
    /// Each generated config runs its tickers sequentially; the sweep
    /// parallelizes across configs instead.
    pub fn generate_configs(&self, base_config: &RunConfig) -> Vec<RunConfig> {
        let capitals = if self.initial_capitals.is_empty() {
            vec![base_config.backtest.initial_capital]
        } else {
            self.initial_capitals.clone()
        };
        let universes = if self.universes.is_empty() {
            vec![base_config.backtest.tickers.clone()]
        } else {
            self.universes.clone()
        };

        let mut configs = Vec::with_capacity(self.size());
        for set in self.parameter_sets() {
            for &capital in &capitals {
                for universe in &universes {
                    let mut config = base_config.clone();
                    for &(name, value) in &set {
                        config
                            .backtest
                            .strategy
                            .parameters
                            .insert(name, value.clone());
                    }
                    config.backtest.initial_capital = capital;
                    config.backtest.tickers = universe.clone();
                    config.backtest.parallel = false;
                    configs.push(config);
                }
            }
        }
        configs
    }
}

/// Parameter sweep executor.
///
/// Runs backtests for all valid configurations in a grid, optionally in parallel.
pub struct ParamSweep {
    runner: Runner,
    parallel: bool,
}

impl ParamSweep {
    pub fn new(runner: Runner) -> Self {
        Self {
            runner,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Drop configs that fail validation or whose strategy cannot be built.
    fn valid_configs(&self, grid: &ParamGrid, base_config: &RunConfig) -> Vec<RunConfig> {
        grid.generate_configs(base_config)
            .into_iter()
            .filter(|config| {
                if let Err(e) = config.validate() {
                    warn!(error = %e, "skipping invalid sweep config");
                    return false;
                }
                match build_strategy(&config.backtest.strategy, self.runner.registries()) {
                    Ok(_) => true,
                    Err(issue) => {
                        warn!(
                            parameters = ?config.backtest.strategy.parameters,
                            %issue,
                            "skipping unbuildable strategy"
                        );
                        false
                    }
                }
            })
            .collect()
    }

    fn execute<F>(&self, configs: &[RunConfig], run: F) -> Result<SweepResults>
    where
        F: Fn(&RunConfig) -> Result<RunOutcome> + Send + Sync,
    {
        let outcomes: Vec<RunOutcome> = if self.parallel {
            configs.par_iter().map(&run).collect::<Result<Vec<_>>>()?
        } else {
            configs.iter().map(&run).collect::<Result<Vec<_>>>()?
        };
        info!(runs = outcomes.len(), "sweep complete");
        Ok(SweepResults::new(outcomes))
    }

    /// Executes a parameter sweep, loading each config's data as configured.
    pub fn sweep(&self, grid: &ParamGrid, base_config: &RunConfig) -> Result<SweepResults> {
        let configs = self.valid_configs(grid, base_config);
        self.execute(&configs, |config| {
            self.runner
                .run(config)
                .with_context(|| format!("sweep run failed: {:?}", config.backtest.strategy))
        })
    }

    /// Executes a parameter sweep against one pre-loaded source.
    pub fn sweep_with_source(
        &self,
        grid: &ParamGrid,
        base_config: &RunConfig,
        source: &dyn DataSource,
    ) -> Result<SweepResults> {
        let configs = self.valid_configs(grid, base_config);
        self.execute(&configs, |config| {
            self.runner
                .run_with_source(config, source)
                .with_context(|| format!("sweep run failed: {:?}", config.backtest.strategy))
        })
    }
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug)]
pub struct SweepResults {
    outcomes: Vec<RunOutcome>,
    by_run_id: HashMap<String, usize>,
}

impl SweepResults {
    fn new(outcomes: Vec<RunOutcome>) -> Self {
        let by_run_id = outcomes
            .iter()
            .enumerate()
            .map(|(i, o)| (o.run_id.clone(), i))
            .collect();
        Self {
            outcomes,
            by_run_id,
        }
    }

    pub fn all(&self) -> &[RunOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Gets an outcome by RunId.
    pub fn get(&self, run_id: &str) -> Option<&RunOutcome> {
        self.by_run_id.get(run_id).map(|&i| &self.outcomes[i])
    }

    /// Outcomes sorted by total realized profit (descending), ties by RunId.
    pub fn sorted_by_profit(&self) -> Vec<&RunOutcome> {
        let mut sorted: Vec<_> = self.outcomes.iter().collect();
        sorted.sort_by(|a, b| {
            b.results
                .summary
                .total_profit
                .total_cmp(&a.results.summary.total_profit)
                .then_with(|| a.run_id.cmp(&b.run_id))
        });
        sorted
    }

    pub fn top_n(&self, n: usize) -> Vec<&RunOutcome> {
        self.sorted_by_profit().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&RunOutcome> {
        self.sorted_by_profit().into_iter().next()
    }
}
