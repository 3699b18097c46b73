//! Strategy trait and built-in strategies.
//!
//! A strategy sees only the bounded window the wrapper hands it and returns
//! candidate signals for the most recent bar. It holds no per-run state.

pub mod crossover;
pub mod ema_crossover;
pub mod sma_crossover;

pub use ema_crossover::EmaCrossover;
pub use sma_crossover::SmaCrossover;

use crate::domain::{Bar, Side, Signal, SignalType};
use crate::error::ConfigurationError;
use crate::params::{FromConfig, ParamError, Params};
use crate::registry::Registry;
use crate::study::StudySpec;

/// Trait for signal-producing strategies.
///
/// # Architecture invariant
/// `buy`/`sell` receive an already-truncated window whose last bar is the
/// most recent bar at decision time. Strategies cannot reach any other data.
pub trait Strategy: Send + Sync {
    /// Human-readable name (e.g., "sma_crossover_10_20").
    fn name(&self) -> &str;

    fn side(&self) -> Side;

    /// Lookback bar count. `None` defers to the collector's default.
    fn window(&self) -> Option<usize> {
        None
    }

    /// Studies this strategy computes over its window.
    fn study_specs(&self) -> Vec<StudySpec> {
        Vec::new()
    }

    /// Minimum window length below which the strategy is not invoked.
    fn required_min_bars(&self) -> usize {
        self.study_specs()
            .iter()
            .map(StudySpec::min_bars)
            .max()
            .unwrap_or(1)
    }

    fn buy(&self, window: &[Bar], ticker: &str) -> Vec<Signal>;

    fn sell(&self, window: &[Bar], ticker: &str) -> Vec<Signal>;
}

pub type StrategyFactory = fn(&Params) -> Result<Box<dyn Strategy>, ParamError>;

fn boxed<T: Strategy + FromConfig + 'static>(params: &Params) -> Result<Box<dyn Strategy>, ParamError> {
    Ok(Box::new(T::from_config(params)?))
}

/// Built-in strategy registration list.
pub fn register_builtins(
    registry: &mut Registry<StrategyFactory>,
) -> Result<(), ConfigurationError> {
    registry.register_type::<SmaCrossover>(boxed::<SmaCrossover>)?;
    registry.register_type::<EmaCrossover>(boxed::<EmaCrossover>)?;
    Ok(())
}

/// Round to 4 decimal places, the precision signals are emitted at.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// One signal at the last bar of `window`, priced at its close.
pub fn build_price_signal(
    window: &[Bar],
    ticker: &str,
    signal_type: SignalType,
    side: Side,
) -> Option<Signal> {
    let last = window.last()?;
    if !(last.close.is_finite() && last.close > 0.0) {
        return None;
    }
    Some(Signal::new(
        last.timestamp,
        ticker,
        signal_type,
        side,
        round4(last.close),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_bars, ts};

    struct Fixed;

    impl Strategy for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn side(&self) -> Side {
            Side::Long
        }
        fn buy(&self, window: &[Bar], ticker: &str) -> Vec<Signal> {
            build_price_signal(window, ticker, SignalType::Buy, self.side())
                .into_iter()
                .collect()
        }
        fn sell(&self, _window: &[Bar], _ticker: &str) -> Vec<Signal> {
            Vec::new()
        }
    }

    #[test]
    fn default_min_bars_without_studies_is_one() {
        assert_eq!(Fixed.required_min_bars(), 1);
        assert_eq!(Fixed.window(), None);
    }

    #[test]
    fn price_signal_uses_last_close_rounded() {
        let bars = make_bars(&[10.0, 11.123456]);
        let signals = Fixed.buy(&bars, "AAPL");
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].price, 11.1235);
        assert_eq!(signals[0].timestamp, ts(1));
        assert_eq!(signals[0].ticker, "AAPL");
    }

    #[test]
    fn price_signal_on_empty_window_is_none() {
        assert!(build_price_signal(&[], "AAPL", SignalType::Buy, Side::Long).is_none());
    }

    #[test]
    fn builtins_construct_from_params() {
        let mut registry = Registry::new("strategy");
        register_builtins(&mut registry).unwrap();
        let factory = registry.resolve("sma-crossover").unwrap();
        let strategy = factory(&Params::new().with("short", 5).with("long", 12)).unwrap();
        assert_eq!(strategy.required_min_bars(), 12);
    }
}
