//! Signal admission filters and the AND-composed pipeline that runs them.
//!
//! Filters see one signal plus the ticker's history up to the signal time.
//! They return a plain verdict. A filter that cannot decide (missing field,
//! too little history) rejects: filtering is total.

pub mod comparison;
pub mod price_comparison;
pub mod sma_comparison;
pub mod volume_above;

pub use comparison::{Comparison, Operand};
pub use price_comparison::PriceComparison;
pub use sma_comparison::SmaComparison;
pub use volume_above::VolumeAbove;

use tracing::debug;

use crate::domain::{Bar, Signal};
use crate::error::ConfigurationError;
use crate::params::{FromConfig, ParamError, Params};
use crate::registry::Registry;

/// Read-only view handed to each filter.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub signal: &'a Signal,
    /// The signal ticker's bars with `timestamp <= signal.timestamp`.
    pub history: &'a [Bar],
}

impl<'a> FilterContext<'a> {
    pub fn new(signal: &'a Signal, history: &'a [Bar]) -> Self {
        Self { signal, history }
    }

    pub fn latest_bar(&self) -> Option<&'a Bar> {
        self.history.last()
    }
}

/// Trait for signal filters.
///
/// # Architecture invariant
/// Filters must not reference position or portfolio state, and must be free
/// of side effects so that short-circuiting is unobservable.
pub trait Filter: Send + Sync {
    /// Human-readable name (e.g., "volume_above_1000000").
    fn name(&self) -> &str;

    fn evaluate(&self, context: &FilterContext<'_>) -> bool;
}

pub type FilterFactory = fn(&Params) -> Result<Box<dyn Filter>, ParamError>;

fn boxed<T: Filter + FromConfig + 'static>(params: &Params) -> Result<Box<dyn Filter>, ParamError> {
    Ok(Box::new(T::from_config(params)?))
}

/// Built-in filter registration list.
pub fn register_builtins(registry: &mut Registry<FilterFactory>) -> Result<(), ConfigurationError> {
    registry.register_type::<PriceComparison>(boxed::<PriceComparison>)?;
    registry.register_type::<VolumeAbove>(boxed::<VolumeAbove>)?;
    registry.register_type::<SmaComparison>(boxed::<SmaComparison>)?;
    Ok(())
}

/// Ordered filters with AND semantics.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Name of the first filter that rejects, or `None` if every filter passes.
    ///
    /// Filters after the first rejection are not invoked.
    pub fn first_rejection(&self, context: &FilterContext<'_>) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| !f.evaluate(context))
            .map(|f| f.name())
    }

    pub fn evaluate(&self, context: &FilterContext<'_>) -> bool {
        match self.first_rejection(context) {
            None => true,
            Some(name) => {
                debug!(
                    filter = name,
                    ticker = %context.signal.ticker,
                    timestamp = %context.signal.timestamp,
                    "filter rejected signal"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("filters", &self.names())
            .finish()
    }
}
