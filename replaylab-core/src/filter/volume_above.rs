//! Minimum traded volume at signal time.

use crate::params::{FromConfig, ParamError, Params};

use super::{Filter, FilterContext};

/// Passes when the average volume of the last `window` bars exceeds `min_volume`.
///
/// With `window = 1` (the default) this is the signal bar's own volume.
/// Fewer than `window` bars of history rejects.
#[derive(Debug, Clone)]
pub struct VolumeAbove {
    min_volume: f64,
    window: usize,
    name: String,
}

impl VolumeAbove {
    /// # Panics
    ///
    /// Panics if `window` is 0. `from_config` reports that as a `ParamError`.
    pub fn new(min_volume: f64, window: usize) -> Self {
        assert!(window >= 1, "volume window must be >= 1");
        Self {
            min_volume,
            window,
            name: format!("volume_above_{min_volume}_{window}"),
        }
    }
}

impl FromConfig for VolumeAbove {
    fn from_config(params: &Params) -> Result<Self, ParamError> {
        let min_volume = params.f64("min_volume")?;
        let window = params.usize_or("window", 1)?;
        if window == 0 {
            return Err(ParamError::invalid("window", "must be at least 1"));
        }
        Ok(Self::new(min_volume, window))
    }
}

impl Filter for VolumeAbove {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &FilterContext<'_>) -> bool {
        let history = context.history;
        if history.len() < self.window {
            return false;
        }
        let recent = &history[history.len() - self.window..];
        let avg = recent.iter().map(|b| b.volume as f64).sum::<f64>() / self.window as f64;
        avg > self.min_volume
    }
}
