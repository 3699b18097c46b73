//! TimeStepper: the ordered decision timestamps of a backtest run.
//!
//! The sequence is lazy and restartable: `iter()` may be called any number of
//! times and always yields the same ascending timestamps from `start` up to
//! and including the last step that does not pass `end`.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::OhlcvSeries;
use crate::error::ConfigurationError;

/// Step size between decision timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Daily,
    Hourly,
    Minute,
    Second,
    /// Arbitrary step in seconds.
    Custom { seconds: i64 },
    /// Infer from the spacing of the loaded bars.
    Auto,
}

impl Granularity {
    /// Fixed step length, or `None` for `Auto`.
    ///
    /// A custom step must be positive and representable as a `Duration`.
    pub fn step(&self) -> Result<Option<Duration>, ConfigurationError> {
        let step = match *self {
            Self::Daily => Duration::days(1),
            Self::Hourly => Duration::hours(1),
            Self::Minute => Duration::minutes(1),
            Self::Second => Duration::seconds(1),
            Self::Custom { seconds } if seconds <= 0 => {
                return Err(ConfigurationError::NonPositiveGranularity { seconds });
            }
            Self::Custom { seconds } => Duration::try_seconds(seconds).ok_or_else(|| {
                ConfigurationError::Invalid(format!(
                    "custom granularity of {seconds}s is out of range"
                ))
            })?,
            Self::Auto => return Ok(None),
        };
        Ok(Some(step))
    }

    /// Replace `Auto` with the granularity inferred from `series`.
    pub fn resolve(self, series: &[OhlcvSeries]) -> Result<Granularity, ConfigurationError> {
        match self {
            Self::Auto => infer_granularity(series).ok_or_else(|| {
                ConfigurationError::Invalid(
                    "cannot infer granularity: fewer than two bars in every series".into(),
                )
            }),
            fixed => Ok(fixed),
        }
    }
}

/// Most common spacing between consecutive bars, bucketed to a standard granularity.
///
/// Ties resolve to the shorter spacing. Returns `None` when no series has two bars.
pub fn infer_granularity(series: &[OhlcvSeries]) -> Option<Granularity> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for s in series {
        for pair in s.bars().windows(2) {
            let secs = (pair[1].timestamp - pair[0].timestamp).num_seconds();
            *counts.entry(secs).or_default() += 1;
        }
    }
    let mut mode: Option<(i64, usize)> = None;
    for (&secs, &count) in &counts {
        if mode.map_or(true, |(_, best)| count > best) {
            mode = Some((secs, count));
        }
    }
    let (secs, _) = mode?;
    Some(if secs >= 86_400 {
        Granularity::Daily
    } else if secs >= 3_600 {
        Granularity::Hourly
    } else if secs >= 60 {
        Granularity::Minute
    } else {
        Granularity::Second
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeStepper {
    start: NaiveDateTime,
    end: NaiveDateTime,
    step: Duration,
}

impl TimeStepper {
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        step: Duration,
    ) -> Result<Self, ConfigurationError> {
        if start > end {
            return Err(ConfigurationError::InvalidTimeRange { start, end });
        }
        if step <= Duration::zero() {
            return Err(ConfigurationError::NonPositiveGranularity {
                seconds: step.num_seconds(),
            });
        }
        Ok(Self { start, end, step })
    }

    /// Build from a fixed granularity. `Auto` must be resolved first.
    pub fn with_granularity(
        start: NaiveDateTime,
        end: NaiveDateTime,
        granularity: Granularity,
    ) -> Result<Self, ConfigurationError> {
        let step = granularity.step()?.ok_or_else(|| {
            ConfigurationError::Invalid("granularity 'auto' must be resolved against data".into())
        })?;
        Self::new(start, end, step)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Number of timestamps the sequence yields.
    pub fn len(&self) -> usize {
        let span = (self.end - self.start).num_milliseconds();
        let step = self.step.num_milliseconds().max(1);
        (span / step) as usize + 1
    }

    /// Never empty: `start <= end` always yields `start`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> TimeSteps {
        TimeSteps {
            next: Some(self.start),
            end: self.end,
            step: self.step,
        }
    }
}

impl<'a> IntoIterator for &'a TimeStepper {
    type Item = NaiveDateTime;
    type IntoIter = TimeSteps;

    fn into_iter(self) -> TimeSteps {
        self.iter()
    }
}

/// Iterator over one pass of a `TimeStepper`.
#[derive(Debug, Clone)]
pub struct TimeSteps {
    next: Option<NaiveDateTime>,
    end: NaiveDateTime,
    step: Duration,
}

impl Iterator for TimeSteps {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        let current = self.next?;
        if current > self.end {
            self.next = None;
            return None;
        }
        self.next = current.checked_add_signed(self.step);
        Some(current)
    }
}
