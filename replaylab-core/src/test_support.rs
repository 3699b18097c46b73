//! Synthetic bar builders shared by unit tests.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::domain::{Bar, OhlcvSeries};

/// Daily timestamp `i` days after 2024-01-02 00:00.
pub fn ts(i: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i)
}

/// Create daily bars from close prices.
///
/// open = prev_close (or close for first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000.
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: ts(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

pub fn make_series(ticker: &str, closes: &[f64]) -> OhlcvSeries {
    OhlcvSeries::new(ticker, make_bars(closes)).unwrap()
}

/// Assert two f64 values are approximately equal (within epsilon).
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

pub const DEFAULT_EPSILON: f64 = 1e-10;
