//! Simple Moving Average (SMA).
//!
//! Rolling mean of one bar field over a fixed window.
//! The first `window - 1` values are NaN; any NaN inside a window yields NaN.

use crate::domain::{Bar, PriceField};

use super::Study;

#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
    field: PriceField,
    name: String,
}

impl Sma {
    /// # Panics
    ///
    /// Panics if `window` is 0.
    pub fn new(window: usize, field: PriceField) -> Self {
        assert!(window >= 1, "SMA window must be >= 1");
        Self {
            window,
            field,
            name: format!("sma_{window}_{field}"),
        }
    }
}

impl Study for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_bars(&self) -> usize {
        self.window
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.window {
            return result;
        }

        let values: Vec<f64> = bars.iter().map(|b| b.field(self.field)).collect();
        let mut sum = 0.0;
        let mut nan_count = 0usize;

        for i in 0..n {
            let entering = values[i];
            if entering.is_nan() {
                nan_count += 1;
            } else {
                sum += entering;
            }
            if i >= self.window {
                let leaving = values[i - self.window];
                if leaving.is_nan() {
                    nan_count -= 1;
                } else {
                    sum -= leaving;
                }
            }
            if i + 1 >= self.window && nan_count == 0 {
                result[i] = sum / self.window as f64;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let result = Sma::new(5, PriceField::Close).compute(&bars);

        assert_eq!(result.len(), 7);
        for (i, v) in result.iter().take(4).enumerate() {
            assert!(v.is_nan(), "expected NaN at index {i}");
        }
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
        assert_approx(result[5], 13.0, DEFAULT_EPSILON);
        assert_approx(result[6], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_identity() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let result = Sma::new(1, PriceField::Close).compute(&bars);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_nan_propagation() {
        let mut bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        bars[2].close = f64::NAN;
        let result = Sma::new(3, PriceField::Close).compute(&bars);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
        assert!(result[4].is_nan());
        assert_approx(result[5], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_over_volume() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let result = Sma::new(2, PriceField::Volume).compute(&bars);
        assert_approx(result[1], 1000.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_too_few_bars() {
        let bars = make_bars(&[10.0, 11.0]);
        let result = Sma::new(5, PriceField::Close).compute(&bars);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn truncated_series_matches_full_prefix() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        let sma = Sma::new(7, PriceField::Close);
        let full = sma.compute(&bars);
        let truncated = sma.compute(&bars[..25]);
        for i in 6..25 {
            assert_approx(truncated[i], full[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    #[should_panic(expected = "SMA window must be >= 1")]
    fn zero_window_panics() {
        Sma::new(0, PriceField::Close);
    }
}
