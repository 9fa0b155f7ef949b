//! Indicator implementations and series helpers.
//!
//! Every indicator maps a full candle series to a numeric series of the same
//! length. Positions without enough history hold `f64::NAN`; the feature
//! engine treats NaN as "undefined" and drops those rows at finalization.
//!
//! Multi-output indicators (MACD, Bollinger) are exposed as separate named
//! instances per output, keeping the single-series trait unchanged.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod hurst;
pub mod rolling;
pub mod rsi;

pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand};
pub use ema::{ema_of_series, Macd, MacdOutput};
pub use hurst::{hurst_exponent, Hurst};
pub use rsi::Rsi;

use crate::domain::Candle;

/// Guard added to denominators that may be zero.
pub const EPSILON: f64 = 1e-12;

/// Trait for indicators.
///
/// # Look-ahead contamination guard
/// No value at index t may depend on a candle after t. Computing on a
/// truncated series must reproduce the same prefix.
pub trait Indicator: Send + Sync {
    /// Column name (e.g. "atr_14", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading positions that are always NaN.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Close prices of a series.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Hourly synthetic candles from close prices for testing.
///
/// open = previous close (or close for the first candle),
/// high = max(open, close) + 1, low = min(open, close) - 1.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
