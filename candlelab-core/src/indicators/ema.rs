//! Exponential Moving Average (EMA) and MACD.
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (span + 1)
//! Seed: EMA at the first defined input equals that input (no bias adjustment),
//! so the series has no warm-up gap.

use super::Indicator;
use crate::domain::Candle;

/// EMA of an arbitrary series.
///
/// Leading NaNs stay NaN; the first defined value seeds the recursion. A NaN
/// after the seed taints every later value.
pub fn ema_of_series(values: &[f64], span: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if span == 0 {
        return result;
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let Some(seed_at) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };

    let mut prev = values[seed_at];
    result[seed_at] = prev;
    for i in (seed_at + 1)..n {
        if values[i].is_nan() {
            break;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

/// Which MACD output to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdOutput {
    /// EMA(fast) - EMA(slow) of close.
    Line,
    /// EMA(signal) of the line.
    Signal,
    /// Line - signal.
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    output: MacdOutput,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, output: MacdOutput) -> Self {
        assert!(
            fast >= 1 && slow > fast && signal >= 1,
            "MACD spans must satisfy 1 <= fast < slow and signal >= 1"
        );
        let name = match output {
            MacdOutput::Line => "macd_line",
            MacdOutput::Signal => "macd_signal",
            MacdOutput::Histogram => "macd_hist",
        };
        Self {
            fast,
            slow,
            signal,
            output,
            name: name.to_string(),
        }
    }

    /// The conventional 12/26/9 configuration.
    pub fn standard(output: MacdOutput) -> Self {
        Self::new(12, 26, 9, output)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes = super::closes(candles);
        let fast = ema_of_series(&closes, self.fast);
        let slow = ema_of_series(&closes, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        if self.output == MacdOutput::Line {
            return line;
        }

        let signal = ema_of_series(&line, self.signal);
        match self.output {
            MacdOutput::Signal => signal,
            _ => line.iter().zip(&signal).map(|(l, s)| l - s).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn ema_span_1_equals_input() {
        let result = ema_of_series(&[100.0, 200.0, 300.0], 1);
        assert_eq!(result, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5, seeded with the first value
        // EMA = 10, 10.5, 11.25, 12.125
        let result = ema_of_series(&[10.0, 11.0, 12.0, 13.0], 3);
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 10.5, DEFAULT_EPSILON);
        assert_approx(result[2], 11.25, DEFAULT_EPSILON);
        assert_approx(result[3], 12.125, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_skips_leading_nan() {
        let result = ema_of_series(&[f64::NAN, 4.0, 6.0], 3);
        assert!(result[0].is_nan());
        assert_approx(result[1], 4.0, DEFAULT_EPSILON);
        assert_approx(result[2], 5.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_nan_after_seed_propagates() {
        let result = ema_of_series(&[1.0, 2.0, f64::NAN, 4.0], 3);
        assert!(!result[1].is_nan());
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let candles = make_candles(&[50.0; 40]);
        for output in [MacdOutput::Line, MacdOutput::Signal, MacdOutput::Histogram] {
            let result = Macd::standard(output).compute(&candles);
            assert!(result.iter().all(|v| v.abs() < DEFAULT_EPSILON));
        }
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let candles = make_candles(&closes);
        let line = Macd::standard(MacdOutput::Line).compute(&candles);
        let signal = Macd::standard(MacdOutput::Signal).compute(&candles);
        let hist = Macd::standard(MacdOutput::Histogram).compute(&candles);

        assert_approx(line[0], 0.0, DEFAULT_EPSILON);
        for i in 0..60 {
            assert_approx(hist[i], line[i] - signal[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    fn macd_rising_series_has_positive_line() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let line = Macd::standard(MacdOutput::Line).compute(&make_candles(&closes));
        assert!(line[49] > 0.0);
    }
}
