//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR is the simple trailing mean of TR over `period` candles.
//! Lookback: period - 1 (the first TR has no previous close and uses high-low).

use super::rolling::rolling_mean;
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// Compute the True Range series.
/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(candles.len());
    for (i, c) in candles.iter().enumerate() {
        let range = c.high - c.low;
        if i == 0 {
            tr.push(range);
            continue;
        }
        let pc = candles[i - 1].close;
        if range.is_nan() || pc.is_nan() {
            tr.push(f64::NAN);
        } else {
            tr.push(range.max((c.high - pc).abs()).max((c.low - pc).abs()));
        }
    }
    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        rolling_mean(&true_range(candles), self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn true_range_uses_gap_from_previous_close() {
        let mut candles = make_candles(&[100.0, 100.0]);
        candles[1].high = 101.0;
        candles[1].low = 99.0;
        candles[0].close = 110.0;

        let tr = true_range(&candles);
        assert_approx(tr[0], candles[0].high - candles[0].low, DEFAULT_EPSILON);
        // |low - prev_close| = 11 dominates high - low = 2
        assert_approx(tr[1], 11.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_is_simple_mean_of_true_range() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0]);
        let tr = true_range(&candles);
        let atr = Atr::new(3).compute(&candles);

        assert!(atr[0].is_nan());
        assert!(atr[1].is_nan());
        assert_approx(atr[2], (tr[0] + tr[1] + tr[2]) / 3.0, DEFAULT_EPSILON);
        assert_approx(atr[3], (tr[1] + tr[2] + tr[3]) / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(14).lookback(), 13);
        assert_eq!(Atr::new(14).name(), "atr_14");
    }
}
