//! Relative Strength Index (RSI).
//!
//! Simple trailing means of clipped gains and losses of close-to-close deltas.
//! RSI = 100 - 100 / (1 + avg_gain / (avg_loss + EPSILON))
//! Lookback: period (the first delta needs a previous close).
//! Edge cases: no movement → 0 (avg_gain = 0); only gains → ~100.

use super::rolling::rolling_mean;
use super::{Indicator, EPSILON};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut gains = vec![f64::NAN; n];
        let mut losses = vec![f64::NAN; n];
        for i in 1..n {
            let delta = candles[i].close - candles[i - 1].close;
            if !delta.is_nan() {
                gains[i] = delta.max(0.0);
                losses[i] = (-delta).max(0.0);
            }
        }

        let avg_gain = rolling_mean(&gains, self.period);
        let avg_loss = rolling_mean(&losses, self.period);

        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(g, l)| 100.0 - 100.0 / (1.0 + g / (l + EPSILON)))
            .collect()
    }
}
