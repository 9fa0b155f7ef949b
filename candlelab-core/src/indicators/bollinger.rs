//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! Four outputs (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//! - Width: (upper - lower) / (close + EPSILON)
//!
//! Uses sample stddev (divide by N - 1).
//! Lookback: period - 1.

use super::rolling::{mean, rolling_apply, sample_std};
use super::{Indicator, EPSILON};
use crate::domain::Candle;

/// Which Bollinger output to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
    Width,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        let name = match band {
            BollingerBand::Upper => "bb_up",
            BollingerBand::Middle => "bb_mid",
            BollingerBand::Lower => "bb_low",
            BollingerBand::Width => "bb_width",
        };
        Self {
            period,
            multiplier,
            band,
            name: name.to_string(),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes = super::closes(candles);
        let mid = rolling_apply(&closes, self.period, mean);
        if self.band == BollingerBand::Middle {
            return mid;
        }

        let std = rolling_apply(&closes, self.period, sample_std);
        let k = self.multiplier;
        mid.iter()
            .zip(&std)
            .zip(&closes)
            .map(|((m, s), close)| match self.band {
                BollingerBand::Upper => m + k * s,
                BollingerBand::Lower => m - k * s,
                _ => ((m + k * s) - (m - k * s)) / (close + EPSILON),
            })
            .collect()
    }
}
