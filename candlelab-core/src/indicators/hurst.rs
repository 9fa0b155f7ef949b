//! Rolling Hurst exponent from the scaling of lagged differences.
//!
//! For lags 2, 4, 8, 16, 32: tau(lag) = sqrt(std(x[lag..] - x[..-lag])), with
//! population std. The exponent is twice the least-squares slope of
//! ln(tau) against ln(lag).

use super::rolling::{population_std, rolling_apply};
use super::Indicator;
use crate::domain::Candle;

pub const HURST_LAGS: [usize; 5] = [2, 4, 8, 16, 32];

/// Windows shorter than this are undefined.
pub const MIN_HURST_POINTS: usize = 64;

/// Hurst exponent of a single window.
///
/// `None` when the window is too short, contains NaN, or has a lag whose
/// differences do not vary (a constant window, for instance).
pub fn hurst_exponent(window: &[f64]) -> Option<f64> {
    if window.len() < MIN_HURST_POINTS || window.iter().any(|v| v.is_nan()) {
        return None;
    }

    let mut log_lags = Vec::with_capacity(HURST_LAGS.len());
    let mut log_tau = Vec::with_capacity(HURST_LAGS.len());
    for lag in HURST_LAGS {
        let diffs: Vec<f64> = window[lag..]
            .iter()
            .zip(window)
            .map(|(later, earlier)| later - earlier)
            .collect();
        let tau = population_std(&diffs).sqrt();
        if !(tau > 0.0) {
            return None;
        }
        log_lags.push((lag as f64).ln());
        log_tau.push(tau.ln());
    }

    let slope = ols_slope(&log_lags, &log_tau)?;
    Some(slope * 2.0)
}

fn ols_slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
    }
    if sxx == 0.0 {
        return None;
    }
    Some(sxy / sxx)
}

/// Hurst exponent of closes over a sliding window.
#[derive(Debug, Clone)]
pub struct Hurst {
    window: usize,
    name: String,
}

impl Hurst {
    pub fn new(window: usize) -> Self {
        assert!(
            window >= MIN_HURST_POINTS,
            "Hurst window must be >= {MIN_HURST_POINTS}"
        );
        Self {
            window,
            name: format!("hurst_{window}"),
        }
    }
}

impl Indicator for Hurst {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes = super::closes(candles);
        rolling_apply(&closes, self.window, |w| {
            hurst_exponent(w).unwrap_or(f64::NAN)
        })
    }
}
