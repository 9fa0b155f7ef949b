//! Trailing-window reductions over plain `f64` series.
//!
//! A window produces a value only when it is full and contains no NaN,
//! matching `min_periods == window` semantics.

/// Apply `f` to every full, NaN-free trailing window of `values`.
///
/// The NaN count is maintained incrementally as the window slides, so a
/// window is only handed to `f` when it is clean.
pub fn rolling_apply<F>(values: &[f64], window: usize, mut f: F) -> Vec<f64>
where
    F: FnMut(&[f64]) -> f64,
{
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }

    let mut nan_in_window = values[..window - 1].iter().filter(|v| v.is_nan()).count();
    for i in (window - 1)..n {
        if values[i].is_nan() {
            nan_in_window += 1;
        }
        if i >= window && values[i - window].is_nan() {
            nan_in_window -= 1;
        }
        if nan_in_window == 0 {
            result[i] = f(&values[i + 1 - window..=i]);
        }
    }
    result
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). NaN for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Population standard deviation (n denominator).
pub fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / values.len() as f64).sqrt()
}

pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, mean)
}

pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, sample_std)
}

/// `ln(x[t]) - ln(x[t-1])`; the first position is NaN.
pub fn log_returns(values: &[f64]) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        result[i] = values[i].ln() - values[i - 1].ln();
    }
    result
}

/// `values` delayed by `k` positions: `out[t] = values[t - k]`.
pub fn lag(values: &[f64], k: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    for i in k..n {
        result[i] = values[i - k];
    }
    result
}
