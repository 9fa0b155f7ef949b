//! Forward-looking targets. These are the only columns allowed to read the future.

/// `ln(close[t + horizon] / close[t])`; NaN where `t + horizon` is past the end.
pub fn forward_log_return(closes: &[f64], horizon: usize) -> Vec<f64> {
    let n = closes.len();
    let mut result = vec![f64::NAN; n];
    for t in 0..n.saturating_sub(horizon) {
        result[t] = (closes[t + horizon] / closes[t]).ln();
    }
    result
}
