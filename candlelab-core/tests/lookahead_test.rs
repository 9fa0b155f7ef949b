//! Look-ahead contamination tests for every feature column.
//!
//! Invariant: no feature value at row t may depend on a candle after t. Only
//! the labels `y_1h` and `y_1d` look forward, and only by their horizon.
//!
//! Method: compute on a truncated series (rows 0..300) and on the full series
//! (rows 0..420). Rows 0..300 must be identical between both runs.

use candlelab_core::domain::Candle;
use candlelab_core::features::{build_features, FeatureFrame, LABEL_COLUMNS};
use candlelab_core::indicators::*;
use chrono::{Duration, TimeZone, Utc};

/// N hourly candles following a deterministic pseudo-random walk.
fn make_test_candles(n: usize) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            let seed = (i as u64)
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let change = ((seed >> 33) % 200) as f64 / 100.0 - 1.0;
            let open = price;
            price = (price + change).max(10.0);
            let close = price;
            Candle {
                timestamp: base + Duration::hours(i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 10.0 + (i % 7) as f64,
            }
        })
        .collect()
}

fn assert_prefix_equal(name: &str, truncated: &[f64], full: &[f64]) {
    for (i, (t, f)) in truncated.iter().zip(full).enumerate() {
        if t.is_nan() && f.is_nan() {
            continue;
        }
        assert!(
            !t.is_nan() && !f.is_nan(),
            "{name}: NaN mismatch at row {i} (truncated={t}, full={f})"
        );
        assert!(
            (t - f).abs() < 1e-12,
            "{name}: look-ahead at row {i} (truncated={t}, full={f})"
        );
    }
}

fn assert_no_lookahead(indicator: &dyn Indicator, candles: &[Candle], truncated_len: usize) {
    let full = indicator.compute(candles);
    let truncated = indicator.compute(&candles[..truncated_len]);
    assert_eq!(truncated.len(), truncated_len, "{}: length", indicator.name());
    assert_eq!(full.len(), candles.len(), "{}: length", indicator.name());
    assert_prefix_equal(indicator.name(), &truncated, &full[..truncated_len]);
}

#[test]
fn indicators_do_not_look_ahead() {
    let candles = make_test_candles(420);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Atr::new(14)),
        Box::new(Rsi::new(14)),
        Box::new(Macd::standard(MacdOutput::Line)),
        Box::new(Macd::standard(MacdOutput::Signal)),
        Box::new(Macd::standard(MacdOutput::Histogram)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Middle)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Upper)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Lower)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Width)),
        Box::new(Hurst::new(128)),
        Box::new(Hurst::new(256)),
    ];
    for indicator in &indicators {
        assert_no_lookahead(indicator.as_ref(), &candles, 300);
    }
}

#[test]
fn feature_columns_do_not_look_ahead() {
    let candles = make_test_candles(420);
    let full = FeatureFrame::compute(&candles);
    let truncated = FeatureFrame::compute(&candles[..300]);

    for (name, values) in &truncated.columns {
        if LABEL_COLUMNS.contains(&name.as_str()) {
            continue;
        }
        let full_values = full.column(name).unwrap();
        assert_prefix_equal(name, values, &full_values[..300]);
    }
}

#[test]
fn labels_look_forward_exactly_their_horizon() {
    let candles = make_test_candles(420);
    let frame = FeatureFrame::compute(&candles);
    let y_1h = frame.column("y_1h").unwrap();
    let y_1d = frame.column("y_1d").unwrap();

    for t in 0..candles.len() {
        if t + 1 < candles.len() {
            let expected = (candles[t + 1].close / candles[t].close).ln();
            assert!((y_1h[t] - expected).abs() < 1e-12, "y_1h at {t}");
        } else {
            assert!(y_1h[t].is_nan());
        }
        if t + 24 < candles.len() {
            let expected = (candles[t + 24].close / candles[t].close).ln();
            assert!((y_1d[t] - expected).abs() < 1e-12, "y_1d at {t}");
        } else {
            assert!(y_1d[t].is_nan());
        }
    }
}

#[test]
fn persisted_y_1h_matches_next_pre_drop_close() {
    let candles = make_test_candles(420);
    let set = build_features(&candles).unwrap();
    let y_1h = set.table.column("y_1h").unwrap();

    for (row, ts) in set.table.timestamps.iter().enumerate() {
        let t = candles.iter().position(|c| c.timestamp == *ts).unwrap();
        let expected = (candles[t + 1].close / candles[t].close).ln();
        assert!((y_1h[row] - expected).abs() < 1e-12, "row {row}");
    }
}
