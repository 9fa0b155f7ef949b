//! Feature and label construction over a gap-regularized candle table.
//!
//! [`FeatureFrame::compute`] builds every column for every row (undefined
//! positions hold NaN). [`build_features`] then drops incomplete rows, derives
//! the manifest and splits the survivors chronologically.

pub mod calendar;
pub mod labels;
pub mod split;

pub use split::{Partition, SplitError, SplitMetadata};

use crate::data::store::{self, StoreError, OHLCV_COLUMNS, TIMESTAMP_COLUMN};
use crate::domain::Candle;
use crate::indicators::rolling::{lag, log_returns, rolling_mean, rolling_std};
use crate::indicators::{
    Atr, Bollinger, BollingerBand, Hurst, Indicator, Macd, MacdOutput, Rsi, EPSILON,
};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use thiserror::Error;
use tracing::info;

/// Return lags `ret_lag_1 ..= ret_lag_N`.
pub const RETURN_LAGS: usize = 24;

/// Trailing windows for return mean/std.
pub const RETURN_WINDOWS: [usize; 5] = [6, 12, 24, 72, 168];

pub const HURST_WINDOWS: [usize; 2] = [128, 256];

/// Target columns, excluded from the manifest.
pub const LABEL_COLUMNS: [&str; 2] = ["y_1h", "y_1d"];

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("not enough complete feature rows: {0}")]
    Split(#[from] SplitError),
}

/// Column-oriented feature table keyed by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub timestamps: Vec<DateTime<Utc>>,
    /// Named columns in output order, each as long as `timestamps`.
    pub columns: Vec<(String, Vec<f64>)>,
}

fn indicators() -> Vec<Box<dyn Indicator>> {
    vec![
        Box::new(Atr::new(14)),
        Box::new(Rsi::new(14)),
        Box::new(Macd::standard(MacdOutput::Line)),
        Box::new(Macd::standard(MacdOutput::Signal)),
        Box::new(Macd::standard(MacdOutput::Histogram)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Middle)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Upper)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Lower)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Width)),
    ]
}

/// Leading rows that can never be complete: the longest feature lookback.
///
/// Labels are excluded; they cut rows from the end instead.
pub fn warmup_rows() -> usize {
    // ret_1 is undefined at row 0: ret_lag_k starts at row k + 1, a w-row
    // window of returns at row w
    let returns = RETURN_WINDOWS
        .iter()
        .copied()
        .fold(RETURN_LAGS + 1, usize::max);
    indicators()
        .iter()
        .map(|i| i.lookback())
        .chain(HURST_WINDOWS.iter().map(|&w| Hurst::new(w).lookback()))
        .fold(returns, usize::max)
}

impl FeatureFrame {
    /// Every feature and label column over the full series, before any row is dropped.
    pub fn compute(candles: &[Candle]) -> Self {
        let timestamps: Vec<DateTime<Utc>> = candles.iter().map(|c| c.timestamp).collect();
        let closes = crate::indicators::closes(candles);
        let mut columns: Vec<(String, Vec<f64>)> = Vec::new();
        let mut push = |name: String, values: Vec<f64>| columns.push((name, values));

        push("open".into(), candles.iter().map(|c| c.open).collect());
        push("high".into(), candles.iter().map(|c| c.high).collect());
        push("low".into(), candles.iter().map(|c| c.low).collect());
        push("close".into(), closes.clone());
        push("volume".into(), candles.iter().map(|c| c.volume).collect());

        let ret = log_returns(&closes);
        push("ret_1".into(), ret.clone());
        for k in 1..=RETURN_LAGS {
            push(format!("ret_lag_{k}"), lag(&ret, k));
        }
        for w in RETURN_WINDOWS {
            push(format!("ret_mean_{w}"), rolling_mean(&ret, w));
            push(format!("ret_std_{w}"), rolling_std(&ret, w));
        }

        push(
            "hl_range".into(),
            candles
                .iter()
                .map(|c| (c.high - c.low) / (c.close + EPSILON))
                .collect(),
        );
        for indicator in indicators() {
            push(indicator.name().to_string(), indicator.compute(candles));
        }

        let hours: Vec<(f64, f64)> = timestamps.iter().map(|&t| calendar::hour_cycle(t)).collect();
        let days: Vec<(f64, f64)> = timestamps
            .iter()
            .map(|&t| calendar::weekday_cycle(t))
            .collect();
        push("hour_sin".into(), hours.iter().map(|h| h.0).collect());
        push("hour_cos".into(), hours.iter().map(|h| h.1).collect());
        push("dow_sin".into(), days.iter().map(|d| d.0).collect());
        push("dow_cos".into(), days.iter().map(|d| d.1).collect());

        for w in HURST_WINDOWS {
            let hurst = Hurst::new(w);
            push(hurst.name().to_string(), hurst.compute(candles));
        }

        push(LABEL_COLUMNS[0].into(), labels::forward_log_return(&closes, 1));
        push(LABEL_COLUMNS[1].into(), labels::forward_log_return(&closes, 24));

        Self {
            timestamps,
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Keep only rows where every column is defined.
    pub fn drop_incomplete(self) -> Self {
        let keep: Vec<bool> = (0..self.len())
            .map(|i| self.columns.iter().all(|(_, values)| !values[i].is_nan()))
            .collect();
        let filter = |values: Vec<f64>| -> Vec<f64> {
            values
                .into_iter()
                .zip(&keep)
                .filter_map(|(v, &k)| k.then_some(v))
                .collect()
        };

        let timestamps = self
            .timestamps
            .into_iter()
            .zip(&keep)
            .filter_map(|(t, &k)| k.then_some(t))
            .collect();
        let columns = self
            .columns
            .into_iter()
            .map(|(name, values)| (name, filter(values)))
            .collect();
        Self {
            timestamps,
            columns,
        }
    }

    /// Model input columns: the timestamp key and every feature, without raw
    /// OHLCV or labels.
    pub fn manifest(&self) -> Vec<String> {
        std::iter::once(TIMESTAMP_COLUMN)
            .chain(
                self.column_names()
                    .filter(|n| !OHLCV_COLUMNS.contains(n) && !LABEL_COLUMNS.contains(n)),
            )
            .map(str::to_string)
            .collect()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, StoreError> {
        store::build_frame(&self.timestamps, &self.columns)
    }
}

/// Finalized output of the feature stage.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Complete rows only.
    pub table: FeatureFrame,
    pub manifest: Vec<String>,
    pub splits: SplitMetadata,
}

/// Build the feature table, manifest and split metadata from a regularized series.
pub fn build_features(candles: &[Candle]) -> Result<FeatureSet, FeatureError> {
    info!(rows = candles.len(), warmup = warmup_rows(), "computing features");
    let table = FeatureFrame::compute(candles).drop_incomplete();
    info!(rows = table.len(), "rows after dropping incomplete");

    let splits = SplitMetadata::from_timestamps(&table.timestamps)?;
    let manifest = table.manifest();
    Ok(FeatureSet {
        table,
        manifest,
        splits,
    })
}
