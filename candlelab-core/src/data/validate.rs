//! Candle table audit.
//!
//! Counts data-quality findings without repairing anything. Findings are never
//! errors; only an empty table is.

use crate::domain::{Candle, Interval};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("table has no rows, nothing to validate")]
    EmptyTable,
}

/// Aggregated counters for one table.
///
/// Serialized with the human-readable keys downstream readers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(rename = "строк")]
    pub rows: usize,

    #[serde(rename = "начало")]
    pub start: DateTime<Utc>,

    #[serde(rename = "конец")]
    pub end: DateTime<Utc>,

    #[serde(rename = "дубликаты_timestamp")]
    pub duplicate_timestamps: usize,

    /// Rows with `high < max(open, close)`.
    #[serde(rename = "ошибки_high")]
    pub invalid_high: usize,

    /// Rows with `low > min(open, close)`.
    #[serde(rename = "ошибки_low")]
    pub invalid_low: usize,

    /// Rows where any of open/high/low/close is `<= 0`.
    #[serde(rename = "отрицательные_цены")]
    pub non_positive_prices: usize,

    #[serde(rename = "отрицательный_объём")]
    pub negative_volume: usize,

    /// Grid ticks in `[start, end]` with no row. `None` for calendar intervals.
    #[serde(rename = "пропуски_1h")]
    pub missing_ticks: Option<usize>,
}

impl ValidationReport {
    /// No finding of any kind.
    pub fn is_clean(&self) -> bool {
        self.duplicate_timestamps == 0
            && self.invalid_high == 0
            && self.invalid_low == 0
            && self.non_positive_prices == 0
            && self.negative_volume == 0
            && self.missing_ticks.unwrap_or(0) == 0
    }
}

/// Audit `table` against `expected_interval`.
pub fn validate(
    table: &[Candle],
    expected_interval: Interval,
) -> Result<ValidationReport, ValidationError> {
    let mut timestamps: Vec<DateTime<Utc>> = table.iter().map(|c| c.timestamp).collect();
    timestamps.sort_unstable();

    let (Some(&start), Some(&end)) = (timestamps.first(), timestamps.last()) else {
        return Err(ValidationError::EmptyTable);
    };

    let duplicate_timestamps = timestamps.windows(2).filter(|w| w[0] == w[1]).count();

    let count = |pred: fn(&Candle) -> bool| table.iter().filter(|c| pred(c)).count();

    let missing_ticks = expected_interval
        .duration()
        .map(|step| missing_grid_ticks(&timestamps, start, end, step));

    let report = ValidationReport {
        rows: table.len(),
        start,
        end,
        duplicate_timestamps,
        invalid_high: count(Candle::high_below_body),
        invalid_low: count(Candle::low_above_body),
        non_positive_prices: count(Candle::has_non_positive_price),
        negative_volume: count(Candle::has_negative_volume),
        missing_ticks,
    };

    info!(rows = report.rows, clean = report.is_clean(), "validated table");
    Ok(report)
}

fn missing_grid_ticks(
    timestamps: &[DateTime<Utc>],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: chrono::Duration,
) -> usize {
    let present: HashSet<DateTime<Utc>> = timestamps.iter().copied().collect();
    let mut missing = 0;
    let mut tick = start;
    while tick <= end {
        if !present.contains(&tick) {
            missing += 1;
        }
        tick += step;
    }
    missing
}
