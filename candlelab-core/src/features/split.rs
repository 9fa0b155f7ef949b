//! Chronological train/validation/test split.
//!
//! Boundaries are `floor(0.70 * n)` and `floor(0.85 * n)` computed in integer
//! arithmetic. Each partition is recorded by its first and last timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

pub const TRAIN_PERCENT: usize = 70;
pub const TRAIN_VAL_PERCENT: usize = 85;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("{rows} rows cannot fill train/val/test partitions")]
    TooFewRows { rows: usize },
}

/// One contiguous partition, inclusive on both timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(skip)]
    pub rows: Range<usize>,
}

impl Partition {
    fn over(timestamps: &[DateTime<Utc>], rows: Range<usize>) -> Result<Self, SplitError> {
        let too_few = || SplitError::TooFewRows {
            rows: timestamps.len(),
        };
        let start = *timestamps.get(rows.start).ok_or_else(too_few)?;
        let end = *rows
            .end
            .checked_sub(1)
            .and_then(|last| timestamps.get(last))
            .ok_or_else(too_few)?;
        if rows.is_empty() {
            return Err(too_few());
        }
        Ok(Self { start, end, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMetadata {
    pub train: Partition,
    pub val: Partition,
    pub test: Partition,
}

impl SplitMetadata {
    /// Split an ascending timestamp column. Every partition must be non-empty.
    pub fn from_timestamps(timestamps: &[DateTime<Utc>]) -> Result<Self, SplitError> {
        let n = timestamps.len();
        let i1 = n * TRAIN_PERCENT / 100;
        let i2 = n * TRAIN_VAL_PERCENT / 100;
        Ok(Self {
            train: Partition::over(timestamps, 0..i1)?,
            val: Partition::over(timestamps, i1..i2)?,
            test: Partition::over(timestamps, i2..n)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn hourly(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn hundred_rows_split_70_15_15() {
        let ts = hourly(100);
        let split = SplitMetadata::from_timestamps(&ts).unwrap();
        assert_eq!(split.train.rows, 0..70);
        assert_eq!(split.val.rows, 70..85);
        assert_eq!(split.test.rows, 85..100);
        assert_eq!(split.train.start, ts[0]);
        assert_eq!(split.train.end, ts[69]);
        assert_eq!(split.val.start, ts[70]);
        assert_eq!(split.test.end, ts[99]);
    }

    #[test]
    fn uneven_count_uses_floor() {
        let split = SplitMetadata::from_timestamps(&hourly(7)).unwrap();
        // floor(4.9) = 4, floor(5.95) = 5
        assert_eq!(split.train.len(), 4);
        assert_eq!(split.val.len(), 1);
        assert_eq!(split.test.len(), 2);
    }

    #[test]
    fn too_few_rows_is_an_error() {
        for n in [0, 1, 2, 3] {
            assert_eq!(
                SplitMetadata::from_timestamps(&hourly(n)),
                Err(SplitError::TooFewRows { rows: n })
            );
        }
        assert!(SplitMetadata::from_timestamps(&hourly(4)).is_ok());
    }

    #[test]
    fn serializes_only_boundaries() {
        let split = SplitMetadata::from_timestamps(&hourly(20)).unwrap();
        let json = serde_json::to_value(&split).unwrap();
        assert_eq!(json["train"]["start"], "2024-01-01T00:00:00Z");
        assert!(json["train"].get("rows").is_none());
    }
}
