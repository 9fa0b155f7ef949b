//! Candle: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle for one time bucket of a single instrument.
///
/// `timestamp` is the bucket's open time and is the unique key within a table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "timestamp_utc")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// A zero-range, zero-volume candle pinned at `price`.
    ///
    /// Used for grid points that had no trades.
    pub fn flat(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }

    /// `high` sits below the candle body.
    pub fn high_below_body(&self) -> bool {
        self.high < self.open.max(self.close)
    }

    /// `low` sits above the candle body.
    pub fn low_above_body(&self) -> bool {
        self.low > self.open.min(self.close)
    }

    pub fn has_non_positive_price(&self) -> bool {
        self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0
    }

    pub fn has_negative_volume(&self) -> bool {
        self.volume < 0.0
    }
}

/// Sort ascending by timestamp and collapse duplicate timestamps.
///
/// The sort is stable, so the copy that appeared first in `candles` survives.
pub fn canonicalize(candles: &mut Vec<Candle>) {
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
}
