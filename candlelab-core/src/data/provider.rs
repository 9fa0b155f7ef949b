//! Market-data source trait and structured error types.
//!
//! The CandleSource trait abstracts over exchanges so the downloader can be
//! driven by a real REST client or by an in-memory source in tests.

use crate::domain::{Candle, Interval};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Structured error types for source operations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by source (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("unknown instrument: {instrument}")]
    UnknownInstrument { instrument: String },

    #[error("unsupported interval {interval} for this source")]
    UnsupportedInterval { interval: Interval },
}

/// Contract for a paged candle source.
///
/// Implementations return candles with `timestamp >= since`, ascending, at most
/// `limit` of them. An empty page means there is nothing newer.
pub trait CandleSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch one page of candles starting at `since`.
    fn fetch_page(
        &self,
        instrument: &str,
        interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError>;

    /// Minimum pause the source requires between consecutive requests.
    fn min_request_interval(&self) -> Duration;
}
