//! Binance-compatible klines source.
//!
//! Fetches OHLCV pages from the public `/api/v3/klines` endpoint. Each request
//! is a single attempt; nothing here retries.

use super::provider::{CandleSource, SourceError};
use crate::domain::{Candle, Interval};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// Intervals the klines endpoint accepts.
const SUPPORTED_INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Binance error code for an unknown symbol.
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Klines source backed by a blocking HTTP client.
pub struct BinanceSource {
    client: reqwest::blocking::Client,
    base_url: String,
    min_interval: Duration,
}

impl BinanceSource {
    pub fn new(base_url: impl Into<String>, min_interval: Duration) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("candlelab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                SourceError::NetworkUnreachable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            min_interval,
        })
    }

    /// `BTC/USDT` → `BTCUSDT`.
    fn market_id(instrument: &str) -> String {
        instrument
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase()
    }

    /// Build the klines URL for one page.
    fn klines_url(
        &self,
        instrument: &str,
        interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
    ) -> String {
        format!(
            "{}/api/v3/klines?symbol={}&interval={interval}&startTime={}&limit={limit}",
            self.base_url,
            Self::market_id(instrument),
            since.timestamp_millis(),
        )
    }

    /// Parse a klines payload: an array of `[open_time, "o", "h", "l", "c", "v", ...]` rows.
    fn parse_klines(payload: &Value) -> Result<Vec<Candle>, SourceError> {
        let rows = payload
            .as_array()
            .ok_or_else(|| SourceError::ResponseFormat("klines payload is not an array".into()))?;

        let mut candles = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let fields = row
                .as_array()
                .filter(|f| f.len() >= 6)
                .ok_or_else(|| SourceError::ResponseFormat(format!("kline row {i} is malformed")))?;

            let open_time = fields[0]
                .as_i64()
                .ok_or_else(|| {
                    SourceError::ResponseFormat(format!("kline row {i}: bad open time"))
                })?;
            let timestamp = DateTime::from_timestamp_millis(open_time).ok_or_else(|| {
                SourceError::ResponseFormat(format!(
                    "kline row {i}: timestamp {open_time} out of range"
                ))
            })?;

            candles.push(Candle {
                timestamp,
                open: number(&fields[1], i, "open")?,
                high: number(&fields[2], i, "high")?,
                low: number(&fields[3], i, "low")?,
                close: number(&fields[4], i, "close")?,
                volume: number(&fields[5], i, "volume")?,
            });
        }

        Ok(candles)
    }
}

/// Map an HTTP status and raw body to a JSON payload or a source error.
///
/// Error bodies need not be JSON (proxies answer with HTML); JSON is only
/// inspected for the exchange's invalid-symbol code.
fn classify(status: u16, body: &str, instrument: &str) -> Result<Value, SourceError> {
    if status == 429 || status == 418 {
        return Err(SourceError::RateLimited { status });
    }

    if !(200..300).contains(&status) {
        let code = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("code").and_then(Value::as_i64));
        if code == Some(INVALID_SYMBOL_CODE) {
            return Err(SourceError::UnknownInstrument {
                instrument: instrument.to_string(),
            });
        }
        return Err(SourceError::Http {
            status,
            body: body.to_string(),
        });
    }

    serde_json::from_str(body)
        .map_err(|e| SourceError::ResponseFormat(format!("failed to parse klines response: {e}")))
}

/// Klines encode decimals as strings; accept plain numbers too.
fn number(value: &Value, row: usize, field: &str) -> Result<f64, SourceError> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        SourceError::ResponseFormat(format!("kline row {row}: bad {field} value {value}"))
    })
}

impl CandleSource for BinanceSource {
    fn name(&self) -> &str {
        "binance"
    }

    fn fetch_page(
        &self,
        instrument: &str,
        interval: Interval,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        if !SUPPORTED_INTERVALS.contains(&interval.to_string().as_str()) {
            return Err(SourceError::UnsupportedInterval { interval });
        }

        let url = self.klines_url(instrument, interval, since, limit);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SourceError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| SourceError::NetworkUnreachable(format!("failed to read response: {e}")))?;

        let payload = classify(status, &body, instrument)?;
        Self::parse_klines(&payload)
    }

    fn min_request_interval(&self) -> Duration {
        self.min_interval
    }
}
