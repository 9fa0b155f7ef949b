//! Parquet table store.
//!
//! One file per stage output, always read and written whole.
//!
//! - Atomic writes (write to `.tmp`, rename into place)
//! - Timestamp column `timestamp_utc` as `Datetime(ms, UTC)`; readers accept any
//!   datetime unit or epoch-millisecond integers
//! - Metadata sidecar per candle table (`<name>.meta.json`: rows, range, blake3 hash)

use crate::domain::Candle;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key column of every table.
pub const TIMESTAMP_COLUMN: &str = "timestamp_utc";

/// Raw candle value columns, in on-disk order.
pub const OHLCV_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table not found: {path}")]
    NotFound { path: PathBuf },

    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}: column '{column}' {reason}")]
    BadColumn {
        path: PathBuf,
        column: String,
        reason: String,
    },

    #[error("parquet I/O error: {0}")]
    Parquet(#[from] PolarsError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization: {0}")]
    Json(#[from] serde_json::Error),
}

/// Metadata sidecar written next to each candle table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableMeta {
    pub rows: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub data_hash: String,
    pub written_at: DateTime<Utc>,
}

/// Path of the sidecar for a table: `btc_1h.parquet` → `btc_1h.meta.json`.
pub fn meta_path(table_path: &Path) -> PathBuf {
    table_path.with_extension("meta.json")
}

/// blake3 digest over the serialized rows. Equal tables hash equal.
pub fn table_digest(candles: &[Candle]) -> Result<String, StoreError> {
    let bytes = serde_json::to_vec(candles)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Load a candle table, sorted by timestamp ascending.
///
/// Duplicate timestamps are preserved: deduplication is the writer's job and
/// the validator needs to see them.
pub fn read_candles(path: &Path) -> Result<Vec<Candle>, StoreError> {
    let df = read_frame(path)?;
    let mut candles = dataframe_to_candles(&df, path)?;
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

/// Load a candle table and keep its trailing `n` rows.
pub fn read_tail(path: &Path, n: usize) -> Result<Vec<Candle>, StoreError> {
    let mut candles = read_candles(path)?;
    let skip = candles.len().saturating_sub(n);
    Ok(candles.split_off(skip))
}

/// Read a Parquet file into a DataFrame.
pub fn read_frame(path: &Path) -> Result<DataFrame, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let file = fs::File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ParquetReader::new(file).finish()?)
}

/// Replace the candle table at `path` and refresh its sidecar.
pub fn write_candles(path: &Path, candles: &[Candle]) -> Result<TableMeta, StoreError> {
    let timestamps: Vec<DateTime<Utc>> = candles.iter().map(|c| c.timestamp).collect();
    let columns = vec![
        ("open".to_string(), candles.iter().map(|c| c.open).collect()),
        ("high".to_string(), candles.iter().map(|c| c.high).collect()),
        ("low".to_string(), candles.iter().map(|c| c.low).collect()),
        ("close".to_string(), candles.iter().map(|c| c.close).collect()),
        ("volume".to_string(), candles.iter().map(|c| c.volume).collect()),
    ];
    let mut df = build_frame(&timestamps, &columns)?;
    write_frame(path, &mut df)?;

    let meta = TableMeta {
        rows: candles.len(),
        start: candles.first().map(|c| c.timestamp),
        end: candles.last().map(|c| c.timestamp),
        data_hash: table_digest(candles)?,
        written_at: Utc::now(),
    };
    write_json(&meta_path(path), &meta)?;
    Ok(meta)
}

/// Read the sidecar for a table, if one exists and parses.
pub fn read_meta(table_path: &Path) -> Option<TableMeta> {
    let content = fs::read_to_string(meta_path(table_path)).ok()?;
    serde_json::from_str(&content).ok()
}

/// Build a frame with the `timestamp_utc` key followed by `columns` in order.
pub fn build_frame(
    timestamps: &[DateTime<Utc>],
    columns: &[(String, Vec<f64>)],
) -> Result<DataFrame, StoreError> {
    let millis: Vec<i64> = timestamps.iter().map(|t| t.timestamp_millis()).collect();
    let mut cols = Vec::with_capacity(columns.len() + 1);
    cols.push(Column::new(TIMESTAMP_COLUMN.into(), millis).cast(&utc_millis())?);
    for (name, values) in columns {
        cols.push(Column::new(name.as_str().into(), values.as_slice()));
    }
    Ok(DataFrame::new(cols)?)
}

/// Write a DataFrame as Parquet, atomically.
pub fn write_frame(path: &Path, df: &mut DataFrame) -> Result<(), StoreError> {
    atomic_write(path, |file| {
        ParquetWriter::new(file).finish(df)?;
        Ok(())
    })
}

/// Write pretty JSON, atomically. Non-ASCII text is written verbatim.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, |file| {
        file.write_all(json.as_bytes()).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    })
}

/// Write through a sibling `.tmp` file and rename it over `path`.
fn atomic_write<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut fs::File) -> Result<(), StoreError>,
{
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = fs::File::create(&tmp_path)
        .map_err(io_err)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all().map_err(io_err)
        })
        .and_then(|()| fs::rename(&tmp_path, path).map_err(io_err));

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn utc_millis() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, Some("UTC".into()))
}

// ── Frame → candles ─────────────────────────────────────────────────

fn dataframe_to_candles(df: &DataFrame, path: &Path) -> Result<Vec<Candle>, StoreError> {
    let column = |name: &str| {
        df.column(name).map_err(|_| StoreError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
    };

    let timestamps = timestamps_ms(column(TIMESTAMP_COLUMN)?, path)?;

    let mut values: Vec<Vec<f64>> = Vec::with_capacity(OHLCV_COLUMNS.len());
    for name in OHLCV_COLUMNS {
        let as_float = column(name)?.cast(&DataType::Float64)?;
        let ca = as_float.f64()?;
        values.push((0..ca.len()).map(|i| ca.get(i).unwrap_or(f64::NAN)).collect());
    }

    let mut candles = Vec::with_capacity(timestamps.len());
    for (i, ms) in timestamps.into_iter().enumerate() {
        let timestamp = DateTime::from_timestamp_millis(ms).ok_or_else(|| StoreError::BadColumn {
            path: path.to_path_buf(),
            column: TIMESTAMP_COLUMN.to_string(),
            reason: format!("row {i}: {ms} ms is out of range"),
        })?;
        candles.push(Candle {
            timestamp,
            open: values[0][i],
            high: values[1][i],
            low: values[2][i],
            close: values[3][i],
            volume: values[4][i],
        });
    }

    Ok(candles)
}

/// Coerce the timestamp column to UTC epoch milliseconds.
fn timestamps_ms(column: &Column, path: &Path) -> Result<Vec<i64>, StoreError> {
    let divisor = match column.dtype() {
        DataType::Datetime(TimeUnit::Nanoseconds, _) => 1_000_000,
        DataType::Datetime(TimeUnit::Microseconds, _) => 1_000,
        DataType::Datetime(TimeUnit::Milliseconds, _) | DataType::Int64 => 1,
        other => {
            return Err(StoreError::BadColumn {
                path: path.to_path_buf(),
                column: TIMESTAMP_COLUMN.to_string(),
                reason: format!("has unsupported type {other:?}"),
            })
        }
    };

    let physical = column.cast(&DataType::Int64)?;
    let ca = physical.i64()?;
    (0..ca.len())
        .map(|i| {
            ca.get(i)
                .map(|raw| raw.div_euclid(divisor))
                .ok_or_else(|| StoreError::BadColumn {
                    path: path.to_path_buf(),
                    column: TIMESTAMP_COLUMN.to_string(),
                    reason: format!("row {i} is null"),
                })
        })
        .collect()
}
