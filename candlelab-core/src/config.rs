//! Serializable pipeline configuration.
//!
//! Every stage entry point takes a `&PipelineConfig`; nothing reads process-wide
//! settings. Configs load from TOML and every field has a default, so a partial
//! file (or no file at all) is valid.

use crate::domain::Interval;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a full pipeline run over one instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Market-data source identifier (only `binance` ships).
    pub exchange: String,

    /// Instrument in `BASE/QUOTE` form.
    pub symbol: String,

    pub interval: Interval,

    /// REST endpoint root of the market-data source.
    pub base_url: String,

    /// Raw table written by the downloader.
    pub raw_path: PathBuf,

    /// Gap-regularized table.
    pub fixed_path: PathBuf,

    /// Feature table.
    pub features_path: PathBuf,

    /// Directory for the manifest, split metadata and validation report.
    pub processed_dir: PathBuf,

    pub download: DownloadConfig,
}

/// Pagination and pacing limits for the incremental downloader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadConfig {
    /// Source-imposed ceiling on rows per page.
    pub page_limit: usize,

    /// Safety bound on pages fetched in one run.
    pub max_pages: usize,

    /// Minimum pause between page requests.
    pub min_request_interval_ms: u64,

    /// Earliest supported history: where a first-ever download starts without a hint.
    pub history_floor: DateTime<Utc>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            page_limit: 1000,
            max_pages: 10_000,
            min_request_interval_ms: 1000,
            history_floor: Utc
                .with_ymd_and_hms(2017, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }
}

impl DownloadConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            interval: Interval::HOUR,
            base_url: "https://api.binance.com".to_string(),
            raw_path: PathBuf::from("data/raw/btcusdt_1h.parquet"),
            fixed_path: PathBuf::from("data/raw/btcusdt_1h_fixed.parquet"),
            features_path: PathBuf::from("data/processed/features_1h.parquet"),
            processed_dir: PathBuf::from("data/processed"),
            download: DownloadConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject values that would make a stage loop forever or do nothing.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol is empty".into()));
        }
        if self.download.page_limit == 0 {
            return Err(ConfigError::Invalid("download.page_limit must be > 0".into()));
        }
        if self.download.max_pages == 0 {
            return Err(ConfigError::Invalid("download.max_pages must be > 0".into()));
        }
        Ok(())
    }

    /// Feature manifest: `{processed_dir}/feature_list.json`
    pub fn manifest_path(&self) -> PathBuf {
        self.processed_dir.join("feature_list.json")
    }

    /// Split metadata: `{processed_dir}/splits.json`
    pub fn splits_path(&self) -> PathBuf {
        self.processed_dir.join("splits.json")
    }

    /// Validation report: `{processed_dir}/validation_report.json`
    pub fn report_path(&self) -> PathBuf {
        self.processed_dir.join("validation_report.json")
    }
}
