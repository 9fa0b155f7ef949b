//! Stage entry points: download, fix-gaps, features, validate.
//!
//! Each stage reads its input table from the path in [`PipelineConfig`],
//! rewrites its output whole and returns a summary. Stages never share state
//! except through the files.

use crate::config::{ConfigError, PipelineConfig};
use crate::data::store::{self, StoreError};
use crate::data::{
    fetch_and_merge, regularize, validate, BinanceSource, CandleSource, DownloadOptions,
    DownloadSummary, RegularizeError, SourceError, ValidationError, ValidationReport,
};
use crate::domain::Candle;
use crate::features::{build_features, FeatureError, FeatureSet};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage}: input table {} not found, run `{run_first}` first", path.display())]
    MissingInput {
        stage: &'static str,
        path: PathBuf,
        run_first: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Regularize(#[from] RegularizeError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn missing_input(e: StoreError, stage: &'static str, run_first: &'static str) -> PipelineError {
    match e {
        StoreError::NotFound { path } => PipelineError::MissingInput {
            stage,
            path,
            run_first,
        },
        other => other.into(),
    }
}

/// Load a stage input, turning an absent file into an actionable error.
fn read_input(
    stage: &'static str,
    path: &Path,
    run_first: &'static str,
) -> Result<Vec<Candle>, PipelineError> {
    store::read_candles(path).map_err(|e| missing_input(e, stage, run_first))
}

/// The market-data source named by `config.exchange`.
pub fn source_for(config: &PipelineConfig) -> Result<Box<dyn CandleSource>, PipelineError> {
    match config.exchange.as_str() {
        "binance" => Ok(Box::new(BinanceSource::new(
            config.base_url.clone(),
            config.download.min_request_interval(),
        )?)),
        other => Err(ConfigError::Invalid(format!("unsupported exchange '{other}'")).into()),
    }
}

/// Incrementally extend the raw table. The merged table is always written,
/// even when nothing new arrived or a page request failed.
pub fn run_download(
    config: &PipelineConfig,
    source: &dyn CandleSource,
    since: Option<DateTime<Utc>>,
) -> Result<DownloadSummary, PipelineError> {
    let existing = match store::read_candles(&config.raw_path) {
        Ok(candles) => Some(candles),
        Err(StoreError::NotFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };

    let options = DownloadOptions::from(&config.download);
    let summary = fetch_and_merge(
        source,
        &config.symbol,
        config.interval,
        existing,
        since,
        &options,
    );

    let meta = store::write_candles(&config.raw_path, &summary.table)?;
    info!(
        path = %config.raw_path.display(),
        rows = meta.rows,
        hash = %meta.data_hash,
        "raw table saved"
    );
    Ok(summary)
}

/// Result of the gap-fixing stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FixGapsSummary {
    pub rows: usize,
    /// Grid ticks that had to be synthesized.
    pub missing: usize,
}

/// Regularize the raw table onto its interval grid and write the fixed table.
pub fn run_fix_gaps(config: &PipelineConfig) -> Result<FixGapsSummary, PipelineError> {
    let raw = read_input("fix-gaps", &config.raw_path, "download")?;
    info!(rows = raw.len(), path = %config.raw_path.display(), "loaded raw table");

    let (fixed, missing) = regularize(&raw, config.interval)?;
    store::write_candles(&config.fixed_path, &fixed)?;
    info!(rows = fixed.len(), missing, path = %config.fixed_path.display(), "fixed table saved");

    Ok(FixGapsSummary {
        rows: fixed.len(),
        missing,
    })
}

/// Build features from the fixed table; write the feature table, manifest and splits.
///
/// Nothing is written when too few complete rows remain.
pub fn run_features(config: &PipelineConfig) -> Result<FeatureSet, PipelineError> {
    let fixed = read_input("features", &config.fixed_path, "fix-gaps")?;
    info!(rows = fixed.len(), path = %config.fixed_path.display(), "loaded fixed table");

    let set = build_features(&fixed)?;

    let mut df = set.table.to_dataframe()?;
    store::write_frame(&config.features_path, &mut df)?;
    store::write_json(&config.manifest_path(), &set.manifest)?;
    store::write_json(&config.splits_path(), &set.splits)?;

    info!(
        rows = set.table.len(),
        features = set.manifest.len(),
        path = %config.features_path.display(),
        "feature table saved"
    );
    Ok(set)
}

/// Audit a candle table (the raw table unless `input` is given) and write the report.
pub fn run_validate(
    config: &PipelineConfig,
    input: Option<&Path>,
) -> Result<ValidationReport, PipelineError> {
    let path = input.unwrap_or(config.raw_path.as_path());
    let table = read_input("validate", path, "download")?;

    let report = validate(&table, config.interval)?;
    if !report.is_clean() {
        warn!(path = %path.display(), "table has data-quality findings");
    }
    store::write_json(&config.report_path(), &report)?;
    info!(path = %config.report_path().display(), "validation report saved");
    Ok(report)
}

/// The trailing `n` candles of the fixed table, for downstream consumers.
pub fn tail(config: &PipelineConfig, n: usize) -> Result<Vec<Candle>, PipelineError> {
    store::read_tail(&config.fixed_path, n).map_err(|e| missing_input(e, "tail", "fix-gaps"))
}

/// Outcome of all four stages.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub download: DownloadSummary,
    pub fix_gaps: FixGapsSummary,
    pub feature_rows: usize,
    pub report: ValidationReport,
}

/// Download, fix gaps, build features and validate the raw table, in order.
pub fn run_all(
    config: &PipelineConfig,
    source: &dyn CandleSource,
    since: Option<DateTime<Utc>>,
) -> Result<RunSummary, PipelineError> {
    let download = run_download(config, source, since)?;
    let fix_gaps = run_fix_gaps(config)?;
    let features = run_features(config)?;
    let report = run_validate(config, None)?;
    Ok(RunSummary {
        download,
        fix_gaps,
        feature_rows: features.table.len(),
        report,
    })
}
