//! CandleLab CLI: pipeline stage commands.
//!
//! Commands:
//! - `download`: incrementally fetch candles into the raw table
//! - `fix-gaps`: regularize the raw table onto its interval grid
//! - `features`: build the feature table, manifest and split metadata
//! - `validate`: audit a candle table and write the report
//! - `run`: all four stages in order
//! - `tail`: print the trailing candles of the fixed table as JSON

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use candlelab_core::config::PipelineConfig;
use candlelab_core::pipeline;

#[derive(Parser)]
#[command(
    name = "candlelab",
    about = "CandleLab CLI: hourly candle download, gap fixing, features and validation"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new candles and merge them into the raw table.
    Download {
        /// First day to fetch (YYYY-MM-DD) when no raw table exists yet.
        #[arg(long)]
        since: Option<String>,
    },
    /// Fill missing grid ticks in the raw table and write the fixed table.
    FixGaps,
    /// Build features and labels from the fixed table.
    Features,
    /// Audit a candle table and write the validation report.
    Validate {
        /// Table to audit. Defaults to the raw table.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Download, fix gaps, build features and validate.
    Run {
        /// First day to fetch (YYYY-MM-DD) when no raw table exists yet.
        #[arg(long)]
        since: Option<String>,
    },
    /// Print the trailing candles of the fixed table as JSON.
    Tail {
        /// Number of candles.
        #[arg(short, long, default_value_t = 24)]
        n: usize,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so `tail` output stays machine-readable.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Download { since } => run_download(&config, since.as_deref()),
        Commands::FixGaps => run_fix_gaps(&config),
        Commands::Features => run_features(&config),
        Commands::Validate { input } => run_validate(&config, input),
        Commands::Run { since } => run_all(&config, since.as_deref()),
        Commands::Tail { n } => run_tail(&config, n),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn parse_since(since: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    since
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("--since expects YYYY-MM-DD, got '{s}'"))
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        })
        .transpose()
}

fn run_download(config: &PipelineConfig, since: Option<&str>) -> Result<()> {
    let since = parse_since(since)?;
    let source = pipeline::source_for(config)?;
    let summary = pipeline::run_download(config, source.as_ref(), since)?;

    println!(
        "Downloaded {} new candles ({} pages, stop: {:?}); raw table has {} rows: {}",
        summary.added,
        summary.pages,
        summary.stop,
        summary.table.len(),
        config.raw_path.display()
    );
    Ok(())
}

fn run_fix_gaps(config: &PipelineConfig) -> Result<()> {
    let summary = pipeline::run_fix_gaps(config)?;
    println!(
        "Filled {} missing ticks; fixed table has {} rows: {}",
        summary.missing,
        summary.rows,
        config.fixed_path.display()
    );
    Ok(())
}

fn run_features(config: &PipelineConfig) -> Result<()> {
    let set = pipeline::run_features(config)?;
    println!(
        "Built {} feature rows with {} manifest columns: {}",
        set.table.len(),
        set.manifest.len(),
        config.features_path.display()
    );
    println!(
        "Split: train {}..{} ({}), val {}..{} ({}), test {}..{} ({})",
        set.splits.train.start,
        set.splits.train.end,
        set.splits.train.len(),
        set.splits.val.start,
        set.splits.val.end,
        set.splits.val.len(),
        set.splits.test.start,
        set.splits.test.end,
        set.splits.test.len(),
    );
    Ok(())
}

fn run_validate(config: &PipelineConfig, input: Option<PathBuf>) -> Result<()> {
    let report = pipeline::run_validate(config, input.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("Report saved to: {}", config.report_path().display());
    Ok(())
}

fn run_all(config: &PipelineConfig, since: Option<&str>) -> Result<()> {
    let since = parse_since(since)?;
    let source = pipeline::source_for(config)?;
    let summary = pipeline::run_all(config, source.as_ref(), since)?;

    info!(
        added = summary.download.added,
        missing = summary.fix_gaps.missing,
        feature_rows = summary.feature_rows,
        clean = summary.report.is_clean(),
        "pipeline finished"
    );
    println!(
        "Pipeline done: +{} candles, {} gaps filled, {} feature rows, report clean: {}",
        summary.download.added,
        summary.fix_gaps.missing,
        summary.feature_rows,
        summary.report.is_clean()
    );
    Ok(())
}

fn run_tail(config: &PipelineConfig, n: usize) -> Result<()> {
    let candles = pipeline::tail(config, n)?;
    println!("{}", serde_json::to_string_pretty(&candles)?);
    Ok(())
}
