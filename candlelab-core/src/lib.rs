//! CandleLab Core: hourly OHLCV acquisition and feature pipeline.
//!
//! Four stages, each a whole-table rewrite of one Parquet file:
//! - Incremental download from a paged market-data source
//! - Gap regularization onto the interval grid
//! - Feature and label construction with a chronological split
//! - Data-quality validation report

pub mod config;
pub mod data;
pub mod domain;
pub mod features;
pub mod indicators;
pub mod pipeline;
