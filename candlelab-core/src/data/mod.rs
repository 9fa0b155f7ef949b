//! Data acquisition, storage, regularization and validation.

pub mod binance;
pub mod download;
pub mod provider;
pub mod regularize;
pub mod store;
pub mod validate;

pub use binance::BinanceSource;
pub use download::{fetch_and_merge, merge, DownloadOptions, DownloadSummary, StopReason};
pub use provider::{CandleSource, SourceError};
pub use regularize::{regularize, RegularizeError};
pub use store::{StoreError, TableMeta};
pub use validate::{validate, ValidationError, ValidationReport};
