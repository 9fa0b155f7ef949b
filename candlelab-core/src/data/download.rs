//! Incremental downloader: resume from the last stored candle, page through the
//! source, merge and deduplicate.
//!
//! A failed page ends the run early instead of failing it. Whatever was fetched
//! before the failure is still merged, and there is no retry.

use super::provider::CandleSource;
use crate::config::DownloadConfig;
use crate::domain::{canonicalize, Candle, Interval};
use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Pagination limits for one download run.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    pub page_limit: usize,
    pub max_pages: usize,
    pub history_floor: DateTime<Utc>,
}

impl From<&DownloadConfig> for DownloadOptions {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            page_limit: config.page_limit,
            max_pages: config.max_pages,
            history_floor: config.history_floor,
        }
    }
}

/// Why the page loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source had nothing at or after the cursor.
    EmptyPage,
    /// A page came back shorter than the page limit: end of history.
    ShortPage,
    /// `max_pages` requests were made.
    PageLimit,
    /// A request failed; carries the error text.
    FetchFailed(String),
}

/// Outcome of `fetch_and_merge`.
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    /// Merged, sorted, deduplicated table.
    pub table: Vec<Candle>,
    /// Where the first request started.
    pub start: DateTime<Utc>,
    /// Requests issued, including a failed one.
    pub pages: usize,
    /// Rows returned by the source, before deduplication.
    pub fetched: usize,
    /// Rows in `table` that were not in the prior table.
    pub added: usize,
    pub stop: StopReason,
}

/// Where acquisition begins.
///
/// A non-empty prior table always wins over the hint.
pub fn resume_point(
    existing: &[Candle],
    interval: Interval,
    since_hint: Option<DateTime<Utc>>,
    history_floor: DateTime<Utc>,
) -> DateTime<Utc> {
    match existing.iter().map(|c| c.timestamp).max() {
        Some(last) => interval.advance(last).unwrap_or(last),
        None => since_hint.unwrap_or(history_floor),
    }
}

/// Fetch every candle newer than `existing` and merge it in.
///
/// Pages are requested strictly one after another. Between two requests the
/// loop sleeps for the source's minimum request interval.
pub fn fetch_and_merge(
    source: &dyn CandleSource,
    instrument: &str,
    interval: Interval,
    existing: Option<Vec<Candle>>,
    since_hint: Option<DateTime<Utc>>,
    options: &DownloadOptions,
) -> DownloadSummary {
    let existing = existing.unwrap_or_default();
    let start = resume_point(&existing, interval, since_hint, options.history_floor);

    if existing.is_empty() {
        info!(%start, source = source.name(), "no prior table, starting download");
    } else {
        info!(%start, prior_rows = existing.len(), "resuming download");
    }

    let mut cursor = start;
    let mut fetched: Vec<Candle> = Vec::new();
    let mut pages = 0;

    let stop = loop {
        if pages >= options.max_pages {
            break StopReason::PageLimit;
        }
        if pages > 0 {
            std::thread::sleep(source.min_request_interval());
        }
        pages += 1;

        let page = match source.fetch_page(instrument, interval, cursor, options.page_limit) {
            Ok(page) => page,
            Err(e) => {
                error!(
                    page = pages,
                    %cursor,
                    error = %e,
                    "candle request failed, keeping partial download"
                );
                break StopReason::FetchFailed(e.to_string());
            }
        };

        let Some(last) = page.iter().map(|c| c.timestamp).max() else {
            break StopReason::EmptyPage;
        };
        let page_len = page.len();
        cursor = interval.advance(last).unwrap_or(last);
        fetched.extend(page);

        if page_len < options.page_limit {
            break StopReason::ShortPage;
        }
        if pages % 10 == 0 {
            info!(pages, last_candle = %last, "download progress");
        }
    };

    // Stored tables may carry duplicate timestamps; count distinct keys.
    let mut prior_keys: Vec<DateTime<Utc>> = existing.iter().map(|c| c.timestamp).collect();
    prior_keys.sort_unstable();
    prior_keys.dedup();
    let prior_rows = prior_keys.len();
    let fetched_rows = fetched.len();
    let table = merge(existing, fetched);
    let added = table.len() - prior_rows.min(table.len());

    info!(pages, fetched = fetched_rows, added, rows = table.len(), ?stop, "download finished");

    DownloadSummary {
        table,
        start,
        pages,
        fetched: fetched_rows,
        added,
        stop,
    }
}

/// Concatenate prior and new rows, sort, and drop duplicate timestamps.
///
/// Prior rows come first, so on a timestamp collision the stored copy is kept.
pub fn merge(existing: Vec<Candle>, fetched: Vec<Candle>) -> Vec<Candle> {
    let mut all = existing;
    all.extend(fetched);
    canonicalize(&mut all);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::SourceError;
    use chrono::{Duration, TimeZone};
    use std::cell::RefCell;
    use std::time::Instant;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn hourly(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle {
                    timestamp: t0() + Duration::hours(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1.0,
                }
            })
            .collect()
    }

    /// In-memory source over a fixed history.
    struct ScriptedSource {
        history: Vec<Candle>,
        fail_on_call: Option<usize>,
        min_interval: std::time::Duration,
        calls: RefCell<Vec<(DateTime<Utc>, Instant)>>,
    }

    impl ScriptedSource {
        fn new(history: Vec<Candle>) -> Self {
            Self {
                history,
                fail_on_call: None,
                min_interval: std::time::Duration::ZERO,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn cursors(&self) -> Vec<DateTime<Utc>> {
            self.calls.borrow().iter().map(|(c, _)| *c).collect()
        }
    }

    impl CandleSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch_page(
            &self,
            _instrument: &str,
            _interval: Interval,
            since: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<Candle>, SourceError> {
            self.calls.borrow_mut().push((since, Instant::now()));
            if Some(self.calls.borrow().len()) == self.fail_on_call {
                return Err(SourceError::NetworkUnreachable("connection reset".into()));
            }
            Ok(self
                .history
                .iter()
                .filter(|c| c.timestamp >= since)
                .take(limit)
                .copied()
                .collect())
        }

        fn min_request_interval(&self) -> std::time::Duration {
            self.min_interval
        }
    }

    fn options(page_limit: usize) -> DownloadOptions {
        DownloadOptions {
            page_limit,
            max_pages: 100,
            history_floor: t0() - Duration::days(365),
        }
    }

    #[test]
    fn first_download_starts_at_hint() {
        let source = ScriptedSource::new(hourly(10));
        let hint = t0() + Duration::hours(4);
        let summary = fetch_and_merge(
            &source,
            "BTC/USDT",
            Interval::HOUR,
            None,
            Some(hint),
            &options(100),
        );

        assert_eq!(summary.start, hint);
        assert_eq!(summary.table.len(), 6);
        assert_eq!(summary.table[0].timestamp, hint);
        assert_eq!(summary.stop, StopReason::ShortPage);
    }

    #[test]
    fn first_download_without_hint_starts_at_floor() {
        let source = ScriptedSource::new(hourly(3));
        let opts = options(100);
        let summary = fetch_and_merge(&source, "BTC/USDT", Interval::HOUR, None, None, &opts);
        assert_eq!(summary.start, opts.history_floor);
        assert_eq!(summary.table.len(), 3);
    }

    #[test]
    fn prior_table_wins_over_hint() {
        let history = hourly(10);
        let source = ScriptedSource::new(history.clone());
        let existing = history[..5].to_vec();
        let summary = fetch_and_merge(
            &source,
            "BTC/USDT",
            Interval::HOUR,
            Some(existing),
            Some(t0() - Duration::days(30)),
            &options(100),
        );

        assert_eq!(summary.start, t0() + Duration::hours(5));
        assert_eq!(summary.table, history);
        assert_eq!(summary.added, 5);
    }

    #[test]
    fn paginates_and_advances_cursor_past_page_max() {
        let source = ScriptedSource::new(hourly(25));
        let summary = fetch_and_merge(
            &source,
            "BTC/USDT",
            Interval::HOUR,
            None,
            Some(t0()),
            &options(10),
        );

        assert_eq!(
            source.cursors(),
            vec![t0(), t0() + Duration::hours(10), t0() + Duration::hours(20)]
        );
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.table.len(), 25);
        assert_eq!(summary.stop, StopReason::ShortPage);
    }

    #[test]
    fn stops_on_empty_page() {
        let source = ScriptedSource::new(hourly(20));
        let summary = fetch_and_merge(
            &source,
            "BTC/USDT",
            Interval::HOUR,
            None,
            Some(t0()),
            &options(10),
        );

        assert_eq!(summary.pages, 3);
        assert_eq!(summary.stop, StopReason::EmptyPage);
        assert_eq!(summary.table.len(), 20);
    }

    #[test]
    fn stops_at_max_pages() {
        let source = ScriptedSource::new(hourly(100));
        let opts = DownloadOptions {
            max_pages: 3,
            ..options(10)
        };
        let summary = fetch_and_merge(&source, "BTC/USDT", Interval::HOUR, None, Some(t0()), &opts);

        assert_eq!(summary.pages, 3);
        assert_eq!(summary.stop, StopReason::PageLimit);
        assert_eq!(summary.table.len(), 30);
    }

    #[test]
    fn fetch_error_keeps_partial_progress() {
        let mut source = ScriptedSource::new(hourly(100));
        source.fail_on_call = Some(3);
        let existing = vec![Candle {
            timestamp: t0() - Duration::hours(1),
            ..hourly(1)[0]
        }];
        let summary = fetch_and_merge(
            &source,
            "BTC/USDT",
            Interval::HOUR,
            Some(existing),
            None,
            &options(10),
        );

        assert!(matches!(summary.stop, StopReason::FetchFailed(_)));
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.fetched, 20);
        assert_eq!(summary.table.len(), 21);
    }

    #[test]
    fn waits_between_requests() {
        let mut source = ScriptedSource::new(hourly(30));
        source.min_interval = std::time::Duration::from_millis(20);
        fetch_and_merge(&source, "BTC/USDT", Interval::HOUR, None, Some(t0()), &options(10));

        let calls = source.calls.borrow();
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            assert!(pair[1].1.duration_since(pair[0].1) >= std::time::Duration::from_millis(20));
        }
    }

    #[test]
    fn rerun_without_new_data_is_identity() {
        let history = hourly(12);
        let source = ScriptedSource::new(history.clone());
        let first = fetch_and_merge(
            &source,
            "BTC/USDT",
            Interval::HOUR,
            None,
            Some(t0()),
            &options(5),
        );
        let second = fetch_and_merge(
            &source,
            "BTC/USDT",
            Interval::HOUR,
            Some(first.table.clone()),
            None,
            &options(5),
        );

        assert_eq!(second.table, first.table);
        assert_eq!(second.added, 0);
        assert_eq!(second.stop, StopReason::EmptyPage);
    }

    #[test]
    fn added_ignores_duplicate_prior_rows() {
        let history = hourly(9);
        let source = ScriptedSource::new(history.clone());
        let mut existing = history[..7].to_vec();
        existing.extend_from_slice(&history[..3]);

        let summary = fetch_and_merge(
            &source,
            "BTC/USDT",
            Interval::HOUR,
            Some(existing),
            None,
            &options(100),
        );

        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.table, history);
        assert_eq!(summary.added, 2);
    }

    #[test]
    fn merge_keeps_prior_copy_on_collision() {
        let prior = hourly(2);
        let mut overlap = hourly(3);
        overlap[1].close = 999.0;

        let merged = merge(prior.clone(), overlap);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].close, prior[1].close);
    }

    #[test]
    fn resume_point_steps_one_interval() {
        let existing = hourly(3);
        assert_eq!(
            resume_point(&existing, Interval::HOUR, None, t0()),
            t0() + Duration::hours(3)
        );
        assert_eq!(resume_point(&[], Interval::HOUR, None, t0()), t0());
    }
}
