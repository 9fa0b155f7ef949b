//! Time-axis regularization.
//!
//! Reindexes a candle table onto the complete grid `[min, max]` at a fixed
//! interval. A grid tick with no candle gets a flat candle at the previous
//! close with zero volume.

use crate::domain::{canonicalize, Candle, Interval};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegularizeError {
    #[error("interval {0} has no fixed length, cannot build a regular grid")]
    IrregularInterval(Interval),
}

/// Reindex `table` onto its fixed-frequency grid.
///
/// Returns the regularized table and the number of synthesized rows. The
/// output has exactly `floor((max - min) / interval) + 1` rows. Duplicate
/// timestamps collapse to their first copy; rows between grid ticks are dropped.
pub fn regularize(
    table: &[Candle],
    interval: Interval,
) -> Result<(Vec<Candle>, usize), RegularizeError> {
    let step = interval
        .duration()
        .ok_or(RegularizeError::IrregularInterval(interval))?;

    let mut input = table.to_vec();
    canonicalize(&mut input);

    let (Some(first), Some(last)) = (input.first(), input.last()) else {
        return Ok((Vec::new(), 0));
    };
    let (first, last) = (first.timestamp, last.timestamp);

    let ticks = ((last - first).num_milliseconds() / step.num_milliseconds()) as usize + 1;
    let mut out: Vec<Candle> = Vec::with_capacity(ticks);
    let mut missing = 0;
    let mut off_grid = 0;

    let mut rows = input.into_iter().peekable();
    let mut tick = first;
    while tick <= last {
        while rows.next_if(|c| c.timestamp < tick).is_some() {
            off_grid += 1;
        }
        match rows.next_if(|c| c.timestamp == tick) {
            Some(candle) => out.push(candle),
            None => {
                // The first tick is always a real row, so there is a previous close.
                let prev_close = out.last().map_or(f64::NAN, |c| c.close);
                out.push(Candle::flat(tick, prev_close));
                missing += 1;
            }
        }
        tick += step;
    }
    off_grid += rows.count();

    if off_grid > 0 {
        warn!(off_grid, %interval, "dropped candles not aligned to the grid");
    }
    info!(rows = out.len(), missing, "regularized time axis");

    Ok((out, missing))
}
