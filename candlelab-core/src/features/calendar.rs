//! Cyclical time-of-day and day-of-week encodings.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::TAU;

/// `(sin, cos)` of the hour on a 24-hour circle.
pub fn hour_cycle(ts: DateTime<Utc>) -> (f64, f64) {
    let angle = TAU * ts.hour() as f64 / 24.0;
    (angle.sin(), angle.cos())
}

/// `(sin, cos)` of the weekday on a 7-day circle, Monday = 0.
pub fn weekday_cycle(ts: DateTime<Utc>) -> (f64, f64) {
    let angle = TAU * ts.weekday().num_days_from_monday() as f64 / 7.0;
    (angle.sin(), angle.cos())
}
