//! Candle interval in exchange notation (`1m`, `1h`, `4h`, `1d`, `1w`, `1M`).

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported interval '{0}': expected <count><m|h|d|w|M>, e.g. 1h")]
pub struct IntervalError(pub String);

/// Width of one candle bucket.
///
/// Minutes through weeks have a fixed length and form a regular grid.
/// Months are calendar months and do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Minutes(u32),
    Hours(u32),
    Days(u32),
    Weeks(u32),
    Months(u32),
}

impl Interval {
    pub const HOUR: Self = Self::Hours(1);

    /// Fixed bucket length, or `None` for calendar months.
    pub fn duration(&self) -> Option<Duration> {
        match *self {
            Self::Minutes(n) => Some(Duration::minutes(i64::from(n))),
            Self::Hours(n) => Some(Duration::hours(i64::from(n))),
            Self::Days(n) => Some(Duration::days(i64::from(n))),
            Self::Weeks(n) => Some(Duration::weeks(i64::from(n))),
            Self::Months(_) => None,
        }
    }

    /// Fixed bucket length in milliseconds, or `None` for calendar months.
    pub fn millis(&self) -> Option<i64> {
        self.duration().map(|d| d.num_milliseconds())
    }

    pub fn is_fixed_frequency(&self) -> bool {
        self.duration().is_some()
    }

    /// The bucket that follows `ts`.
    pub fn advance(&self, ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::Months(n) => ts.checked_add_months(Months::new(n)),
            _ => self.duration().and_then(|d| ts.checked_add_signed(d)),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Minutes(n) => write!(f, "{n}m"),
            Self::Hours(n) => write!(f, "{n}h"),
            Self::Days(n) => write!(f, "{n}d"),
            Self::Weeks(n) => write!(f, "{n}w"),
            Self::Months(n) => write!(f, "{n}M"),
        }
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || IntervalError(s.to_string());

        let unit = s.chars().last().ok_or_else(err)?;
        let count: u32 = s[..s.len() - unit.len_utf8()].parse().map_err(|_| err())?;
        if count == 0 {
            return Err(err());
        }

        match unit {
            'm' => Ok(Self::Minutes(count)),
            'h' => Ok(Self::Hours(count)),
            'd' => Ok(Self::Days(count)),
            'w' => Ok(Self::Weeks(count)),
            'M' => Ok(Self::Months(count)),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Interval {
    type Error = IntervalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}
