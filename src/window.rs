use std::cmp::Ordering;
use std::fmt;

use chrono::TimeZone;
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::{AppError, Result};

/// A Slack message timestamp.
///
/// Slack uses `"<seconds>.<micros>"` strings both as a point in time and as the
/// identity of a message, so the raw text is kept next to its numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamp {
    raw: String,
    secs: f64,
}

impl Timestamp {
    pub fn parse(raw: &str) -> Result<Self> {
        let secs: f64 = raw
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidTimestamp(raw.to_string()))?;
        if !secs.is_finite() {
            return Err(AppError::InvalidTimestamp(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            secs,
        })
    }

    pub fn from_secs(secs: i64) -> Self {
        Self {
            raw: secs.to_string(),
            secs: secs as f64,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn secs(&self) -> f64 {
        self.secs
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.secs.partial_cmp(&other.secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Inclusive harvest window in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub oldest: i64,
    pub latest: i64,
}

impl Window {
    pub fn new(oldest: i64, latest: i64) -> Self {
        Self { oldest, latest }
    }

    /// The whole calendar `year` as seen from `tz`.
    pub fn for_year(year: i32, tz: Tz) -> Result<Self> {
        let start = tz
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .earliest()
            .ok_or(AppError::InvalidYear(year))?;
        let end = tz
            .with_ymd_and_hms(year, 12, 31, 23, 59, 59)
            .latest()
            .ok_or(AppError::InvalidYear(year))?;
        Ok(Self {
            oldest: start.timestamp(),
            latest: end.timestamp(),
        })
    }

    pub fn oldest_ts(&self) -> Timestamp {
        Timestamp::from_secs(self.oldest)
    }

    pub fn latest_ts(&self) -> Timestamp {
        Timestamp::from_secs(self.latest)
    }

    /// Only the floor is checked: pages are cut at `latest` by the API, but
    /// overlapping pages can still return messages older than `oldest`.
    pub fn admits(&self, ts: &Timestamp) -> bool {
        ts.secs() >= self.oldest as f64
    }
}

pub fn parse_time_zone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AppError::InvalidTimeZone(name.to_string()))
}
