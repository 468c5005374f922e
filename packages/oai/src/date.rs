//! Date range handling for `from`/`until` arguments.
//!
//! Timestamps are milliseconds since the Unix epoch. Both ends of a range are
//! inclusive.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Start of an unbounded range.
pub const EPOCH_MS: i64 = 0;

/// End of an unbounded range: 9999-12-31T23:59:59.999Z.
pub const FAR_FUTURE_MS: i64 = 253_402_300_799_999;

/// Datestamp format used in responses and accepted at second granularity.
pub const DATESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Invalid `from`/`until` input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("Illegal date value: '{0}'")]
    Format(String),

    #[error("The 'from' date ({from}) is later than the 'until' date ({until})")]
    Inverted { from: String, until: String },
}

/// Granularity of a date argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Second,
}

impl Granularity {
    /// Detect the granularity of a raw argument, if it has a supported shape.
    #[must_use]
    pub fn of(value: &str) -> Option<Self> {
        match value.len() {
            8 | 10 => Some(Self::Day),
            20 => Some(Self::Second),
            _ => None,
        }
    }
}

/// Inclusive timestamp range derived from `from`/`until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: i64,
    pub until: i64,
}

impl DateRange {
    /// A range covering every possible datestamp.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            from: EPOCH_MS,
            until: FAR_FUTURE_MS,
        }
    }

    /// Parse raw `from`/`until` arguments.
    ///
    /// # Examples
    /// ```
    /// use oai_harvest::date::DateRange;
    ///
    /// let range = DateRange::parse(Some("2024-01-01"), Some("20240131")).unwrap();
    /// assert!(range.contains(1_704_067_200_000));
    /// assert!(DateRange::parse(Some("yesterday"), None).is_err());
    /// ```
    pub fn parse(from: Option<&str>, until: Option<&str>) -> Result<Self, DateError> {
        let range = Self {
            from: from_timestamp(from)?,
            until: until_timestamp(until)?,
        };

        if range.from > range.until {
            return Err(DateError::Inverted {
                from: from.unwrap_or_default().to_string(),
                until: until.unwrap_or_default().to_string(),
            });
        }

        Ok(range)
    }

    #[must_use]
    pub fn contains(&self, timestamp: i64) -> bool {
        self.from <= timestamp && timestamp <= self.until
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Expand a `from` argument to the first millisecond it covers.
///
/// Missing values default to the epoch.
pub fn from_timestamp(from: Option<&str>) -> Result<i64, DateError> {
    match from {
        None => Ok(EPOCH_MS),
        Some(value) => match parse_value(value)? {
            Parsed::Day(date) => day_millis(value, date, 0, 0, 0, 0),
            Parsed::Second(datetime) => Ok(datetime.and_utc().timestamp_millis()),
        },
    }
}

/// Expand an `until` argument to the last millisecond it covers.
///
/// Missing values default to the far future.
pub fn until_timestamp(until: Option<&str>) -> Result<i64, DateError> {
    match until {
        None => Ok(FAR_FUTURE_MS),
        Some(value) => match parse_value(value)? {
            Parsed::Day(date) => day_millis(value, date, 23, 59, 59, 999),
            Parsed::Second(datetime) => Ok(datetime.and_utc().timestamp_millis() + 999),
        },
    }
}

/// Format a timestamp as an OAI-PMH datestamp (`YYYY-MM-DDThh:mm:ssZ`).
#[must_use]
pub fn format_datestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .map(|dt| dt.format(DATESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

enum Parsed {
    Day(NaiveDate),
    Second(NaiveDateTime),
}

fn parse_value(value: &str) -> Result<Parsed, DateError> {
    let invalid = || DateError::Format(value.to_string());

    match Granularity::of(value) {
        Some(Granularity::Day) if value.len() == 8 => NaiveDate::parse_from_str(value, "%Y%m%d")
            .map(Parsed::Day)
            .map_err(|_| invalid()),
        Some(Granularity::Day) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Parsed::Day)
            .map_err(|_| invalid()),
        Some(Granularity::Second) => NaiveDateTime::parse_from_str(value, DATESTAMP_FORMAT)
            .map(Parsed::Second)
            .map_err(|_| invalid()),
        None => Err(invalid()),
    }
}

fn day_millis(
    raw: &str,
    date: NaiveDate,
    hour: u32,
    minute: u32,
    second: u32,
    milli: u32,
) -> Result<i64, DateError> {
    date.and_hms_milli_opt(hour, minute, second, milli)
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| DateError::Format(raw.to_string()))
}
