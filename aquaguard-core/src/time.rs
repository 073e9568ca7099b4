//! Timestamps and Time Buckets
//!
//! ## Overview
//!
//! Every bucket is derived in **UTC**. Naive timestamps (no offset) found in
//! the datasets are interpreted as UTC so that the same input always lands in
//! the same bucket regardless of the host timezone.
//!
//! ## Accepted timestamp forms
//!
//! | Form | Example |
//! |------|---------|
//! | RFC 3339 | `2024-03-07T00:02:00Z`, `2024-03-07T08:02:00+08:00` |
//! | Naive date-time | `2024-03-07 00:02:00`, `2024-03-07T00:02:00.250` |
//! | Naive minute precision | `2024-03-07 00:02` |
//! | Date only | `2024-03-07` (midnight UTC) |
//! | Epoch milliseconds | `1709769720000` |
//!
//! ## Bucket keys
//!
//! | Granularity | Bucket start |
//! |-------------|--------------|
//! | `Hour` | date + hour |
//! | `Day` | calendar date |
//! | `Week` | Monday 00:00 of the ISO-8601 week |
//! | `Month` | first day of the month |
//! | `Interval(ms)` | `floor(ts / ms) * ms` |

use core::fmt;
use core::num::NonZeroU64;
use core::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::constants::time::{
    FIVE_MINUTES_MS, ONE_MINUTE_MS, SYNTHETIC_DAY_STEP_MS, SYNTHETIC_MONTH_STEP_MS,
    SYNTHETIC_WEEK_STEP_MS, TEN_MINUTES_MS, THIRTY_MINUTES_MS,
};
use crate::constants::{MS_PER_DAY, MS_PER_HOUR};
use crate::errors::{TelemetryError, TelemetryResult};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const COMPACT_DATE_LEN: usize = 8;

/// Parse a timestamp string into a UTC instant.
///
/// Accepted forms are RFC 3339, the naive date-time layouts above (read as
/// UTC), `YYYY-MM-DD`, compact `YYYYMMDD`, and epoch milliseconds. An
/// unsigned eight-digit string that is a valid calendar date is read as
/// `YYYYMMDD`; every other all-digit string (optionally signed) is epoch
/// milliseconds.
pub fn parse_timestamp(raw: &str) -> TelemetryResult<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(TelemetryError::MissingTimestamp);
    }

    let digits = text.strip_prefix('-').unwrap_or(text);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if digits.len() == text.len() && text.len() == COMPACT_DATE_LEN {
            if let Some(at) = NaiveDate::parse_from_str(text, "%Y%m%d").ok().and_then(midnight) {
                return Ok(at);
            }
        }
        let ms: i64 = text
            .parse()
            .map_err(|_| TelemetryError::TimestampOutOfRange(text.into()))?;
        return from_epoch_ms(ms);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return midnight(date).ok_or_else(|| TelemetryError::TimestampOutOfRange(text.into()));
    }

    Err(TelemetryError::MalformedTimestamp(text.into()))
}

/// Convert epoch milliseconds into a UTC instant.
pub fn from_epoch_ms(ms: i64) -> TelemetryResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| TelemetryError::TimestampOutOfRange(ms.to_string()))
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive))
}

/// Time bucket width used for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// Calendar hour (UTC)
    Hour,
    /// Calendar day (UTC)
    Day,
    /// ISO-8601 week, starting Monday 00:00 UTC
    Week,
    /// Calendar month (UTC)
    Month,
    /// Fixed width in milliseconds, aligned to the Unix epoch
    Interval(NonZeroU64),
}

impl Granularity {
    /// Fixed-width granularity; `None` for a zero width.
    pub fn interval_ms(ms: u64) -> Option<Self> {
        NonZeroU64::new(ms).map(Granularity::Interval)
    }

    /// Parse a granularity name, falling back to [`Granularity::Hour`] for
    /// anything unrecognized.
    pub fn parse_lenient(name: &str) -> Self {
        match name.parse() {
            Ok(granularity) => granularity,
            Err(_) => {
                log_warn!("Unknown granularity {:?}, defaulting to hour", name);
                Granularity::Hour
            }
        }
    }

    /// Interpret a query parameter.
    ///
    /// Returns `None` when no aggregation is wanted (absent, empty or `raw`).
    pub fn from_query(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim) {
            None | Some("") => None,
            Some(v) if v.eq_ignore_ascii_case("raw") => None,
            Some(v) => Some(Self::parse_lenient(v)),
        }
    }

    /// Start of the bucket containing `at`.
    ///
    /// `None` only when the bucket start is not representable (far outside
    /// any realistic dataset).
    pub fn bucket_start(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let date = at.date_naive();
        match self {
            Granularity::Hour => date
                .and_hms_opt(at.hour(), 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive)),
            Granularity::Day => midnight(date),
            Granularity::Week => {
                let back = i64::from(date.weekday().num_days_from_monday());
                date.checked_sub_signed(Duration::days(back)).and_then(midnight)
            }
            Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).and_then(midnight),
            Granularity::Interval(width) => {
                let width = i64::try_from(width.get()).ok()?;
                let start = at.timestamp_millis().div_euclid(width).checked_mul(width)?;
                from_epoch_ms(start).ok()
            }
        }
    }

    /// Spacing between generated points when synthesizing a series at this
    /// granularity.
    pub fn synthetic_step_ms(&self) -> u64 {
        match self {
            Granularity::Hour => MS_PER_HOUR as u64,
            Granularity::Day => SYNTHETIC_DAY_STEP_MS,
            Granularity::Week => SYNTHETIC_WEEK_STEP_MS,
            Granularity::Month => SYNTHETIC_MONTH_STEP_MS,
            Granularity::Interval(width) => width.get(),
        }
    }
}

impl FromStr for Granularity {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let fixed = match name.as_str() {
            "hour" => return Ok(Granularity::Hour),
            "day" => return Ok(Granularity::Day),
            "week" => return Ok(Granularity::Week),
            "month" => return Ok(Granularity::Month),
            "1min" => Some(ONE_MINUTE_MS),
            "5min" => Some(FIVE_MINUTES_MS),
            "10min" => Some(TEN_MINUTES_MS),
            "30min" => Some(THIRTY_MINUTES_MS),
            "hourly" => Some(MS_PER_HOUR as u64),
            "daily" => Some(MS_PER_DAY as u64),
            _ => None,
        };

        let width = match fixed {
            Some(width) => Some(width),
            None => {
                if let Some(n) = name.strip_suffix("ms") {
                    n.parse::<u64>().ok()
                } else if let Some(n) = name.strip_suffix("min") {
                    n.parse::<u64>().ok().and_then(|n| n.checked_mul(ONE_MINUTE_MS))
                } else {
                    None
                }
            }
        };

        width
            .and_then(Granularity::interval_ms)
            .ok_or_else(|| TelemetryError::UnknownGranularity(s.into()))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Hour => f.write_str("hour"),
            Granularity::Day => f.write_str("day"),
            Granularity::Week => f.write_str("week"),
            Granularity::Month => f.write_str("month"),
            Granularity::Interval(width) => write!(f, "{}ms", width),
        }
    }
}
