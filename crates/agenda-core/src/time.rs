//! Time types for calendar events.
//!
//! This module provides [`EventTime`] for representing event start/end times
//! (which may be either a zoned instant or an all-day date), and
//! [`TimeWindow`] for defining query ranges.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Represents the start or end of a calendar event.
///
/// The calendar service returns either:
/// - **DateTime**: an RFC 3339 instant, kept with the offset it was sent with
/// - **Date**: a date without a time (all-day events)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific instant, with the offset reported by the service.
    DateTime(DateTime<FixedOffset>),
    /// An all-day event date (no specific time).
    Date(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a datetime in any timezone.
    pub fn from_datetime<Tz: TimeZone>(dt: DateTime<Tz>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }

    /// Creates a new `EventTime::Date` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::Date(date)
    }

    /// Parses the `{date, dateTime}` pair used by the calendar API.
    ///
    /// `date_time` wins when both are present. Returns `None` when neither
    /// field parses.
    pub fn parse(date: Option<&str>, date_time: Option<&str>) -> Option<Self> {
        if let Some(dt) = date_time {
            return DateTime::parse_from_rfc3339(dt).ok().map(Self::DateTime);
        }
        date.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(Self::Date)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Returns the instant if this is a `DateTime` variant.
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            Self::Date(_) => None,
        }
    }

    /// Returns the date if this is a `Date` variant.
    pub fn as_date(&self) -> Option<&NaiveDate> {
        match self {
            Self::Date(d) => Some(d),
            Self::DateTime(_) => None,
        }
    }

    /// Converts to a UTC datetime for comparison purposes.
    ///
    /// All-day dates compare as midnight UTC.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => dt.with_timezone(&Utc),
            Self::Date(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Converts to a UTC datetime, placing all-day dates at local midnight in
    /// `tz`.
    ///
    /// Use this to order the events of a day view; all-day events then start
    /// with the day instead of at midnight UTC.
    pub fn to_utc_in<Tz: TimeZone>(&self, tz: &Tz) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => dt.with_timezone(&Utc),
            Self::Date(date) => {
                local_midnight(*date, tz).unwrap_or_else(|| self.to_utc_datetime())
            }
        }
    }

    /// Returns the calendar date of this time, in the offset it carries.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::Date(date) => *date,
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Chronological; ties put all-day dates first, then order by offset so the
/// ordering agrees with `Eq`.
impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime()
            .cmp(&other.to_utc_datetime())
            .then_with(|| match (self, other) {
                (Self::Date(_), Self::DateTime(_)) => Ordering::Less,
                (Self::DateTime(_), Self::Date(_)) => Ordering::Greater,
                (Self::DateTime(a), Self::DateTime(b)) => a
                    .offset()
                    .local_minus_utc()
                    .cmp(&b.offset().local_minus_utc()),
                (Self::Date(_), Self::Date(_)) => Ordering::Equal,
            })
    }
}

/// A half-open `[start, end)` query range in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window, or `None` if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Creates the window covering one local day in the given timezone.
    ///
    /// Midnight that falls into a DST gap resolves to the earliest valid
    /// local time. Returns `None` only for dates at the edge of chrono's range.
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<Self> {
        let start = local_midnight(date, tz)?;
        let end = local_midnight(date.succ_opt()?, tz)?;
        Self::new(start, end)
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// Checks if a datetime falls within this window.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        // A gap at midnight (e.g. America/Santiago): step into the next hour.
        .or_else(|| {
            tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
}
