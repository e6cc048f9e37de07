// src/calendar.rs
use chrono::{
    DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ComplianceError;

// Accepted layouts for raw attendance values, tried in order after RFC 3339.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

// --- Calendar Basis ---

/// The UTC offset used to reduce instants to calendar days.
///
/// Evaluation never consults the host's local zone; two hosts configured with
/// the same basis always agree on which day an instant falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarBasis {
    offset: FixedOffset,
}

impl CalendarBasis {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn from_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day an instant falls on under this basis.
    pub fn calendar_day<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Today's calendar day under this basis. Only the CLI host calls this;
    /// the evaluator itself never reads the clock.
    pub fn today(&self) -> NaiveDate {
        self.calendar_day(&Utc::now())
    }
}

impl Default for CalendarBasis {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for CalendarBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.offset)
    }
}

impl FromStr for CalendarBasis {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_utc_offset(s)
            .map(Self::from_offset)
            .ok_or_else(|| ComplianceError::InvalidOffset(s.to_string()))
    }
}

impl TryFrom<String> for CalendarBasis {
    type Error = ComplianceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CalendarBasis> for String {
    fn from(basis: CalendarBasis) -> Self {
        basis.to_string()
    }
}

fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Some(Utc.fix());
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    if !rest.is_ascii() {
        return None;
    }
    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    if hours.is_empty()
        || !hours.chars().all(|c| c.is_ascii_digit())
        || !minutes.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

// --- Date Inputs ---

/// A date value as it arrives from a caller or an attendance feed.
///
/// Anything that cannot be reduced to a calendar day is treated as malformed:
/// an error for the calculation date, a skipped record for attendance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateInput {
    Missing,
    Date(NaiveDate),
    /// Wall-clock time already expressed in the calendar basis.
    Local(NaiveDateTime),
    /// An absolute instant; reduced to a day under the calendar basis.
    Instant(DateTime<FixedOffset>),
    Raw(String),
}

impl DateInput {
    pub fn to_calendar_date(&self, basis: &CalendarBasis) -> Option<NaiveDate> {
        match self {
            DateInput::Missing => None,
            DateInput::Date(date) => Some(*date),
            DateInput::Local(datetime) => Some(datetime.date()),
            DateInput::Instant(instant) => Some(basis.calendar_day(instant)),
            DateInput::Raw(raw) => parse_raw_date(raw, basis),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            DateInput::Missing => true,
            DateInput::Raw(raw) => raw.trim().is_empty(),
            _ => false,
        }
    }
}

fn parse_raw_date(raw: &str, basis: &CalendarBasis) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Some(basis.calendar_day(&instant));
    }
    if let Some(datetime) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(datetime.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

impl fmt::Display for DateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateInput::Missing => write!(f, "<missing>"),
            DateInput::Date(date) => write!(f, "{}", date),
            DateInput::Local(datetime) => write!(f, "{}", datetime),
            DateInput::Instant(instant) => write!(f, "{}", instant.to_rfc3339()),
            DateInput::Raw(raw) => write!(f, "'{}'", raw),
        }
    }
}

impl From<NaiveDate> for DateInput {
    fn from(date: NaiveDate) -> Self {
        DateInput::Date(date)
    }
}

impl From<NaiveDateTime> for DateInput {
    fn from(datetime: NaiveDateTime) -> Self {
        DateInput::Local(datetime)
    }
}

impl From<DateTime<FixedOffset>> for DateInput {
    fn from(instant: DateTime<FixedOffset>) -> Self {
        DateInput::Instant(instant)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(instant: DateTime<Utc>) -> Self {
        DateInput::Instant(instant.fixed_offset())
    }
}

impl From<&str> for DateInput {
    fn from(raw: &str) -> Self {
        DateInput::Raw(raw.to_string())
    }
}

impl From<String> for DateInput {
    fn from(raw: String) -> Self {
        DateInput::Raw(raw)
    }
}

impl<T: Into<DateInput>> From<Option<T>> for DateInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(DateInput::Missing, Into::into)
    }
}

// --- Date Ranges ---

/// Inclusive range of calendar days. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ComplianceError> {
        if start > end {
            return Err(ComplianceError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Range of `days` consecutive days beginning at `start`.
    pub fn from_start(start: NaiveDate, days: u64) -> Option<Self> {
        let end = start.checked_add_days(Days::new(days.checked_sub(1)?))?;
        Some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

// --- Week Helpers ---

/// Sunday that starts the calendar week containing `day`.
pub fn start_of_week_sunday(day: NaiveDate) -> Option<NaiveDate> {
    day.checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_sunday())))
}

/// Saturday ending the last fully completed week before the one containing `day`.
pub fn last_completed_saturday(day: NaiveDate) -> Option<NaiveDate> {
    start_of_week_sunday(day)?.pred_opt()
}
