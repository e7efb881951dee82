//! Calendar and timestamp helpers
//!
//! Dates are stored as `YYYY-MM-DD`, clock times as `HH:MM:SS`, and
//! instants as RFC 3339. Saturday and Sunday are the only non-working days.

use crate::{Error, Result};
use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday,
};

/// Storage format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format for clock times
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current instant formatted for TEXT columns
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Format an instant for TEXT columns
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

/// Parse a stored RFC 3339 instant; None when the column holds garbage
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Today's date in server local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Current wall-clock time in server local time, truncated to seconds
pub fn local_time() -> NaiveTime {
    let now = Local::now().time();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| Error::InvalidInput(format!("Invalid date '{}', expected YYYY-MM-DD", value)))
}

/// Format a date for storage
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| Error::InvalidInput(format!("Invalid time '{}', expected HH:MM[:SS]", value)))
}

/// Format a clock time for storage
pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// True for Saturday and Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// English weekday name used in user-facing messages
pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Working days (weekdays) in `[max(start, employee_start), min(end, today)]`
///
/// Days after `today` are never counted, so a range reaching into the
/// future only covers the days that have actually elapsed.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use hrms_common::time::working_days;
///
/// let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
/// // Mon 2024-03-04 .. Sun 2024-03-10 has five weekdays
/// let days = working_days(d("2024-03-04"), d("2024-03-10"), None, d("2024-12-31"));
/// assert_eq!(days.len(), 5);
///
/// // Employee joined on Wednesday
/// let days = working_days(d("2024-03-04"), d("2024-03-10"), Some(d("2024-03-06")), d("2024-12-31"));
/// assert_eq!(days.len(), 3);
/// ```
pub fn working_days(
    start: NaiveDate,
    end: NaiveDate,
    employee_start: Option<NaiveDate>,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    let first = match employee_start {
        Some(joined) if joined > start => joined,
        _ => start,
    };
    let last = end.min(today);

    let mut days = Vec::new();
    let mut current = first;
    while current <= last {
        if !is_weekend(current) {
            days.push(current);
        }
        current += Duration::days(1);
    }
    days
}

/// First and last day of a calendar month
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid month {}-{}", year, month)))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| Error::InvalidInput(format!("Invalid month {}-{}", year, month)))?;
    Ok((first, next - Duration::days(1)))
}

/// Inclusive number of calendar days covered by `[start, end]`
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Time to wait from `now` until the next occurrence of `at`
///
/// If `at` has already passed today the wait runs to the same time tomorrow.
pub fn duration_until(now: NaiveDateTime, at: NaiveTime) -> std::time::Duration {
    let mut target = now.date().and_time(at);
    if target <= now {
        target += Duration::days(1);
    }
    (target - now).to_std().unwrap_or_default()
}
