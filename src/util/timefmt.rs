//! Timestamp formatting for build logs and protocol envelopes.

use std::fmt::Display;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeDelta, TimeZone, Utc};

use crate::{AppError, Result};

/// Weekday number, month, day, time, year, and UTC offset,
/// e.g. `3 05 15 13:04:05 2024 +0000`.
pub const DEFAULT_DATETIME_FORMAT: &str = "%w %m %d %H:%M:%S %Y %z";

/// Current local time with its UTC offset.
#[must_use]
pub fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Format `dt` with a `strftime`-style `format`.
#[must_use]
pub fn datetime_to_string<Tz>(dt: &DateTime<Tz>, format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dt.format(format).to_string()
}

/// Parse a timestamp produced by [`datetime_to_string`].
///
/// # Errors
///
/// Returns `AppError::Protocol` when `raw` does not match `format`.
pub fn string_to_datetime(raw: &str, format: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw, format)
        .map_err(|err| AppError::Protocol(format!("invalid timestamp {raw:?}: {err}")))
}

/// Attach a fixed UTC offset, given in seconds east of UTC, to a naive
/// timestamp without shifting its wall-clock fields.
///
/// # Errors
///
/// Returns `AppError::Protocol` when the offset is a day or more.
pub fn with_offset(dt: NaiveDateTime, offset_seconds: i32) -> Result<DateTime<FixedOffset>> {
    FixedOffset::east_opt(offset_seconds)
        .and_then(|offset| offset.from_local_datetime(&dt).single())
        .ok_or_else(|| AppError::Protocol(format!("invalid utc offset: {offset_seconds}s")))
}

/// Convert a UTC timestamp to the host's local time zone.
#[must_use]
pub fn utc_to_local(dt: &DateTime<Utc>) -> DateTime<Local> {
    dt.with_timezone(&Local)
}

/// Convert any timestamp to UTC.
#[must_use]
pub fn local_to_utc<Tz: TimeZone>(dt: &DateTime<Tz>) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

/// Render a duration as `H:MM:SS`, prefixed by `N day(s), ` when it spans
/// whole days. Sub-second precision is dropped; negative durations count
/// days downwards, so minus one second renders as `-1 day, 23:59:59`.
#[must_use]
pub fn format_timedelta(delta: TimeDelta) -> String {
    let mut total = delta.num_seconds();
    if delta.subsec_nanos() < 0 {
        total -= 1;
    }

    let days = total.div_euclid(86_400);
    let rem = total.rem_euclid(86_400);
    let clock = format!("{}:{:02}:{:02}", rem / 3600, rem % 3600 / 60, rem % 60);

    match days {
        0 => clock,
        1 | -1 => format!("{days} day, {clock}"),
        _ => format!("{days} days, {clock}"),
    }
}
