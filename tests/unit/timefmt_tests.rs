use chrono::{FixedOffset, NaiveDate, TimeDelta, TimeZone, Utc};

use buildwire::util::{
    datetime_to_string, format_timedelta, local_to_utc, now, string_to_datetime, utc_to_local,
    with_offset, DEFAULT_DATETIME_FORMAT,
};
use buildwire::AppError;

#[test]
fn formats_with_default_format() {
    let dt = Utc.with_ymd_and_hms(2024, 5, 15, 13, 4, 5).unwrap();
    assert_eq!(
        datetime_to_string(&dt, DEFAULT_DATETIME_FORMAT),
        "3 05 15 13:04:05 2024 +0000"
    );
}

#[test]
fn parses_what_it_formats() {
    let offset = FixedOffset::west_opt(3 * 3600).unwrap();
    let dt = offset.with_ymd_and_hms(2023, 12, 31, 23, 59, 58).unwrap();

    let raw = datetime_to_string(&dt, DEFAULT_DATETIME_FORMAT);
    assert_eq!(raw, "0 12 31 23:59:58 2023 -0300");
    assert_eq!(string_to_datetime(&raw, DEFAULT_DATETIME_FORMAT).unwrap(), dt);
}

#[test]
fn mismatched_timestamp_is_a_protocol_error() {
    let err = string_to_datetime("yesterday", DEFAULT_DATETIME_FORMAT).unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)), "got {err:?}");
}

#[test]
fn utc_local_conversions_keep_the_instant() {
    let utc = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let local = utc_to_local(&utc);
    assert_eq!(local_to_utc(&local), utc);
}

#[test]
fn now_is_close_to_utc_now() {
    let delta = local_to_utc(&now()) - Utc::now();
    assert!(delta.num_seconds().abs() < 5);
}

#[test]
fn timedelta_under_a_day() {
    assert_eq!(format_timedelta(TimeDelta::zero()), "0:00:00");
    assert_eq!(format_timedelta(TimeDelta::seconds(5)), "0:00:05");
    assert_eq!(format_timedelta(TimeDelta::seconds(3725)), "1:02:05");
}

#[test]
fn timedelta_drops_subseconds() {
    assert_eq!(format_timedelta(TimeDelta::milliseconds(61_900)), "0:01:01");
}

#[test]
fn timedelta_with_days() {
    assert_eq!(format_timedelta(TimeDelta::days(1)), "1 day, 0:00:00");
    assert_eq!(
        format_timedelta(TimeDelta::days(3) + TimeDelta::seconds(61)),
        "3 days, 0:01:01"
    );
}

#[test]
fn negative_timedelta_counts_days_down() {
    assert_eq!(format_timedelta(TimeDelta::seconds(-1)), "-1 day, 23:59:59");
    assert_eq!(format_timedelta(TimeDelta::days(-2)), "-2 days, 0:00:00");
}

#[test]
fn with_offset_keeps_wall_clock_fields() {
    let naive = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();

    let dt = with_offset(naive, -3 * 3600).unwrap();
    assert_eq!(dt.naive_local(), naive);
    assert_eq!(dt.offset().local_minus_utc(), -3 * 3600);
    assert_eq!(
        datetime_to_string(&dt, DEFAULT_DATETIME_FORMAT),
        "5 03 01 10:30:00 2024 -0300"
    );
}

#[test]
fn with_offset_rejects_a_full_day() {
    let naive = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let err = with_offset(naive, 86_400).unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)), "got {err:?}");
}
