//! Small helpers shared by build tooling.

pub mod matching;
pub mod timefmt;

pub use matching::{match_string, MatchKeysMap};
pub use timefmt::{
    datetime_to_string, format_timedelta, local_to_utc, now, string_to_datetime, utc_to_local,
    with_offset, DEFAULT_DATETIME_FORMAT,
};
