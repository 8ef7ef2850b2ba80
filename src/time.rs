//! Time and Timezone Utilities Module
//!
//! Timezone resolution, parsing of `--time`/`--timeframe` arguments into
//! absolute instants, and timestamp formatting.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike};
use chrono_english::{Dialect, parse_date_string};
use chrono_tz::Tz;
use iana_time_zone::get_timezone;
use std::sync::OnceLock;
use tracing::{debug, warn};
use tzf_rs::DefaultFinder;

use crate::error::{PvError, Result};
use crate::geo::Location;
use crate::sampling::Timeframe;

// tzf-rs DefaultFinder is pre-compiled and very fast
static TZF_FINDER: OnceLock<DefaultFinder> = OnceLock::new();

/// Display format for every emitted timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M %Z";

// ===================== TIME PARSING =====================

/// Parse a time string in HH:MM[:SS[.fffffffff]] format.
///
/// # Returns
/// Tuple of (hours, minutes, seconds, nanoseconds)
pub fn parse_time_ns(s: &str) -> Result<(u32, u32, u32, u32)> {
    let formats = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

    for fmt in formats {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Ok((t.hour(), t.minute(), t.second(), t.nanosecond()));
        }
    }
    Err(PvError::InvalidTime(format!(
        "'{}' is not a valid time of day (use HH:MM, HH:MM:SS or HH:MM:SS.fff)",
        s
    )))
}

/// Parse a `--time` argument: `now` or `YYYY-MM-DD HH:MM[:SS[.fff]]` in `tz`.
///
/// The date and time may also be joined by an ISO 8601 `T`.
///
/// Local times that fall in a DST gap or a DST overlap are rejected.
pub fn parse_instant(s: &str, tz: Tz, now: DateTime<Tz>) -> Result<DateTime<Tz>> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    let (date_part, time_part) =
        s.split_once(|c: char| c.is_whitespace() || c == 'T').ok_or_else(|| {
            PvError::InvalidTime(format!("'{}' is not in 'YYYY-MM-DD HH:MM' format", s))
        })?;

    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| PvError::InvalidTime(format!("'{}': {}", date_part, e)))?;
    let (h, m, sec, ns) = parse_time_ns(time_part.trim())?;
    let naive = date
        .and_hms_nano_opt(h, m, sec, ns)
        .ok_or_else(|| PvError::InvalidTime(format!("'{}' has invalid time digits", s)))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Ok(t),
        LocalResult::Ambiguous(t1, t2) => Err(PvError::InvalidTime(format!(
            "{} is ambiguous in {} (DST overlap: {} or {})",
            s,
            tz,
            t1.format("%H:%M %Z"),
            t2.format("%H:%M %Z")
        ))),
        LocalResult::None => {
            Err(PvError::InvalidTime(format!("{} does not exist in {} (DST gap)", s, tz)))
        }
    }
}

/// Parse a single timeframe endpoint: ISO date or a natural-language date.
fn parse_day(s: &str, anchor: DateTime<Tz>) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    parse_date_string(s, anchor, Dialect::Us)
        .map(|dt| dt.date_naive())
        .map_err(|e| PvError::InvalidTime(format!("'{}' is not a date: {}", s, e)))
}

/// First valid local instant of a calendar day.
///
/// Tries 00:00, then 01:00 for zones whose DST switch happens at midnight.
/// An ambiguous midnight resolves to the earlier instant.
pub fn start_of_day(tz: Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    for hour in [0, 1] {
        let naive = date.and_time(NaiveTime::MIN) + Duration::hours(hour);
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => {
                if hour > 0 {
                    warn!("{} has no local midnight in {}; day starts at {}", date, tz, t.format("%H:%M %Z"));
                }
                return Ok(t);
            }
            LocalResult::None => continue,
        }
    }
    Err(PvError::InvalidTime(format!("{} has no valid start of day in {}", date, tz)))
}

/// Parse a `--timeframe` argument `START:END` into an inclusive instant range.
///
/// The range runs from the start of START to one minute before the start of
/// the day after END.
pub fn parse_timeframe(s: &str, tz: Tz, anchor: DateTime<Tz>) -> Result<Timeframe> {
    let (start_s, end_s) = s.split_once(':').ok_or_else(|| {
        PvError::InvalidTime(format!("'{}' is not in 'YYYY-MM-DD:YYYY-MM-DD' format", s))
    })?;

    let start_date = parse_day(start_s, anchor)?;
    let end_date = parse_day(end_s, anchor)?;
    if end_date < start_date {
        return Err(PvError::InvalidTime(format!(
            "timeframe ends ({}) before it starts ({})",
            end_date, start_date
        )));
    }

    let next_day = end_date
        .succ_opt()
        .ok_or_else(|| PvError::InvalidTime(format!("{} is out of range", end_date)))?;

    let timeframe = Timeframe {
        start: start_of_day(tz, start_date)?,
        end: start_of_day(tz, next_day)? - Duration::minutes(1),
    };
    debug!("Timeframe {} .. {}", format_timestamp(&timeframe.start), format_timestamp(&timeframe.end));
    Ok(timeframe)
}

// ===================== TIMEZONE UTILITIES =====================

/// Get the system's configured timezone.
///
/// Falls back to UTC if the system timezone cannot be determined.
pub fn system_timezone() -> Tz {
    get_timezone().ok().and_then(|s| s.parse().ok()).unwrap_or(Tz::UTC)
}

/// Resolve timezone from geographic coordinates, or UTC if resolution fails.
pub fn resolve_timezone(lon: f64, lat: f64) -> Tz {
    let finder = TZF_FINDER.get_or_init(DefaultFinder::new);
    let tzid = finder.get_tz_name(lon, lat);
    tzid.parse::<Tz>().unwrap_or(Tz::UTC)
}

/// Resolve a `--timezone` setting.
///
/// `system` and `location` are keywords; anything else must be an IANA name.
pub fn resolve_tz_setting(setting: &str, location: &Location) -> Result<Tz> {
    let tz = match setting.trim() {
        "system" => system_timezone(),
        "location" => resolve_timezone(location.longitude, location.latitude),
        s if s.eq_ignore_ascii_case("utc") => Tz::UTC,
        other => other.parse::<Tz>().map_err(|_| PvError::UnknownTimezone(other.to_string()))?,
    };
    debug!("Timezone '{}' resolved to {}", setting, tz);
    Ok(tz)
}

// ===================== FORMATTING =====================

pub fn format_timestamp(t: &DateTime<Tz>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

// ===================== TESTS =====================
