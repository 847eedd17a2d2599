//! Timestamp parsing and rendering for `*unixtime`, `*timestring` and
//! `*durfmt`.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConvertError;

/// Default `*timestring` layout.
pub const DEFAULT_TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";
/// Default `*durfmt` layout.
pub const DEFAULT_CLOCK_LAYOUT: &str = "%H:%M:%S";

static UNIX_SECONDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").unwrap());
static UNIX_MILLIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{13}$").unwrap());
static UNIX_NANOS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{19}$").unwrap());
static UNIX_FRACTIONAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}\.\d+$").unwrap());

/// Naive layouts tried in order; they are interpreted as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y%m%d%H%M%S",
];

/// Parse a timestamp, detecting its layout.
///
/// Accepted: `*now`, unix timestamps in seconds, milliseconds or
/// nanoseconds (optionally with a fractional part for seconds), RFC 3339,
/// RFC 2822, `YYYY-MM-DD hh:mm:ss`, `YYYY-MM-DDThh:mm:ss`,
/// `YYYYMMDDhhmmss` and `YYYY-MM-DD`. Timestamps without a zone are UTC.
pub fn parse_time(input: &str) -> Result<DateTime<FixedOffset>, ConvertError> {
    let input = input.trim();
    let invalid = || ConvertError::InvalidInput {
        value: input.to_string(),
        target: "time",
    };

    if input == "*now" {
        return Ok(Utc::now().fixed_offset());
    }

    if UNIX_SECONDS.is_match(input) {
        let secs = input.parse::<i64>().map_err(|_| invalid())?;
        return from_unix_nanos(secs.checked_mul(1_000_000_000)).ok_or_else(invalid);
    }
    if UNIX_MILLIS.is_match(input) {
        let millis = input.parse::<i64>().map_err(|_| invalid())?;
        return from_unix_nanos(millis.checked_mul(1_000_000)).ok_or_else(invalid);
    }
    if UNIX_NANOS.is_match(input) {
        let nanos = input.parse::<i64>().map_err(|_| invalid())?;
        return from_unix_nanos(Some(nanos)).ok_or_else(invalid);
    }
    if UNIX_FRACTIONAL.is_match(input) {
        let secs = input.parse::<f64>().map_err(|_| invalid())?;
        return from_unix_nanos(Some((secs * 1e9) as i64)).ok_or_else(invalid);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(input) {
        return Ok(parsed);
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, layout) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().fixed_offset());
        }
    }

    Err(invalid())
}

fn from_unix_nanos(nanos: Option<i64>) -> Option<DateTime<FixedOffset>> {
    Some(DateTime::from_timestamp_nanos(nanos?).fixed_offset())
}

/// Zone a `*timestring` renders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Utc,
    Local,
    Fixed(FixedOffset),
}

impl Zone {
    /// Parse `UTC`, `Local` or a fixed offset like `+0200` or `-05:30`.
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "UTC" | "utc" | "Z" => return Ok(Self::Utc),
            "Local" | "local" => return Ok(Self::Local),
            _ => {}
        }
        name.parse::<FixedOffset>()
            .map(Self::Fixed)
            .map_err(|_| format!("unknown time zone <{name}>"))
    }

    fn format(&self, time: &DateTime<FixedOffset>, layout: &str) -> Result<String, ConvertError> {
        match self {
            Zone::Utc => render(&time.with_timezone(&Utc), layout),
            Zone::Local => render(&time.with_timezone(&Local), layout),
            Zone::Fixed(offset) => render(&time.with_timezone(offset), layout),
        }
    }
}

/// Reject layouts chrono cannot render.
pub fn validate_layout(layout: &str) -> Result<(), String> {
    if StrftimeItems::new(layout).any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid time layout <{layout}>"));
    }
    Ok(())
}

fn render<Tz: TimeZone>(time: &DateTime<Tz>, layout: &str) -> Result<String, ConvertError>
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    write!(out, "{}", time.format(layout)).map_err(|_| ConvertError::Failed {
        converter: "*timestring",
        reason: format!("cannot render time with layout <{layout}>"),
    })?;
    Ok(out)
}

/// Unix seconds of a timestamp.
pub fn unix_seconds(input: &str) -> Result<i64, ConvertError> {
    Ok(parse_time(input)?.timestamp())
}

/// Render a timestamp in `zone` with a chrono layout.
pub fn time_string(input: &str, zone: Zone, layout: &str) -> Result<String, ConvertError> {
    zone.format(&parse_time(input)?, layout)
}

/// Render a duration as the wall-clock time that far after midnight,
/// e.g. 90 minutes with `%H:%M:%S` is `01:30:00`.
pub fn format_clock(nanos: i64, layout: &str) -> Result<String, ConvertError> {
    let time = DateTime::<Utc>::UNIX_EPOCH
        .checked_add_signed(TimeDelta::nanoseconds(nanos))
        .ok_or_else(|| ConvertError::Failed {
            converter: "*durfmt",
            reason: format!("duration <{nanos}> out of range"),
        })?;
    let mut out = String::new();
    write!(out, "{}", time.format(layout)).map_err(|_| ConvertError::Failed {
        converter: "*durfmt",
        reason: format!("cannot render duration with layout <{layout}>"),
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_layouts() {
        let expected = 1_383_823_746;
        for input in [
            "1383823746",
            "1383823746000",
            "1383823746000000000",
            "1383823746.0",
            "2013-11-07T11:29:06Z",
            "2013-11-07T12:29:06+01:00",
            "2013-11-07 11:29:06",
            "2013-11-07T11:29:06",
            "20131107112906",
        ] {
            assert_eq!(unix_seconds(input).unwrap(), expected, "{input}");
        }
        assert_eq!(unix_seconds("2013-11-07").unwrap(), 1_383_782_400);
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(parse_time("").is_err());
        assert!(parse_time("yesterday").is_err());
        assert!(parse_time("2013-13-40 11:29:06").is_err());
    }

    #[test]
    fn test_now() {
        let before = Utc::now().timestamp();
        let now = unix_seconds("*now").unwrap();
        assert!(now >= before && now <= Utc::now().timestamp());
    }

    #[test]
    fn test_time_string_zones() {
        assert_eq!(
            time_string("2013-11-07T11:29:06Z", Zone::Utc, DEFAULT_TIME_LAYOUT).unwrap(),
            "2013-11-07 11:29:06"
        );
        let plus_two = Zone::parse("+02:00").unwrap();
        assert_eq!(
            time_string("1383823746", plus_two, "%H:%M").unwrap(),
            "13:29"
        );
        assert!(Zone::parse("Europe/Nowhere").is_err());
        assert_eq!(Zone::parse("Local").unwrap(), Zone::Local);
    }

    #[test]
    fn test_validate_layout() {
        assert!(validate_layout(DEFAULT_TIME_LAYOUT).is_ok());
        assert!(validate_layout("%Q").is_err());
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(90 * 60 * 1_000_000_000, DEFAULT_CLOCK_LAYOUT).unwrap(), "01:30:00");
        assert_eq!(format_clock(1_500_000_000, "%M:%S%.3f").unwrap(), "00:01.500");
    }
}
