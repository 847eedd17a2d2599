//! Duration parsing and rendering.
//!
//! Durations are signed nanosecond counts. The text format is the one used
//! throughout rule values: a plain integer is a number of nanoseconds,
//! anything else is a sequence of decimal numbers with unit suffixes such as
//! `300ms`, `1.5h` or `2h45m`.

const NANOSECOND: u128 = 1;
const MICROSECOND: u128 = 1_000 * NANOSECOND;
const MILLISECOND: u128 = 1_000 * MICROSECOND;
const SECOND: u128 = 1_000 * MILLISECOND;
const MINUTE: u128 = 60 * SECOND;
const HOUR: u128 = 60 * MINUTE;

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;

/// Parse a duration value: empty text is zero, an integer is nanoseconds,
/// otherwise a unit-suffixed duration.
pub fn parse_duration_value(text: &str) -> Option<i64> {
    if text.is_empty() {
        return Some(0);
    }
    if let Ok(nanos) = text.parse::<i64>() {
        return Some(nanos);
    }
    parse_duration(text)
}

/// Parse a unit-suffixed duration such as `1h2m3.5s` or `-1.5µs`.
///
/// Valid units are `ns`, `us` (or `µs`/`μs`), `ms`, `s`, `m` and `h`.
/// Returns `None` on malformed input or when the value overflows `i64`.
pub fn parse_duration(text: &str) -> Option<i64> {
    let (negative, mut rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    if rest == "0" {
        return Some(0);
    }
    if rest.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (whole, after_whole) = take_digits(rest);
        rest = after_whole;

        let mut fraction = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let (digits, after_fraction) = take_digits(after_dot);
            fraction = digits;
            rest = after_fraction;
        }
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }

        let unit_end = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = unit_scale(&rest[..unit_end])?;
        rest = &rest[unit_end..];

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().ok()?
        };
        total = total.checked_add(whole.checked_mul(unit)?)?;

        // Only the first 18 fractional digits are significant.
        let mut scale: u128 = 1;
        let mut numerator: u128 = 0;
        for digit in fraction.bytes().take(18) {
            numerator = numerator * 10 + u128::from(digit - b'0');
            scale *= 10;
        }
        total = total.checked_add(numerator * unit / scale)?;
    }

    if negative {
        if total > i64::MAX as u128 + 1 {
            return None;
        }
        Some((total as i128).wrapping_neg() as i64)
    } else {
        i64::try_from(total).ok()
    }
}

fn take_digits(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text.split_at(end)
}

fn unit_scale(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(NANOSECOND),
        "us" | "\u{00b5}s" | "\u{03bc}s" => Some(MICROSECOND),
        "ms" => Some(MILLISECOND),
        "s" => Some(SECOND),
        "m" => Some(MINUTE),
        "h" => Some(HOUR),
        _ => None,
    }
}

/// Render a duration as `72h3m0.5s`, using the largest units available.
/// Durations under a second use `ms`, `µs` or `ns`; zero is `0s`.
pub fn format_duration(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }

    let sign = if nanos < 0 { "-" } else { "" };
    let value = nanos.unsigned_abs();

    if value < SECOND as u64 {
        let (precision, unit) = if value < MICROSECOND as u64 {
            (0, "ns")
        } else if value < MILLISECOND as u64 {
            (3, "\u{00b5}s")
        } else {
            (6, "ms")
        };
        let (whole, fraction) = split_fraction(value, precision);
        return format!("{sign}{whole}{fraction}{unit}");
    }

    let (seconds_total, fraction) = split_fraction(value, 9);
    let seconds = seconds_total % 60;
    let minutes_total = seconds_total / 60;
    let minutes = minutes_total % 60;
    let hours = minutes_total / 60;

    if hours > 0 {
        format!("{sign}{hours}h{minutes}m{seconds}{fraction}s")
    } else if minutes_total > 0 {
        format!("{sign}{minutes}m{seconds}{fraction}s")
    } else {
        format!("{sign}{seconds}{fraction}s")
    }
}

/// Split `value` into its integer part and a `.ddd` fraction with
/// `precision` digits, trailing zeros removed.
fn split_fraction(value: u64, precision: u32) -> (u64, String) {
    let divisor = 10u64.pow(precision);
    let whole = value / divisor;
    let remainder = value % divisor;
    if remainder == 0 {
        return (whole, String::new());
    }
    let digits = format!("{:0width$}", remainder, width = precision as usize);
    (whole, format!(".{}", digits.trim_end_matches('0')))
}

/// Seconds in a duration, as a float.
pub fn as_seconds(nanos: i64) -> f64 {
    let seconds = nanos / NANOS_PER_SECOND;
    let remainder = nanos % NANOS_PER_SECOND;
    seconds as f64 + remainder as f64 / 1e9
}

/// Minutes in a duration, as a float.
pub fn as_minutes(nanos: i64) -> f64 {
    let minutes = nanos / NANOS_PER_MINUTE;
    let remainder = nanos % NANOS_PER_MINUTE;
    minutes as f64 + remainder as f64 / 60e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("10s"), Some(10 * NANOS_PER_SECOND));
        assert_eq!(parse_duration("300ms"), Some(300_000_000));
        assert_eq!(parse_duration("2us"), Some(2_000));
        assert_eq!(parse_duration("2µs"), Some(2_000));
        assert_eq!(parse_duration("1h2m"), Some(3_720 * NANOS_PER_SECOND));
        assert_eq!(parse_duration("1.5s"), Some(1_500_000_000));
        assert_eq!(parse_duration(".5s"), Some(500_000_000));
        assert_eq!(parse_duration("-1.5h"), Some(-5_400 * NANOS_PER_SECOND));
        assert_eq!(parse_duration("+3ns"), Some(3));
        assert_eq!(parse_duration("0"), Some(0));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("string"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("b10"), None);
        assert_eq!(parse_duration("1x"), None);
        assert_eq!(parse_duration(".s"), None);
        assert_eq!(parse_duration("9999999999999h"), None);
    }

    #[test]
    fn test_parse_duration_value() {
        assert_eq!(parse_duration_value(""), Some(0));
        assert_eq!(parse_duration_value("110"), Some(110));
        assert_eq!(parse_duration_value("10000000000"), Some(10 * NANOS_PER_SECOND));
        assert_eq!(parse_duration_value("2210ms"), Some(2_210_000_000));
        assert_eq!(parse_duration_value("a10"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(102), "102ns");
        assert_eq!(format_duration(1_500), "1.5µs");
        assert_eq!(format_duration(300_000_000), "300ms");
        assert_eq!(format_duration(10 * NANOS_PER_SECOND), "10s");
        assert_eq!(format_duration(60 * NANOS_PER_SECOND), "1m0s");
        assert_eq!(format_duration(3_723_500_000_000), "1h2m3.5s");
        assert_eq!(format_duration(-1_500_000_000), "-1.5s");
    }

    #[test]
    fn test_format_parse_agree() {
        for nanos in [1, 999, 1_001, 2_210_000_000, 86_400 * NANOS_PER_SECOND + 7] {
            assert_eq!(parse_duration(&format_duration(nanos)), Some(nanos));
        }
    }

    #[test]
    fn test_float_views() {
        assert_eq!(as_seconds(10_300_000_000), 10.3);
        assert_eq!(as_seconds(110).to_string(), "0.00000011");
        assert_eq!(as_minutes(90 * NANOS_PER_SECOND), 1.5);
    }
}
