//! Value converters applied at the end of a rule.
//!
//! A rule such as `~*req.Usage{*duration_seconds&*round:2}` carries a chain
//! of converters. Each one is resolved from its text once, when the rule is
//! compiled, through the [`ConverterRegistry`]; evaluation then only runs
//! [`Converter::convert`] on the way through the chain.
//!
//! Values travel through a chain as a typed [`Datum`] so that, for example,
//! the float produced by `*duration_seconds` reaches `*round` without a
//! string round-trip. The final datum is rendered back to a string.

pub mod duration;
pub mod numeric;
pub mod registry;
pub mod text;
pub mod time;

use std::fmt;

use rand::Rng;

use crate::error::{CompileError, ConvertError};

pub use numeric::RoundingMethod;
pub use registry::ConverterRegistry;
pub use text::{SipPart, StripSpec};
pub use time::Zone;

/// A value flowing through a converter chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Str(String),
    Int(i64),
    Float(f64),
    /// Signed nanoseconds
    Duration(i64),
}

impl Datum {
    /// Interpret the value as a duration in nanoseconds.
    pub fn to_duration(&self) -> Result<i64, ConvertError> {
        match self {
            Datum::Str(s) => duration::parse_duration_value(s).ok_or_else(|| {
                ConvertError::InvalidInput {
                    value: s.clone(),
                    target: "duration",
                }
            }),
            Datum::Int(i) => Ok(*i),
            Datum::Float(f) => Ok(*f as i64),
            Datum::Duration(d) => Ok(*d),
        }
    }

    pub fn to_float(&self) -> Result<f64, ConvertError> {
        match self {
            Datum::Str(s) => s.parse::<f64>().map_err(|_| ConvertError::InvalidInput {
                value: s.clone(),
                target: "float64",
            }),
            Datum::Int(i) => Ok(*i as f64),
            Datum::Float(f) => Ok(*f),
            Datum::Duration(d) => Ok(*d as f64),
        }
    }

    pub fn to_int(&self) -> Result<i64, ConvertError> {
        match self {
            Datum::Str(s) => s.parse::<i64>().map_err(|_| ConvertError::InvalidInput {
                value: s.clone(),
                target: "int64",
            }),
            Datum::Int(i) => Ok(*i),
            Datum::Float(f) => Ok(*f as i64),
            Datum::Duration(d) => Ok(*d),
        }
    }

    /// JSON encoding of the value; durations encode as nanoseconds.
    pub fn to_json(&self) -> String {
        let value = match self {
            Datum::Str(s) => serde_json::Value::from(s.as_str()),
            Datum::Int(i) | Datum::Duration(i) => serde_json::Value::from(*i),
            Datum::Float(f) => serde_json::Value::from(*f),
        };
        value.to_string()
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Str(s) => f.write_str(s),
            Datum::Int(i) => write!(f, "{i}"),
            Datum::Float(v) => write!(f, "{v}"),
            Datum::Duration(d) => f.write_str(&duration::format_duration(*d)),
        }
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Str(value.to_string())
    }
}

/// A converter with its parameters already parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Converter {
    DurationSeconds,
    DurationNanoseconds,
    DurationMinutes,
    Duration,
    DurationFormat { layout: String },
    Round { decimals: i32, method: RoundingMethod },
    Multiply(f64),
    Divide(f64),
    Json,
    Ip2Hex,
    String2Hex,
    SipUri(SipPart),
    UnixTime,
    TimeString { zone: Zone, layout: String },
    Len,
    Float64,
    E164Domain,
    E164,
    UrlDecode,
    UrlEncode,
    Random { begin: i64, end: i64 },
    Strip(StripSpec),
    Gigawords,
}

const OCTETS_PER_GIGAWORD: i64 = 1 << 32;

impl Converter {
    /// Resolve a converter from its text, e.g. `*round:2:*up`.
    pub fn parse(spec: &str) -> Result<Self, CompileError> {
        ConverterRegistry::builtin().resolve(spec)
    }

    /// Name the converter is registered under.
    pub fn name(&self) -> &'static str {
        match self {
            Converter::DurationSeconds => "*duration_seconds",
            Converter::DurationNanoseconds => "*duration_nanoseconds",
            Converter::DurationMinutes => "*duration_minutes",
            Converter::Duration => "*duration",
            Converter::DurationFormat { .. } => "*durfmt",
            Converter::Round { .. } => "*round",
            Converter::Multiply(_) => "*multiply",
            Converter::Divide(_) => "*divide",
            Converter::Json => "*json",
            Converter::Ip2Hex => "*ip2hex",
            Converter::String2Hex => "*string2hex",
            Converter::SipUri(SipPart::Host) => "*sipuri_host",
            Converter::SipUri(SipPart::User) => "*sipuri_user",
            Converter::SipUri(SipPart::Method) => "*sipuri_method",
            Converter::UnixTime => "*unixtime",
            Converter::TimeString { .. } => "*timestring",
            Converter::Len => "*len",
            Converter::Float64 => "*float64",
            Converter::E164Domain => "*e164Domain",
            Converter::E164 => "*e164",
            Converter::UrlDecode => "*urldecode",
            Converter::UrlEncode => "*urlencode",
            Converter::Random { .. } => "*random",
            Converter::Strip(_) => "*strip",
            Converter::Gigawords => "*gigawords",
        }
    }

    pub fn convert(&self, input: Datum) -> Result<Datum, ConvertError> {
        let out = match self {
            Converter::DurationSeconds => {
                Datum::Float(duration::as_seconds(input.to_duration()?))
            }
            Converter::DurationNanoseconds => Datum::Int(input.to_duration()?),
            Converter::DurationMinutes => {
                Datum::Float(duration::as_minutes(input.to_duration()?))
            }
            Converter::Duration => Datum::Duration(input.to_duration()?),
            Converter::DurationFormat { layout } => {
                Datum::Str(time::format_clock(input.to_duration()?, layout)?)
            }
            Converter::Round { decimals, method } => {
                Datum::Float(numeric::round(input.to_float()?, *decimals, *method))
            }
            Converter::Multiply(factor) => Datum::Float(input.to_float()? * factor),
            Converter::Divide(divisor) => Datum::Float(input.to_float()? / divisor),
            Converter::Json => Datum::Str(input.to_json()),
            Converter::Ip2Hex => Datum::Str(text::ip_to_hex(&input.to_string())),
            Converter::String2Hex => Datum::Str(text::string_to_hex(&input.to_string())),
            Converter::SipUri(part) => Datum::Str(text::sip_uri_part(&input.to_string(), *part)),
            Converter::UnixTime => Datum::Int(time::unix_seconds(&input.to_string())?),
            Converter::TimeString { zone, layout } => {
                Datum::Str(time::time_string(&input.to_string(), *zone, layout)?)
            }
            Converter::Len => Datum::Int(input.to_string().len() as i64),
            Converter::Float64 => Datum::Float(input.to_float()?),
            Converter::E164Domain => Datum::Str(text::e164_domain(&input.to_string())),
            Converter::E164 => Datum::Str(text::e164_number(&input.to_string())?),
            Converter::UrlDecode => Datum::Str(text::url_decode(&input.to_string())?),
            Converter::UrlEncode => Datum::Str(text::url_encode(&input.to_string())),
            Converter::Random { begin, end } => Datum::Int(random_in(*begin, *end)),
            Converter::Strip(spec) => match input {
                Datum::Str(s) => Datum::Str(spec.apply(&s)),
                other => {
                    return Err(ConvertError::Failed {
                        converter: "*strip",
                        reason: format!("cannot strip non-string value <{other}>"),
                    })
                }
            },
            Converter::Gigawords => {
                let gigawords = input.to_int()?;
                let octets = gigawords.checked_mul(OCTETS_PER_GIGAWORD).ok_or_else(|| {
                    ConvertError::Failed {
                        converter: "*gigawords",
                        reason: format!("<{gigawords}> gigawords overflow"),
                    }
                })?;
                Datum::Int(octets)
            }
        };
        Ok(out)
    }
}

/// Random integer for `*random`. With no bounds any non-negative integer;
/// a zero bound is open-ended. Bounds are validated when the converter is
/// built, so the ranges here are never empty.
fn random_in(begin: i64, end: i64) -> i64 {
    let mut rng = rand::thread_rng();
    match (begin, end) {
        (0, 0) => rng.gen_range(0..i64::MAX),
        (0, end) => rng.gen_range(0..end),
        (begin, 0) => rng.gen_range(0..i64::MAX).saturating_add(begin),
        (begin, end) => rng.gen_range(begin..end),
    }
}

/// Run `input` through a chain of converters and render the result.
pub fn convert_chain(converters: &[Converter], input: &str) -> Result<String, ConvertError> {
    if converters.is_empty() {
        return Ok(input.to_string());
    }
    let mut datum = Datum::from(input);
    for converter in converters {
        datum = converter.convert(datum)?;
    }
    Ok(datum.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(specs: &[&str], input: &str) -> Result<String, ConvertError> {
        let converters: Vec<Converter> = specs
            .iter()
            .map(|spec| Converter::parse(spec).unwrap())
            .collect();
        convert_chain(&converters, input)
    }

    #[test]
    fn test_duration_converters() {
        assert_eq!(chain(&["*duration_seconds"], "10000000000").unwrap(), "10");
        assert_eq!(chain(&["*duration_seconds"], "110").unwrap(), "0.00000011");
        assert_eq!(chain(&["*duration_seconds"], "10.3s").unwrap(), "10.3");
        assert_eq!(chain(&["*duration_nanoseconds"], "102").unwrap(), "102");
        assert_eq!(chain(&["*duration_nanoseconds"], "1ms").unwrap(), "1000000");
        assert_eq!(chain(&["*duration_minutes"], "90s").unwrap(), "1.5");
        assert_eq!(chain(&["*duration"], "10000000000").unwrap(), "10s");
        assert_eq!(chain(&["*duration"], "").unwrap(), "0s");
        assert_eq!(chain(&["*durfmt"], "5400s").unwrap(), "01:30:00");
        assert_eq!(chain(&["*durfmt:%M:%S"], "75s").unwrap(), "01:15");
    }

    #[test]
    fn test_duration_rejects_bad_input() {
        let err = chain(&["*duration_seconds"], "b10").unwrap_err();
        assert_eq!(
            err,
            ConvertError::InvalidInput {
                value: "b10".to_string(),
                target: "duration"
            }
        );
    }

    #[test]
    fn test_numeric_chain() {
        assert_eq!(chain(&["*duration_seconds", "*round:1:*middle"], "2210ms").unwrap(), "2.2");
        assert_eq!(chain(&["*duration_seconds", "*round"], "2210ms").unwrap(), "2");
        assert_eq!(chain(&["*round:2"], "2.3456").unwrap(), "2.35");
        assert_eq!(chain(&["*round:2"], "10").unwrap(), "10");
        assert_eq!(chain(&["*multiply:1024.0"], "1.5").unwrap(), "1536");
        assert_eq!(chain(&["*divide:1024.0"], "2048").unwrap(), "2");
        assert_eq!(chain(&["*divide:2"], "-96").unwrap(), "-48");
        assert_eq!(chain(&["*float64"], "1.50").unwrap(), "1.5");
        assert!(chain(&["*round:2"], "string_test").is_err());
        assert!(chain(&["*multiply:2"], "").is_err());
    }

    #[test]
    fn test_string_converters() {
        assert_eq!(chain(&["*json"], "cgrates").unwrap(), r#""cgrates""#);
        assert_eq!(chain(&["*duration", "*json"], "10s").unwrap(), "10000000000");
        assert_eq!(chain(&["*len"], "cgrates").unwrap(), "7");
        assert_eq!(chain(&["*len"], "").unwrap(), "0");
        assert_eq!(chain(&["*ip2hex"], "127.0.0.1").unwrap(), "0x7f000001");
        assert_eq!(chain(&["*string2hex"], "127.0.0.1").unwrap(), "0x3132372e302e302e31");
        assert_eq!(chain(&["*e164"], "4.3.2.1.6.9.4.e164.arpa").unwrap(), "4961234");
        assert_eq!(chain(&["*e164Domain"], "4.3.2.1.6.9.4.e164.arpa").unwrap(), "e164.arpa");
        assert_eq!(chain(&["*urldecode"], "a%20b").unwrap(), "a b");
        assert_eq!(chain(&["*urlencode"], "a b").unwrap(), "a+b");
        assert_eq!(chain(&["*strip:*prefix:*char:0"], "000123").unwrap(), "123");
        assert_eq!(
            chain(&["*sipuri_user"], "INVITE sip:1002@192.168.58.203 SIP/2.0").unwrap(),
            "1002"
        );
    }

    #[test]
    fn test_strip_requires_string() {
        let err = chain(&["*duration", "*strip:*prefix:1"], "10s").unwrap_err();
        assert!(matches!(err, ConvertError::Failed { converter: "*strip", .. }));
    }

    #[test]
    fn test_time_converters() {
        assert_eq!(chain(&["*unixtime"], "2013-11-07T11:29:06Z").unwrap(), "1383823746");
        assert_eq!(
            chain(&["*timestring:UTC"], "1383823746").unwrap(),
            "2013-11-07 11:29:06"
        );
        assert_eq!(
            chain(&["*timestring:+0100:%H:%M:%S"], "1383823746").unwrap(),
            "12:29:06"
        );
        assert!(chain(&["*unixtime"], "not a time").is_err());
    }

    #[test]
    fn test_gigawords() {
        assert_eq!(chain(&["*gigawords"], "2").unwrap(), "8589934592");
        assert!(chain(&["*gigawords"], "9223372036854775807").is_err());
    }

    #[test]
    fn test_random_bounds() {
        for _ in 0..50 {
            let value: i64 = chain(&["*random:5:10"], "").unwrap().parse().unwrap();
            assert!((5..10).contains(&value));
            let value: i64 = chain(&["*random::3"], "").unwrap().parse().unwrap();
            assert!((0..3).contains(&value));
            let value: i64 = chain(&["*random"], "").unwrap().parse().unwrap();
            assert!(value >= 0);
        }
    }

    #[test]
    fn test_empty_chain_is_identity() {
        assert_eq!(convert_chain(&[], "as is").unwrap(), "as is");
    }
}
