//! Lookup table resolving converter text into [`Converter`] values.
//!
//! Converter text is a name optionally followed by `:`-separated parameters,
//! e.g. `*round:2:*up`. The registry maps each name to a constructor that
//! parses the parameters; unknown names and bad parameters are reported as
//! [`CompileError::InvalidConverter`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::converter::numeric::RoundingMethod;
use crate::converter::text::{SipPart, StripSpec};
use crate::converter::time::{self, Zone};
use crate::converter::Converter;
use crate::error::CompileError;

/// Separator between a converter name and its parameters.
pub const PARAM_SEPARATOR: char = ':';

/// A converter definition split into name and parameters.
#[derive(Debug, Clone, Copy)]
pub struct ConverterSpec<'a> {
    /// The whole definition, e.g. `*round:2:*up`
    pub text: &'a str,
    pub name: &'a str,
    /// Everything after the first `:`, if present
    pub params: Option<&'a str>,
}

impl<'a> ConverterSpec<'a> {
    pub fn split(text: &'a str) -> Self {
        match text.split_once(PARAM_SEPARATOR) {
            Some((name, params)) => Self {
                text,
                name,
                params: Some(params),
            },
            None => Self {
                text,
                name: text,
                params: None,
            },
        }
    }
}

/// Builds a converter from its definition; errors are human-readable reasons.
pub type Constructor = fn(&ConverterSpec<'_>) -> Result<Converter, String>;

/// Registry of converter constructors, keyed by converter name.
pub struct ConverterRegistry {
    constructors: IndexMap<&'static str, Constructor>,
}

static BUILTIN: Lazy<ConverterRegistry> = Lazy::new(ConverterRegistry::with_builtins);

impl ConverterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// The registry holding every supported converter.
    pub fn builtin() -> &'static ConverterRegistry {
        &BUILTIN
    }

    fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("*duration_seconds", |spec| plain(spec, Converter::DurationSeconds));
        registry.register("*duration_nanoseconds", |spec| {
            plain(spec, Converter::DurationNanoseconds)
        });
        registry.register("*duration_minutes", |spec| plain(spec, Converter::DurationMinutes));
        registry.register("*duration", |spec| plain(spec, Converter::Duration));
        registry.register("*durfmt", build_duration_format);
        registry.register("*round", build_round);
        registry.register("*multiply", |spec| Ok(Converter::Multiply(mandatory_float(spec)?)));
        registry.register("*divide", |spec| match mandatory_float(spec)? {
            divisor if divisor == 0.0 => Err("*divide converter: division by zero".to_string()),
            divisor => Ok(Converter::Divide(divisor)),
        });
        registry.register("*json", |spec| plain(spec, Converter::Json));
        registry.register("*ip2hex", |spec| plain(spec, Converter::Ip2Hex));
        registry.register("*string2hex", |spec| plain(spec, Converter::String2Hex));
        registry.register("*sipuri_host", |spec| plain(spec, Converter::SipUri(SipPart::Host)));
        registry.register("*sipuri_user", |spec| plain(spec, Converter::SipUri(SipPart::User)));
        registry.register("*sipuri_method", |spec| {
            plain(spec, Converter::SipUri(SipPart::Method))
        });
        registry.register("*unixtime", |spec| plain(spec, Converter::UnixTime));
        registry.register("*timestring", build_time_string);
        registry.register("*len", |spec| plain(spec, Converter::Len));
        registry.register("*float64", |spec| plain(spec, Converter::Float64));
        registry.register("*e164Domain", |spec| plain(spec, Converter::E164Domain));
        registry.register("*e164", |spec| plain(spec, Converter::E164));
        registry.register("*urldecode", |spec| plain(spec, Converter::UrlDecode));
        registry.register("*urlencode", |spec| plain(spec, Converter::UrlEncode));
        registry.register("*random", build_random);
        registry.register("*strip", |spec| Ok(Converter::Strip(StripSpec::parse(spec.text)?)));
        registry.register("*gigawords", |spec| plain(spec, Converter::Gigawords));
        registry
    }

    /// Register a converter constructor under `name`.
    pub fn register(&mut self, name: &'static str, constructor: Constructor) {
        self.constructors.insert(name, constructor);
    }

    /// Build the converter described by `text`.
    pub fn resolve(&self, text: &str) -> Result<Converter, CompileError> {
        let spec = ConverterSpec::split(text);
        let constructor = self
            .constructors
            .get(spec.name)
            .ok_or_else(|| CompileError::InvalidConverter {
                spec: text.to_string(),
                reason: format!("unsupported converter definition: <{text}>"),
            })?;

        constructor(&spec).map_err(|reason| CompileError::InvalidConverter {
            spec: text.to_string(),
            reason,
        })
    }

    /// Check if a converter is registered
    pub fn has_converter(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Names of all registered converters, in registration order.
    pub fn list_converters(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Converters that take no parameters.
fn plain(spec: &ConverterSpec<'_>, converter: Converter) -> Result<Converter, String> {
    match spec.params {
        None => Ok(converter),
        Some(_) => Err(format!("unsupported converter definition: <{}>", spec.text)),
    }
}

fn mandatory_float(spec: &ConverterSpec<'_>) -> Result<f64, String> {
    match spec.params {
        None | Some("") => Err(format!("{} converter: mandatory parameter missing", spec.name)),
        Some(value) => value
            .parse::<f64>()
            .map_err(|err| format!("{} converter: invalid value <{value}>: {err}", spec.name)),
    }
}

/// Beyond this the scale factor no longer fits the precision of an `f64`.
const MAX_ROUND_DECIMALS: i32 = 15;

fn build_round(spec: &ConverterSpec<'_>) -> Result<Converter, String> {
    let params: Vec<&str> = match spec.params {
        None | Some("") => Vec::new(),
        Some(params) => params.split(PARAM_SEPARATOR).collect(),
    };
    if params.len() > 2 {
        return Err(format!(
            "unsupported *round converter parameters: <{}>",
            spec.params.unwrap_or_default()
        ));
    }

    let decimals = match params.first() {
        Some(decimals) => decimals.parse::<i32>().map_err(|_| {
            format!("*round converter needs integer as decimals, have: <{decimals}>")
        })?,
        None => 0,
    };
    if !(-MAX_ROUND_DECIMALS..=MAX_ROUND_DECIMALS).contains(&decimals) {
        return Err(format!(
            "*round converter supports at most {MAX_ROUND_DECIMALS} decimals, have: <{decimals}>"
        ));
    }
    let method = match params.get(1) {
        Some(name) => RoundingMethod::parse(name)
            .ok_or_else(|| format!("unsupported *round method: <{name}>"))?,
        None => RoundingMethod::default(),
    };
    Ok(Converter::Round { decimals, method })
}

fn build_duration_format(spec: &ConverterSpec<'_>) -> Result<Converter, String> {
    let layout = match spec.params {
        None | Some("") => time::DEFAULT_CLOCK_LAYOUT,
        Some(layout) => layout,
    };
    time::validate_layout(layout)?;
    Ok(Converter::DurationFormat {
        layout: layout.to_string(),
    })
}

/// `*timestring[:<zone>[:<layout>]]`; the layout may itself contain `:`.
fn build_time_string(spec: &ConverterSpec<'_>) -> Result<Converter, String> {
    let mut zone_name = "Local";
    let mut layout = time::DEFAULT_TIME_LAYOUT;
    if let Some(params) = spec.params.filter(|p| !p.is_empty()) {
        let mut parts = params.splitn(2, PARAM_SEPARATOR);
        if let Some(zone) = parts.next().filter(|z| !z.is_empty()) {
            zone_name = zone;
        }
        if let Some(custom) = parts.next().filter(|l| !l.is_empty()) {
            layout = custom;
        }
    }
    time::validate_layout(layout)?;
    Ok(Converter::TimeString {
        zone: Zone::parse(zone_name)?,
        layout: layout.to_string(),
    })
}

/// `*random[:<begin>[:<end>]]`; empty bounds count as zero, meaning open.
fn build_random(spec: &ConverterSpec<'_>) -> Result<Converter, String> {
    let params: Vec<&str> = match spec.params {
        None | Some("") => Vec::new(),
        Some(params) => params.split(PARAM_SEPARATOR).collect(),
    };
    if params.len() > 2 {
        return Err(format!(
            "unsupported *random converter parameters: <{}>",
            spec.params.unwrap_or_default()
        ));
    }

    let bound = |idx: usize| -> Result<i64, String> {
        match params.get(idx) {
            None | Some(&"") => Ok(0),
            Some(value) => value
                .parse::<i64>()
                .map_err(|err| format!("*random converter: invalid bound <{value}>: {err}")),
        }
    };
    let begin = bound(0)?;
    let end = bound(1)?;
    if end != 0 && end <= begin {
        return Err(format!(
            "*random converter: end <{end}> must be greater than begin <{begin}>"
        ));
    }
    Ok(Converter::Random { begin, end })
}
