//! Predicates gating whether a rule contributes to the output.
//!
//! A filter block is written after the rule in parentheses, with filters
//! joined by `&`: `~*req.Account(^10&!1001)`. Every filter has to pass for the
//! rule to produce a value.

use std::fmt;

use regex::Regex;

use crate::error::{CompileError, EvalError};

/// Prefix negating a filter.
pub const NEGATION_PREFIX: char = '!';
/// Separator between the filters of a block.
pub const FILTER_SEPARATOR: char = '&';

#[derive(Debug, Clone)]
enum Predicate {
    /// Empty filter text; always passes
    Always,
    Regex(Regex),
    Empty,
    NotEmpty,
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Compare(Comparison, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn holds(self, value: f64, bound: f64) -> bool {
        match self {
            Comparison::Gt => value > bound,
            Comparison::Gte => value >= bound,
            Comparison::Lt => value < bound,
            Comparison::Lte => value <= bound,
        }
    }
}

/// A single compiled filter.
#[derive(Debug, Clone)]
pub struct Filter {
    text: String,
    negative: bool,
    predicate: Predicate,
}

impl Filter {
    /// Compile one filter.
    ///
    /// Forms, optionally prefixed by `!`:
    /// `~regex`, `^$` (empty value), `^text$`, `^prefix`, `suffix$`,
    /// `>=n`, `<=n`, `>n`, `<n`, the named forms `*string:x`, `*prefix:x`,
    /// `*suffix:x`, `*contains:x`, `*gt:n`, `*gte:n`, `*lt:n`, `*lte:n`,
    /// `*empty`, `*notempty`, and plain text which matches as a substring.
    pub fn parse(text: &str) -> Result<Self, CompileError> {
        let (negative, body) = match text.strip_prefix(NEGATION_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let invalid = |reason: String| CompileError::InvalidFilter {
            spec: text.to_string(),
            reason,
        };

        let predicate = if body.is_empty() {
            Predicate::Always
        } else if let Some(pattern) = body.strip_prefix('~') {
            Predicate::Regex(Regex::new(pattern).map_err(|err| invalid(err.to_string()))?)
        } else if body.starts_with('*') {
            named_predicate(body).map_err(invalid)?
        } else if body == "^$" {
            Predicate::Empty
        } else if let Some(rest) = body.strip_prefix('^') {
            match rest.strip_suffix('$') {
                Some(exact) => Predicate::Exact(exact.to_string()),
                None => Predicate::Prefix(rest.to_string()),
            }
        } else if let Some(suffix) = body.strip_suffix('$') {
            Predicate::Suffix(suffix.to_string())
        } else if let Some(comparison) = comparison_predicate(body).map_err(invalid)? {
            comparison
        } else {
            Predicate::Contains(body.to_string())
        };

        Ok(Self {
            text: text.to_string(),
            negative,
            predicate,
        })
    }

    /// Check `value` against the filter. Numeric comparisons against a value
    /// that is not a number fail with [`EvalError::Filter`].
    pub fn pass(&self, value: &str) -> Result<bool, EvalError> {
        let matched = match &self.predicate {
            Predicate::Always => true,
            Predicate::Regex(re) => re.is_match(value),
            Predicate::Empty => value.is_empty(),
            Predicate::NotEmpty => !value.is_empty(),
            Predicate::Exact(expected) => value == expected,
            Predicate::Prefix(prefix) => value.starts_with(prefix.as_str()),
            Predicate::Suffix(suffix) => value.ends_with(suffix.as_str()),
            Predicate::Contains(needle) => value.contains(needle.as_str()),
            Predicate::Compare(comparison, bound) => {
                let number = value.trim().parse::<f64>().map_err(|_| EvalError::Filter {
                    filter: self.text.clone(),
                    value: value.to_string(),
                })?;
                comparison.holds(number, *bound)
            }
        };
        Ok(matched != self.negative)
    }

    /// The filter as written.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_bound(text: &str) -> Result<f64, String> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| format!("<{text}> is not a number"))
}

fn comparison_predicate(body: &str) -> Result<Option<Predicate>, String> {
    // Two-character operators first so `>=` is not read as `>`.
    let operators = [
        (">=", Comparison::Gte),
        ("<=", Comparison::Lte),
        (">", Comparison::Gt),
        ("<", Comparison::Lt),
    ];
    for (operator, comparison) in operators {
        if let Some(bound) = body.strip_prefix(operator) {
            if bound.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Predicate::Compare(comparison, parse_bound(bound)?)));
        }
    }
    Ok(None)
}

fn named_predicate(body: &str) -> Result<Predicate, String> {
    let (name, arg) = match body.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (body, None),
    };
    let required = || arg.ok_or_else(|| format!("{name} filter needs a value"));

    let predicate = match name {
        "*empty" => Predicate::Empty,
        "*notempty" => Predicate::NotEmpty,
        "*string" => Predicate::Exact(required()?.to_string()),
        "*prefix" => Predicate::Prefix(required()?.to_string()),
        "*suffix" => Predicate::Suffix(required()?.to_string()),
        "*contains" => Predicate::Contains(required()?.to_string()),
        "*gt" => Predicate::Compare(Comparison::Gt, parse_bound(required()?)?),
        "*gte" => Predicate::Compare(Comparison::Gte, parse_bound(required()?)?),
        "*lt" => Predicate::Compare(Comparison::Lt, parse_bound(required()?)?),
        "*lte" => Predicate::Compare(Comparison::Lte, parse_bound(required()?)?),
        _ => return Err(format!("unsupported filter type: <{name}>")),
    };
    if arg.is_some() && matches!(predicate, Predicate::Empty | Predicate::NotEmpty) {
        return Err(format!("{name} filter takes no value"));
    }
    Ok(predicate)
}

/// Compile a `&`-joined filter block body.
pub fn parse_filters(block: &str) -> Result<Vec<Filter>, CompileError> {
    block.split(FILTER_SEPARATOR).map(Filter::parse).collect()
}

/// Check `value` against every filter; all of them must pass.
pub fn pass_all(filters: &[Filter], value: &str) -> Result<bool, EvalError> {
    for filter in filters {
        if !filter.pass(value)? {
            return Ok(false);
        }
    }
    Ok(true)
}
