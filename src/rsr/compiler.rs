//! Rule string splitting and per-rule compilation.
//!
//! Grammar of a single rule:
//!
//! ```text
//! literal
//! ~path[:s/search/replace/]*[{converter(&converter)*}][(filter(&filter)*)]
//! ~prefix<~nested;rules>suffix
//! ```
//!
//! A rule string holds several rules joined by a separator. Text between
//! backticks is taken verbatim, so separators inside it do not split.

use tracing::trace;

use super::filter::{parse_filters, Filter};
use super::parser::{DynamicTemplate, RsrParser, RsrParsers, RuleSource};
use super::search_replace::{unescaped_slashes, SearchReplace, SEARCH_REPLACE_MARKER};
use crate::converter::Converter;
use crate::error::CompileError;
use crate::extraction::FieldPath;

/// Prefix of a dynamic rule.
pub const DYNAMIC_PREFIX: char = '~';
/// Opens a verbatim span; the same character closes it.
pub const VERBATIM: char = '`';
/// Opens a nested dynamic path inside a rule.
pub const DYNAMIC_PATH_OPEN: &str = "<~";
pub const DYNAMIC_PATH_CLOSE: char = '>';
/// Opens a converter block.
pub const CONVERTER_OPEN: &str = "{*";
pub const CONVERTER_CLOSE: char = '}';
/// Separator between converters of a block.
pub const CONVERTER_SEPARATOR: char = '&';

/// Split a rule string on `separator`, honoring verbatim spans.
///
/// Backticks are dropped and their content is merged into the enclosing
/// rule. Inside rules starting with `~`, `<~...>` spans are not split either.
/// An empty rule string gives no rules.
///
/// ```
/// use rsrconf::rsr::compiler::split_rules;
///
/// let rules = split_rules("constant;`>;q=0.7`;~*req.Account", ";").unwrap();
/// assert_eq!(rules, vec!["constant", ">;q=0.7", "~*req.Account"]);
/// ```
pub fn split_rules(rules: &str, separator: &str) -> Result<Vec<String>, CompileError> {
    if rules.is_empty() {
        return Ok(Vec::new());
    }
    if rules.chars().filter(|&c| c == VERBATIM).count() % 2 != 0 {
        return Err(CompileError::UnclosedVerbatim {
            rules: rules.to_string(),
        });
    }
    let empty_rule = || CompileError::EmptyRule {
        rules: rules.to_string(),
    };

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_verbatim = false;
    // True while the last thing added to `current` was a closed verbatim span
    let mut closed_verbatim = false;
    let mut previous_closed_verbatim = false;

    let mut idx = 0;
    while idx < rules.len() {
        let rest = &rules[idx..];
        let Some(ch) = rest.chars().next() else {
            break;
        };

        if ch == VERBATIM {
            in_verbatim = !in_verbatim;
            closed_verbatim = !in_verbatim;
            idx += ch.len_utf8();
            continue;
        }
        if in_verbatim {
            current.push(ch);
            idx += ch.len_utf8();
            continue;
        }

        if current.starts_with(DYNAMIC_PREFIX) && rest.starts_with(DYNAMIC_PATH_OPEN) {
            if let Some(close) = rest[DYNAMIC_PATH_OPEN.len()..].find(DYNAMIC_PATH_CLOSE) {
                let span_end = DYNAMIC_PATH_OPEN.len() + close + 1;
                current.push_str(&rest[..span_end]);
                closed_verbatim = false;
                idx += span_end;
                continue;
            }
        }

        if rest.starts_with(separator) {
            if current.is_empty() {
                return Err(empty_rule());
            }
            segments.push(std::mem::take(&mut current));
            previous_closed_verbatim = closed_verbatim;
            closed_verbatim = false;
            idx += separator.len();
            continue;
        }

        current.push(ch);
        closed_verbatim = false;
        idx += ch.len_utf8();
    }

    if current.is_empty() {
        // `a;`x`;` ends with an empty rule right after a verbatim span
        if !(previous_closed_verbatim && !segments.is_empty()) {
            return Err(empty_rule());
        }
    } else {
        segments.push(current);
    }
    Ok(segments)
}

/// Compile a single rule. `separator` is used for nested `<~...>` rule sets.
pub fn compile_rule(rule: &str, separator: &str) -> Result<RsrParser, CompileError> {
    if let Some(template) = compile_template(rule, separator)? {
        trace!(rule, "compiled dynamic path template");
        return Ok(RsrParser::from_parts(
            rule,
            RuleSource::Template(Box::new(template)),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        ));
    }

    let (body, filters) = split_filter_block(rule)?;
    let (body, converters) = split_converter_block(rule, body)?;

    if !body.starts_with(DYNAMIC_PREFIX) || body.len() == DYNAMIC_PREFIX.len_utf8() {
        return Ok(RsrParser::from_parts(
            rule,
            RuleSource::Static(body.to_string()),
            Vec::new(),
            converters,
            filters,
        ));
    }

    let mut parts = body.split(SEARCH_REPLACE_MARKER);
    let path = parts.next().unwrap_or_default();
    let steps = parts
        .map(SearchReplace::parse)
        .collect::<Result<Vec<_>, _>>()?;
    let field = FieldPath::from_dotted(&path[DYNAMIC_PREFIX.len_utf8()..]);

    Ok(RsrParser::from_parts(
        rule,
        RuleSource::Field {
            path: path.to_string(),
            field,
        },
        steps,
        converters,
        filters,
    ))
}

/// Compile the `<~...>` span of a rule, if it has one.
fn compile_template(rule: &str, separator: &str) -> Result<Option<DynamicTemplate>, CompileError> {
    let Some(open) = rule.find(DYNAMIC_PATH_OPEN) else {
        return Ok(None);
    };
    let inner_start = open + 1;
    let Some(close) = rule[inner_start..].find(DYNAMIC_PATH_CLOSE) else {
        return Ok(None);
    };
    let inner_end = inner_start + close;

    let nested = RsrParsers::compile_separated(&rule[inner_start..inner_end], separator)?;
    Ok(Some(DynamicTemplate::new(
        &rule[..open],
        nested,
        &rule[inner_end + 1..],
        separator,
    )))
}

/// Strip a trailing `(...)` filter block from a dynamic rule.
fn split_filter_block(rule: &str) -> Result<(&str, Vec<Filter>), CompileError> {
    if !rule.starts_with(DYNAMIC_PREFIX) || !rule.ends_with(')') {
        return Ok((rule, Vec::new()));
    }

    let mut depth = 0usize;
    let mut open = None;
    for (idx, byte) in rule.bytes().enumerate().rev() {
        match byte {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    open = Some(idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(open) = open else {
        return Err(CompileError::InvalidFilter {
            spec: rule.to_string(),
            reason: "unbalanced filter block".to_string(),
        });
    };

    let filters = parse_filters(&rule[open + 1..rule.len() - 1])?;
    Ok((&rule[..open], filters))
}

/// Strip a trailing `{*...}` converter block and resolve its converters.
///
/// Only the text after the closing `/` of the last search/replace step is
/// searched for the block, so braces inside a regex are left alone and
/// converter parameters may contain `/`.
fn split_converter_block<'a>(
    rule: &str,
    body: &'a str,
) -> Result<(&'a str, Vec<Converter>), CompileError> {
    let tail_start = match body.rfind(SEARCH_REPLACE_MARKER) {
        Some(marker) => {
            let step_start = marker + SEARCH_REPLACE_MARKER.len();
            match unescaped_slashes(&body[step_start..]).get(1) {
                Some(replace_end) => step_start + replace_end + 1,
                // Malformed step, reported when the steps are parsed
                None => body.len(),
            }
        }
        None => 0,
    };
    let Some(offset) = body[tail_start..].find(CONVERTER_OPEN) else {
        return Ok((body, Vec::new()));
    };
    if !body.ends_with(CONVERTER_CLOSE) {
        return Err(CompileError::UnterminatedConverter {
            rule: rule.to_string(),
        });
    }

    let open = tail_start + offset;
    let converters = body[open + 1..body.len() - 1]
        .split(CONVERTER_SEPARATOR)
        .map(Converter::parse)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((&body[..open], converters))
}
