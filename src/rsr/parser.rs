//! Compiled rules and their evaluation against data.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use super::compiler::{compile_rule, split_rules, DYNAMIC_PREFIX, VERBATIM};
use super::filter::{pass_all, Filter};
use super::search_replace::SearchReplace;
use crate::converter::{convert_chain, Converter};
use crate::error::{CompileError, EvalError};
use crate::extraction::{DataProvider, FieldPath};
use crate::settings::{Settings, DEFAULT_RSR_SEPARATOR};

/// Where a rule takes its value from.
#[derive(Debug, Clone)]
pub(crate) enum RuleSource {
    /// A literal, returned as is
    Static(String),
    /// A field of the data, `path` keeps the leading `~`
    Field { path: String, field: FieldPath },
    /// A rule whose text depends on a nested rule set
    Template(Box<DynamicTemplate>),
}

/// A rule with a `<~...>` span.
///
/// The nested rules are evaluated first; their output replaces the span and
/// the resulting rule text is compiled and evaluated against the same data.
/// `~*opts.<~*req.Kind;-Cost>` reads `*opts.voice-Cost` when `*req.Kind` is
/// `voice`.
#[derive(Debug, Clone)]
pub struct DynamicTemplate {
    prefix: String,
    nested: RsrParsers,
    suffix: String,
    separator: String,
}

impl DynamicTemplate {
    pub(crate) fn new(prefix: &str, nested: RsrParsers, suffix: &str, separator: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            nested,
            suffix: suffix.to_string(),
            separator: separator.to_string(),
        }
    }

    /// The rule text with the nested rules resolved against `provider`.
    pub fn resolve_rule(&self, provider: &dyn DataProvider) -> Result<String, EvalError> {
        let resolved = self.nested.parse_provider(provider)?;
        Ok(self.splice(&resolved))
    }

    fn splice(&self, resolved: &str) -> String {
        format!("{}{}{}", self.prefix, resolved, self.suffix)
    }

    fn compile_resolved(&self, rule: String) -> Result<RsrParser, EvalError> {
        compile_rule(&rule, &self.separator)
            .map_err(|source| EvalError::DynamicRule { rule, source })
    }

    fn parse_value(&self, value: &str) -> Result<String, EvalError> {
        let rule = self.splice(&self.nested.parse_value(value)?);
        self.compile_resolved(rule)?.parse_value(value)
    }

    fn parse_provider(&self, provider: &dyn DataProvider) -> Result<String, EvalError> {
        let rule = self.resolve_rule(provider)?;
        self.compile_resolved(rule)?.parse_provider(provider)
    }
}

/// One compiled rule.
///
/// Built once from its text and never mutated afterwards, so a parser can be
/// shared between threads and evaluated concurrently.
#[derive(Debug, Clone)]
pub struct RsrParser {
    rule: String,
    source: RuleSource,
    steps: Vec<SearchReplace>,
    converters: Vec<Converter>,
    filters: Vec<Filter>,
}

impl RsrParser {
    pub(crate) fn from_parts(
        rule: &str,
        source: RuleSource,
        steps: Vec<SearchReplace>,
        converters: Vec<Converter>,
        filters: Vec<Filter>,
    ) -> Self {
        Self {
            rule: rule.to_string(),
            source,
            steps,
            converters,
            filters,
        }
    }

    /// Compile a single rule, without splitting on a separator.
    ///
    /// ```
    /// use rsrconf::RsrParser;
    ///
    /// let parser = RsrParser::compile(r"~Usage:s/(\d+)/${1}ms/{*duration_seconds&*round:1}").unwrap();
    /// assert_eq!(parser.parse_value("2210").unwrap(), "2.2");
    /// ```
    pub fn compile(rule: &str) -> Result<Self, CompileError> {
        compile_rule(rule, DEFAULT_RSR_SEPARATOR)
    }

    /// The rule as written.
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// Path of the field the rule reads, without the leading `~`.
    /// Empty for literals and templates.
    pub fn attr_name(&self) -> &str {
        match &self.source {
            RuleSource::Field { path, .. } => path
                .strip_prefix(DYNAMIC_PREFIX)
                .unwrap_or(path.as_str()),
            _ => "",
        }
    }

    pub fn field(&self) -> Option<&FieldPath> {
        match &self.source {
            RuleSource::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self.source, RuleSource::Static(_))
    }

    pub fn is_template(&self) -> bool {
        matches!(self.source, RuleSource::Template(_))
    }

    pub fn steps(&self) -> &[SearchReplace] {
        &self.steps
    }

    pub fn converters(&self) -> &[Converter] {
        &self.converters
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Evaluate against a single value instead of a data provider.
    ///
    /// Literals ignore `value`; dynamic rules run it through their
    /// search/replace steps, converters and filters.
    pub fn parse_value(&self, value: &str) -> Result<String, EvalError> {
        match &self.source {
            RuleSource::Static(literal) => self.finish(literal),
            RuleSource::Field { .. } => self.finish(&self.apply_steps(value)),
            RuleSource::Template(template) => template.parse_value(value),
        }
    }

    /// Evaluate against a data provider.
    ///
    /// # Arguments
    ///
    /// * `provider` - Data the rule's field path is resolved in
    ///
    /// # Returns
    ///
    /// The rule's contribution. It is empty when a filter rejects the value,
    /// and [`EvalError::NotFound`] is returned when the field is missing.
    pub fn parse_provider(&self, provider: &dyn DataProvider) -> Result<String, EvalError> {
        match &self.source {
            RuleSource::Static(literal) => self.finish(literal),
            RuleSource::Field { field, .. } => {
                let raw = provider.extract(field).ok_or_else(|| EvalError::NotFound {
                    path: self.attr_name().to_string(),
                })?;
                self.finish(&self.apply_steps(&raw))
            }
            RuleSource::Template(template) => template.parse_provider(provider),
        }
    }

    fn apply_steps(&self, value: &str) -> String {
        self.steps
            .iter()
            .fold(value.to_string(), |acc, step| step.apply(&acc))
    }

    /// Run converters, then filters.
    fn finish(&self, value: &str) -> Result<String, EvalError> {
        let converted =
            convert_chain(&self.converters, value).map_err(|source| EvalError::Conversion {
                rule: self.rule.clone(),
                source,
            })?;
        if pass_all(&self.filters, &converted)? {
            Ok(converted)
        } else {
            Ok(String::new())
        }
    }
}

impl fmt::Display for RsrParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule)
    }
}

/// An ordered set of compiled rules; its output is the concatenation of the
/// members' outputs.
///
/// ```
/// use rsrconf::RsrParsers;
/// use serde_json::json;
///
/// let rules = RsrParsers::compile("~H1;|;~H2").unwrap();
/// let data = json!({"H1": "X", "H2": "Y"});
/// assert_eq!(rules.parse_provider(&data).unwrap(), "X|Y");
/// ```
#[derive(Debug, Clone)]
pub struct RsrParsers {
    parsers: Vec<RsrParser>,
    separator: String,
}

impl RsrParsers {
    /// Compile a rule string using the default `;` separator.
    pub fn compile(rules: &str) -> Result<Self, CompileError> {
        Self::compile_separated(rules, DEFAULT_RSR_SEPARATOR)
    }

    /// Compile a rule string using the separator from `settings`.
    pub fn compile_with(rules: &str, settings: &Settings) -> Result<Self, CompileError> {
        Self::compile_separated(rules, &settings.rsr_separator)
    }

    pub(crate) fn compile_separated(rules: &str, separator: &str) -> Result<Self, CompileError> {
        let parsers = split_rules(rules, separator)?
            .iter()
            .map(|rule| compile_rule(rule, separator))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(rules, count = parsers.len(), "compiled rule set");
        Ok(Self {
            parsers,
            separator: separator.to_string(),
        })
    }

    /// Compile every string as exactly one rule. Backticks are rejected.
    pub fn from_slice<S: AsRef<str>>(rules: &[S]) -> Result<Self, CompileError> {
        let parsers = rules
            .iter()
            .map(|rule| {
                let rule = rule.as_ref();
                // Listed rules are taken as is; a backtick could not be
                // written back by `rule()`
                if rule.contains(VERBATIM) {
                    return Err(CompileError::VerbatimInListedRule {
                        rule: rule.to_string(),
                    });
                }
                RsrParser::compile(rule)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            parsers,
            separator: DEFAULT_RSR_SEPARATOR.to_string(),
        })
    }

    /// The rules joined with the separator. Rules containing the separator
    /// are wrapped in backticks so the text compiles back to the same set.
    pub fn rule(&self) -> String {
        self.parsers
            .iter()
            .map(|parser| {
                if parser.rule().contains(self.separator.as_str()) {
                    format!("{VERBATIM}{}{VERBATIM}", parser.rule())
                } else {
                    parser.rule().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RsrParser> {
        self.parsers.iter()
    }

    /// Evaluate every rule against `value` and concatenate the results.
    pub fn parse_value(&self, value: &str) -> Result<String, EvalError> {
        let mut out = String::new();
        for parser in &self.parsers {
            out.push_str(&parser.parse_value(value)?);
        }
        Ok(out)
    }

    /// Evaluate every rule against `provider` and concatenate the results.
    /// The first failing rule aborts the evaluation.
    pub fn parse_provider(&self, provider: &dyn DataProvider) -> Result<String, EvalError> {
        let mut out = String::new();
        for parser in &self.parsers {
            out.push_str(&parser.parse_provider(provider)?);
        }
        Ok(out)
    }

    /// Evaluate every rule against `provider`, keeping the results apart.
    pub fn values(&self, provider: &dyn DataProvider) -> Result<Vec<String>, EvalError> {
        self.parsers
            .iter()
            .map(|parser| parser.parse_provider(provider))
            .collect()
    }
}

impl Default for RsrParsers {
    fn default() -> Self {
        Self {
            parsers: Vec::new(),
            separator: DEFAULT_RSR_SEPARATOR.to_string(),
        }
    }
}

impl fmt::Display for RsrParsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule())
    }
}

impl<'a> IntoIterator for &'a RsrParsers {
    type Item = &'a RsrParser;
    type IntoIter = std::slice::Iter<'a, RsrParser>;

    fn into_iter(self) -> Self::IntoIter {
        self.parsers.iter()
    }
}

impl Serialize for RsrParsers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.rule())
    }
}

/// Rule sets appear in config either as one separated string or as a list
/// with one rule per element.
#[derive(Deserialize)]
#[serde(untagged)]
enum RulesRepr {
    Joined(String),
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for RsrParsers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let compiled = match RulesRepr::deserialize(deserializer)? {
            RulesRepr::Joined(rules) => Self::compile(&rules),
            RulesRepr::List(rules) => Self::from_slice(&rules),
        };
        compiled.map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_constants() {
        let rules = RsrParsers::compile("cgrates.org").unwrap();
        assert_eq!(rules.parse_value("").unwrap(), "cgrates.org");
        assert_eq!(rules.parse_provider(&json!({})).unwrap(), "cgrates.org");

        let rules = RsrParsers::compile("constant;`>;q=0.7;expires=3600`;").unwrap();
        assert_eq!(
            rules.parse_provider(&json!({})).unwrap(),
            "constant>;q=0.7;expires=3600"
        );
    }

    #[test]
    fn test_dynamic_without_value() {
        let rules = RsrParsers::compile("~Header1;~Header2").unwrap();
        assert_eq!(rules.parse_value("").unwrap(), "");
    }

    #[test]
    fn test_missing_field() {
        let rules = RsrParsers::compile("constant;`>;q=0.7;expires=3600`;~*req.Account").unwrap();
        assert_eq!(
            rules.parse_provider(&json!({})).unwrap_err(),
            EvalError::NotFound {
                path: "*req.Account".to_string()
            }
        );
    }

    #[test]
    fn test_nested_json_paths() {
        let data = json!({"*req": {"Account": "1001", "Multiple": ["a", "b"]}});
        let rules = RsrParsers::compile("~*accounts.;~*req.Account").unwrap();
        // `~*accounts.` is a field path, and it is missing
        assert!(rules.parse_provider(&data).is_err());

        let rules = RsrParsers::compile("`~*accounts.`;~*req.Account").unwrap();
        assert!(rules.parse_provider(&data).is_err());

        let rules = RsrParsers::compile("*accounts.;~*req.Account").unwrap();
        assert_eq!(rules.parse_provider(&data).unwrap(), "*accounts.1001");

        let rules = RsrParsers::compile("~*req.Multiple[1]").unwrap();
        assert_eq!(rules.parse_provider(&data).unwrap(), "b");
    }

    #[test]
    fn test_usage_conversions() {
        let parser = RsrParser::compile(r"~Usage:s/(\d+)/${1}ms/{*duration_seconds&*round:1:*middle}")
            .unwrap();
        assert_eq!(parser.parse_value("2210").unwrap(), "2.2");

        let parser = RsrParser::compile(r"~Usage:s/(\d+)/${1}ms/{*duration_seconds&*round}").unwrap();
        assert_eq!(parser.parse_value("2210").unwrap(), "2");

        let parser = RsrParser::compile("~Usage{*duration_seconds}").unwrap();
        assert_eq!(parser.parse_value("10000000000").unwrap(), "10");
    }

    #[test]
    fn test_conversion_error() {
        let rules = RsrParsers::compile("~*req.Account{*round}").unwrap();
        let err = rules.parse_value("A").unwrap_err();
        assert!(matches!(err, EvalError::Conversion { .. }), "{err}");
    }

    #[test]
    fn test_search_replace_chain() {
        let parser = RsrParser::compile(
            r"~1:s/^00(\d+)(?:[a-zA-Z].{3})*0*([1-9]\d+)$/+$1$2/:s/^\+49(18\d{2})$/+491400$1/",
        )
        .unwrap();
        assert_eq!(parser.parse_value("0049ABOC0630415354").unwrap(), "+49630415354");
        assert_eq!(parser.parse_value("00491888").unwrap(), "+4914001888");
    }

    #[test]
    fn test_header_search_replace_then_duration() {
        let data = json!({"Header1": "a10"});
        let rules = RsrParsers::compile("~Header1:s/a/b/{*duration_seconds}").unwrap();
        let err = rules.parse_provider(&data).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Conversion {
                source: ConvertError::InvalidInput { .. },
                ..
            }
        ));

        let rules = RsrParsers::compile("~Header1:s/a/1/{*duration_seconds}").unwrap();
        assert_eq!(rules.parse_provider(&data).unwrap(), "0.00000011");
    }

    #[test]
    fn test_filters_gate_contribution() {
        let rules = RsrParsers::compile("~Account(^10);-;~Account(!^10)").unwrap();
        let data: HashMap<String, String> =
            HashMap::from([("Account".to_string(), "1001".to_string())]);
        assert_eq!(rules.parse_provider(&data).unwrap(), "1001-");

        let rules = RsrParsers::compile("~Account(>10)").unwrap();
        assert!(matches!(
            rules.parse_value("abc"),
            Err(EvalError::Filter { .. })
        ));
    }

    #[test]
    fn test_filters_see_converted_value() {
        let parser = RsrParser::compile("~Usage{*duration_seconds}(>=60)").unwrap();
        assert_eq!(parser.parse_value("90s").unwrap(), "90");
        assert_eq!(parser.parse_value("30s").unwrap(), "");
    }

    #[test]
    fn test_dynamic_template() {
        let parser = RsrParser::compile("~*opts.<~*opts.*originID;~*req.RunID;-Cos>t").unwrap();
        let data = json!({
            "*req": {"RunID": "*default"},
            "*opts": {"*originID": "originIDUniq", "originIDUniq*default-Cost": 10},
        });
        let RuleSource::Template(template) = &parser.source else {
            panic!("expected a template");
        };
        assert_eq!(
            template.resolve_rule(&data).unwrap(),
            "~*opts.originIDUniq*default-Cost"
        );
        assert_eq!(parser.parse_provider(&data).unwrap(), "10");

        let missing = json!({"*req": {}, "*opts": {"*originID": "originIDUniq"}});
        assert!(matches!(
            parser.parse_provider(&missing),
            Err(EvalError::NotFound { .. })
        ));
    }

    #[test]
    fn test_dynamic_template_bad_resolution() {
        let parser = RsrParser::compile("~*req.<~*req.Kind>").unwrap();
        let data = json!({"*req": {"Kind": "x{*nope}"}});
        assert!(matches!(
            parser.parse_provider(&data),
            Err(EvalError::DynamicRule { .. })
        ));
    }

    #[test]
    fn test_attr_name() {
        let parser = RsrParser::compile("~*req.Account").unwrap();
        assert_eq!(parser.attr_name(), "*req.Account");
        assert_eq!(RsrParser::compile("static").unwrap().attr_name(), "");
    }

    #[test]
    fn test_rule_text() {
        let rules = RsrParsers::compile("a;`b;c`;~d").unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.rule(), "a;`b;c`;~d");
        let again = RsrParsers::compile(&rules.rule()).unwrap();
        assert_eq!(again.parse_value("").unwrap(), rules.parse_value("").unwrap());
    }

    #[test]
    fn test_serde() {
        #[derive(Debug, Deserialize, Serialize)]
        struct Template {
            value: RsrParsers,
        }

        let parsed: Template = serde_json::from_str(r#"{"value": "~H1;|;~H2"}"#).unwrap();
        assert_eq!(parsed.value.len(), 3);
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"value":"~H1;|;~H2"}"#
        );

        let parsed: Template = serde_json::from_str(r#"{"value": ["a;b", "~c"]}"#).unwrap();
        assert_eq!(parsed.value.len(), 2);
        assert_eq!(parsed.value.parse_value("x").unwrap(), "a;bx");

        let err = serde_json::from_str::<Template>(r#"{"value": "~H{*nope}"}"#).unwrap_err();
        assert!(err.to_string().contains("unsupported converter definition"));

        let written = serde_json::to_string(&parsed).unwrap();
        let reread: Template = serde_json::from_str(&written).unwrap();
        assert_eq!(reread.value.rule(), parsed.value.rule());
        assert_eq!(reread.value.parse_value("x").unwrap(), "a;bx");
    }

    #[test]
    fn test_listed_rules_reject_backticks() {
        assert_eq!(
            RsrParsers::from_slice(&["a`b"]).unwrap_err(),
            CompileError::VerbatimInListedRule {
                rule: "a`b".to_string()
            }
        );
        assert!(RsrParsers::from_slice(&["`a`", "b"]).is_err());

        let rules = RsrParsers::from_slice(&["a;b", "~c"]).unwrap();
        let again = RsrParsers::compile(&rules.rule()).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again.rule(), rules.rule());
    }

    #[test]
    fn test_custom_separator() {
        let settings = Settings::default().with_separator("|");
        let rules = RsrParsers::compile_with("~H1|;|~H2", &settings).unwrap();
        let data = json!({"H1": "X", "H2": "Y"});
        assert_eq!(rules.parse_provider(&data).unwrap(), "X;Y");
        assert_eq!(rules.values(&data).unwrap(), vec!["X", ";", "Y"]);
    }

    #[test]
    fn test_parsers_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RsrParsers>();
    }
}
