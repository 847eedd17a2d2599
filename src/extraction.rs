//! Path-addressable data sources for rule evaluation.
//!
//! Dynamic rules reference their input with a dotted path such as
//! `~*req.Account` or `~*req.Multiple[1]`. The rule compiler turns that text
//! into a [`FieldPath`], and evaluation asks a [`DataProvider`] for the value
//! at that path.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Delimiter between the segments of a field path.
pub const PATH_DELIMITER: &str = ".";

/// A parsed path to a field in structured data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// The path as written, without the leading `~`
    pub raw: String,
    pub segments: Vec<PathSegment>,
}

/// A segment in a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A named field (e.g., "*req", "Account")
    Field(String),
    /// An array index (e.g., [0], [5])
    Index(usize),
}

impl FieldPath {
    /// Parse a field path with a given delimiter.
    ///
    /// Indexes may be written as their own segment (`items.[0].name`) or
    /// attached to a field (`items[0].name`); both parse to the same
    /// segments. Anything that does not look like a numeric index stays part
    /// of the field name.
    ///
    /// ```
    /// use rsrconf::extraction::{FieldPath, PathSegment};
    ///
    /// let path = FieldPath::parse("*req.Multiple[1]", ".");
    /// assert_eq!(path.segments, vec![
    ///     PathSegment::Field("*req".to_string()),
    ///     PathSegment::Field("Multiple".to_string()),
    ///     PathSegment::Index(1),
    /// ]);
    /// ```
    pub fn parse(path: &str, delimiter: &str) -> Self {
        let mut segments = Vec::new();
        for part in path.split(delimiter).filter(|s| !s.is_empty()) {
            push_segments(part, &mut segments);
        }

        Self {
            raw: path.to_string(),
            segments,
        }
    }

    /// Create a field path from a dotted string
    pub fn from_dotted(path: &str) -> Self {
        Self::parse(path, PATH_DELIMITER)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Split `name[1][2]` into a field followed by its indexes.
fn push_segments(part: &str, segments: &mut Vec<PathSegment>) {
    let mut name = part;
    let mut indexes = Vec::new();
    while name.ends_with(']') {
        let Some(open) = name.rfind('[') else {
            break;
        };
        match name[open + 1..name.len() - 1].parse::<usize>() {
            Ok(index) => {
                indexes.push(index);
                name = &name[..open];
            }
            Err(_) => break,
        }
    }

    if !name.is_empty() {
        segments.push(PathSegment::Field(name.to_string()));
    }
    segments.extend(indexes.into_iter().rev().map(PathSegment::Index));
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Source of field values for dynamic rules.
///
/// Implemented for JSON values and flat string maps; events coming from
/// other formats implement it the same way.
pub trait DataProvider {
    /// Extract the value at the given field path, rendered as a string.
    ///
    /// Returns `None` if the path does not exist
    fn extract(&self, path: &FieldPath) -> Option<String>;
}

impl<P: DataProvider + ?Sized> DataProvider for &P {
    fn extract(&self, path: &FieldPath) -> Option<String> {
        (**self).extract(path)
    }
}

impl DataProvider for Value {
    fn extract(&self, path: &FieldPath) -> Option<String> {
        let mut current = self;
        for segment in &path.segments {
            current = match (segment, current) {
                (PathSegment::Field(name), Value::Object(map)) => map.get(name)?,
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(render_value(current))
    }
}

impl DataProvider for Map<String, Value> {
    fn extract(&self, path: &FieldPath) -> Option<String> {
        let (first, rest) = path.segments.split_first()?;
        let PathSegment::Field(name) = first else {
            return None;
        };
        let value = self.get(name)?;
        value.extract(&FieldPath {
            raw: path.raw.clone(),
            segments: rest.to_vec(),
        })
    }
}

impl DataProvider for HashMap<String, String> {
    fn extract(&self, path: &FieldPath) -> Option<String> {
        self.get(&path.raw).cloned()
    }
}

impl DataProvider for IndexMap<String, String> {
    fn extract(&self, path: &FieldPath) -> Option<String> {
        self.get(&path.raw).cloned()
    }
}

/// Render a JSON value the way rules see it: strings without quotes, `null`
/// as the empty string, everything else as JSON text.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_path_parse() {
        let path = FieldPath::parse("user.address.city", ".");

        assert_eq!(path.segments.len(), 3);
        assert_eq!(path.segments[0], PathSegment::Field("user".to_string()));
        assert_eq!(path.segments[1], PathSegment::Field("address".to_string()));
        assert_eq!(path.segments[2], PathSegment::Field("city".to_string()));
    }

    #[test]
    fn test_field_path_with_index() {
        let detached = FieldPath::parse("items.[0].name", ".");
        let attached = FieldPath::parse("items[0].name", ".");

        assert_eq!(detached.segments, attached.segments);
        assert_eq!(detached.segments[1], PathSegment::Index(0));
    }

    #[test]
    fn test_field_path_nested_indexes_and_odd_brackets() {
        let path = FieldPath::from_dotted("grid[1][2]");
        assert_eq!(
            path.segments,
            vec![
                PathSegment::Field("grid".to_string()),
                PathSegment::Index(1),
                PathSegment::Index(2),
            ]
        );

        let path = FieldPath::from_dotted("weird[x]");
        assert_eq!(path.segments, vec![PathSegment::Field("weird[x]".to_string())]);
    }

    #[test]
    fn test_json_provider() {
        let event = json!({
            "*req": {
                "Account": 1001,
                "Subject": "dan",
                "Usage": null,
                "Multiple": ["a", "b"],
                "Rated": true,
                "Cost": 1.5,
                "Details": {"Dest": "Canada"},
            }
        });

        let get = |p: &str| event.extract(&FieldPath::from_dotted(p));
        assert_eq!(get("*req.Account").as_deref(), Some("1001"));
        assert_eq!(get("*req.Subject").as_deref(), Some("dan"));
        assert_eq!(get("*req.Usage").as_deref(), Some(""));
        assert_eq!(get("*req.Multiple[1]").as_deref(), Some("b"));
        assert_eq!(get("*req.Rated").as_deref(), Some("true"));
        assert_eq!(get("*req.Cost").as_deref(), Some("1.5"));
        assert_eq!(get("*req.Details").as_deref(), Some(r#"{"Dest":"Canada"}"#));
        assert_eq!(get("*req.Missing"), None);
        assert_eq!(get("*req.Multiple[5]"), None);
    }

    #[test]
    fn test_map_providers() {
        let mut data = HashMap::new();
        data.insert("Header1".to_string(), "a10".to_string());
        assert_eq!(data.extract(&FieldPath::from_dotted("Header1")).as_deref(), Some("a10"));
        assert_eq!(data.extract(&FieldPath::from_dotted("Header2")), None);

        let mut ordered = IndexMap::new();
        ordered.insert("*req.Account".to_string(), "1001".to_string());
        assert_eq!(
            ordered.extract(&FieldPath::from_dotted("*req.Account")).as_deref(),
            Some("1001")
        );

        let object = json!({"H1": "X"});
        let map = object.as_object().unwrap();
        assert_eq!(map.extract(&FieldPath::from_dotted("H1")).as_deref(), Some("X"));
    }
}
