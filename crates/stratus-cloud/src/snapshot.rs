//! Resource snapshots and path queries over them
//!
//! A snapshot is the JSON document returned by a read call. It is fetched
//! fresh on every poll tick and never modified.

use crate::error::{CloudError, Result};
use serde_json::Value;

/// Remote representation of a resource, job or order at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    document: Value,
}

impl ResourceSnapshot {
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    /// `null`, `{}` and `[]` carry no record
    pub fn is_empty(&self) -> bool {
        match &self.document {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn extract(&self, path: &FieldPath) -> Option<Value> {
        walk(&self.document, &path.segments)
    }

    /// Scalar at `path` rendered as a status string
    pub fn status_at(&self, path: &FieldPath) -> Option<String> {
        match self.extract(path)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// String at `path`, empty strings treated as absent
    pub fn string_at(&self, path: &FieldPath) -> Option<String> {
        self.status_at(path).filter(|s| !s.is_empty())
    }
}

impl From<Value> for ResourceSnapshot {
    fn from(document: Value) -> Self {
        Self::new(document)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// Dotted path expression: `job.status`, `nodes[0].flavor`, `nodes[*].flavor`
///
/// A `[*]` segment projects the rest of the path over every array element and
/// yields an array of the results (elements where the rest is absent are dropped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            CloudError::InvalidRequest(format!("invalid field path '{}': {}", raw, reason))
        };

        if raw.trim().is_empty() {
            return Err(invalid("empty path"));
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(idx) => (&part[..idx], &part[idx..]),
                None => (part, ""),
            };
            if key.is_empty() && (rest.is_empty() || !segments.is_empty()) {
                return Err(invalid("empty segment"));
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unclosed '['"))?;
                let inner = &rest[1..close];
                if inner == "*" {
                    segments.push(Segment::Wildcard);
                } else {
                    let index = inner
                        .parse::<usize>()
                        .map_err(|_| invalid("index must be a non-negative integer or '*'"))?;
                    segments.push(Segment::Index(index));
                }
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected characters after ']'"));
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_projection(&self) -> bool {
        self.segments.contains(&Segment::Wildcard)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = CloudError;

    fn try_from(raw: &str) -> Result<Self> {
        Self::parse(raw)
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn walk(value: &Value, segments: &[Segment]) -> Option<Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match first {
        Segment::Key(key) => walk(value.get(key.as_str())?, rest),
        Segment::Index(index) => walk(value.get(*index)?, rest),
        Segment::Wildcard => {
            let items = value.as_array()?;
            Some(Value::Array(
                items
                    .iter()
                    .filter_map(|item| walk(item, rest))
                    .filter(|v| !v.is_null())
                    .collect(),
            ))
        }
    }
}

/// Expected value of a verified field, compared with the field's natural equality
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl FieldValue {
    /// Strings compare exactly; integers and booleans also accept their string encodings.
    pub fn matches(&self, observed: &Value) -> bool {
        match (self, observed) {
            (FieldValue::Str(expected), Value::String(s)) => expected == s,
            (FieldValue::Int(expected), Value::Number(n)) => n.as_i64() == Some(*expected),
            (FieldValue::Int(expected), Value::String(s)) => {
                s.trim().parse::<i64>().ok() == Some(*expected)
            }
            (FieldValue::Bool(expected), Value::Bool(b)) => expected == b,
            (FieldValue::Bool(expected), Value::String(s)) => {
                s.parse::<bool>().ok() == Some(*expected)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Str(s) => write!(f, "\"{}\"", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> FieldPath {
        FieldPath::parse(raw).unwrap()
    }

    #[test]
    fn test_extract_nested_and_indexed() {
        let snapshot = ResourceSnapshot::new(json!({
            "job": {"status": "Running"},
            "nodes": [{"flavor": "c6.large"}, {"flavor": "c6.xlarge"}],
        }));

        assert_eq!(snapshot.status_at(&path("job.status")), Some("Running".to_string()));
        assert_eq!(
            snapshot.extract(&path("nodes[1].flavor")),
            Some(json!("c6.xlarge"))
        );
        assert_eq!(snapshot.extract(&path("nodes[5].flavor")), None);
        assert_eq!(snapshot.extract(&path("job.missing")), None);
    }

    #[test]
    fn test_projection_collects_elements() {
        let snapshot = ResourceSnapshot::new(json!({
            "groups": [
                {"nodes": [{"spec_code": "a"}, {"spec_code": "a"}]},
                {"nodes": [{"spec_code": "b"}]},
            ]
        }));

        let flavors = path("groups[*].nodes[*].spec_code");
        assert!(flavors.is_projection());
        assert_eq!(
            snapshot.extract(&flavors),
            Some(json!([["a", "a"], ["b"]]))
        );
        assert_eq!(
            snapshot.extract(&path("groups[0].nodes[*].spec_code")),
            Some(json!(["a", "a"]))
        );
    }

    #[test]
    fn test_numeric_status_is_rendered() {
        let snapshot = ResourceSnapshot::new(json!({"order_info": {"status": 5}}));
        assert_eq!(
            snapshot.status_at(&path("order_info.status")),
            Some("5".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for raw in ["", "a..b", "a[", "a[x]", "a[0]b", "a.[0]"] {
            assert!(FieldPath::parse(raw).is_err(), "{} should be rejected", raw);
        }
        assert!(FieldPath::parse("[0].id").is_ok());
    }

    #[test]
    fn test_field_value_natural_equality() {
        assert!(FieldValue::Int(100).matches(&json!(100)));
        assert!(FieldValue::Int(100).matches(&json!("100")));
        assert!(!FieldValue::Int(100).matches(&json!(40)));
        assert!(FieldValue::Str("8".into()).matches(&json!("8")));
        assert!(!FieldValue::Str("8".into()).matches(&json!(8)));
        assert!(FieldValue::Bool(true).matches(&json!("true")));
        assert!(!FieldValue::Bool(true).matches(&json!(null)));
    }

    #[test]
    fn test_empty_snapshots() {
        assert!(ResourceSnapshot::new(json!(null)).is_empty());
        assert!(ResourceSnapshot::new(json!({})).is_empty());
        assert!(!ResourceSnapshot::new(json!({"job": {}})).is_empty());
    }
}
