//! Source field extraction from a JSON log sample.
//!
//! A sample is flattened into its leaf fields so each can be offered as a
//! mapping source. Paths are dotted; when an array's first element is an
//! object, its fields are listed under `name[0]`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Shape of a source value, inferred from the sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceValueKind {
    Null,
    Array,
    #[default]
    String,
    Number,
    Boolean,
}

impl SourceValueKind {
    /// Kind of a JSON value. Objects have no kind; they are descended into.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(SourceValueKind::Null),
            Value::Array(_) => Some(SourceValueKind::Array),
            Value::String(_) => Some(SourceValueKind::String),
            Value::Number(_) => Some(SourceValueKind::Number),
            Value::Bool(_) => Some(SourceValueKind::Boolean),
            Value::Object(_) => None,
        }
    }
}

impl fmt::Display for SourceValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceValueKind::Null => "null",
            SourceValueKind::Array => "array",
            SourceValueKind::String => "string",
            SourceValueKind::Number => "number",
            SourceValueKind::Boolean => "boolean",
        })
    }
}

/// A leaf field found in the sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleField {
    pub path: String,
    pub kind: SourceValueKind,
    pub value: Value,
}

/// Parse a sample and list its leaf fields in document order.
///
/// Invalid JSON is an [`Error::Sample`]. A top level that is not an object
/// yields no fields.
pub fn extract_fields(sample: &str) -> Result<Vec<SampleField>> {
    let value: Value =
        serde_json::from_str(sample).map_err(|e| Error::Sample(e.to_string()))?;

    let mut fields = Vec::new();
    match &value {
        Value::Object(_) => collect(&value, "", &mut fields),
        other => tracing::warn!(
            kind = ?SourceValueKind::of(other),
            "sample is not a JSON object, no fields extracted"
        ),
    }
    Ok(fields)
}

fn collect(value: &Value, prefix: &str, out: &mut Vec<SampleField>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match child {
            Value::Object(_) => collect(child, &path, out),
            Value::Array(items) => {
                out.push(SampleField {
                    path: path.clone(),
                    kind: SourceValueKind::Array,
                    value: child.clone(),
                });
                if let Some(first @ Value::Object(_)) = items.first() {
                    collect(first, &format!("{path}[0]"), out);
                }
            }
            scalar => {
                if let Some(kind) = SourceValueKind::of(scalar) {
                    out.push(SampleField {
                        path,
                        kind,
                        value: scalar.clone(),
                    });
                }
            }
        }
    }
}

/// Kind of the field at `path`, if the sample has one.
pub fn kind_of(fields: &[SampleField], path: &str) -> Option<SourceValueKind> {
    fields.iter().find(|f| f.path == path).map(|f| f.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_objects_in_document_order() {
        let fields = extract_fields(
            r#"{"user": {"name": "alice", "id": 7}, "ok": true, "note": null}"#,
        )
        .unwrap();
        let summary: Vec<_> = fields.iter().map(|f| (f.path.as_str(), f.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("user.name", SourceValueKind::String),
                ("user.id", SourceValueKind::Number),
                ("ok", SourceValueKind::Boolean),
                ("note", SourceValueKind::Null),
            ]
        );
    }

    #[test]
    fn arrays_are_reported_and_first_object_is_descended() {
        let fields = extract_fields(
            r#"{"tags": ["a", "b"], "hits": [{"rule": "r1", "score": 3}, {"rule": "r2"}]}"#,
        )
        .unwrap();
        let paths: Vec<_> = fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["tags", "hits", "hits[0].rule", "hits[0].score"]
        );
        assert_eq!(kind_of(&fields, "tags"), Some(SourceValueKind::Array));
        assert_eq!(kind_of(&fields, "hits[0].score"), Some(SourceValueKind::Number));
    }

    #[test]
    fn invalid_json_is_a_sample_error() {
        let err = extract_fields("{not json").unwrap_err();
        assert!(matches!(err, Error::Sample(_)));
        assert!(err.to_string().starts_with("invalid sample"));
    }

    #[test]
    fn non_object_top_level_yields_nothing() {
        assert!(extract_fields("[1, 2, 3]").unwrap().is_empty());
        assert!(extract_fields("42").unwrap().is_empty());
    }

    #[test]
    fn empty_object_yields_nothing() {
        assert!(extract_fields("{}").unwrap().is_empty());
    }

    #[test]
    fn kind_of_unknown_path() {
        let fields = extract_fields(r#"{"a": 1}"#).unwrap();
        assert_eq!(kind_of(&fields, "b"), None);
    }

    #[test]
    fn kinds_deserialize_from_lowercase() {
        let kind: SourceValueKind = serde_json::from_str("\"number\"").unwrap();
        assert_eq!(kind, SourceValueKind::Number);
        assert_eq!(SourceValueKind::default(), SourceValueKind::String);
    }
}
