//! Maps schema type names to the value types the generator reasons about.
//!
//! # Type Mapping Table
//!
//! | Schema type | Value type | Notes |
//! |-------------|-----------|-------|
//! | `string`, `bytes` | `String` | |
//! | `int32`, `int64`, `uint32`, `uint64`, `integer`, `unsigned-integer` | `Integer` | Converted to `integer` |
//! | `float`, `double` | `Float` | Converted to `float` |
//! | `bool`, `boolean` | `Boolean` | |
//! | `timestamp`, `google.protobuf.Timestamp` | `Timestamp` | Parsed with a `date` block |
//! | `enum`, or any field with enum values | `Enum` | Mapped like a string |
//! | Record names, unknown types | none | Falls back to path heuristics |

use std::fmt;

use serde::Serialize;

use crate::stanza::ConvertType;

/// The value type a target field expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Enum,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }

    /// Coercion applied to a numeric source: `float` for float targets,
    /// `integer` for everything else.
    pub fn convert_type(self) -> ConvertType {
        match self {
            ValueType::Float => ConvertType::Float,
            _ => ConvertType::Integer,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::Timestamp => "timestamp",
            ValueType::Enum => "enum",
        })
    }
}

/// Map a declared schema type to a value type.
///
/// Returns `None` for record references and unrecognized types; the caller
/// then falls back to [`infer_type_from_path_heuristics`].
pub fn declared_value_type(type_name: &str, has_enum_values: bool) -> Option<ValueType> {
    if has_enum_values {
        return Some(ValueType::Enum);
    }
    let value_type = match type_name {
        "string" | "bytes" => ValueType::String,

        "int32" | "int64" | "uint32" | "uint64" | "sint32" | "sint64" | "fixed32" | "fixed64"
        | "integer" | "unsigned-integer" => ValueType::Integer,

        "float" | "double" => ValueType::Float,

        "bool" | "boolean" => ValueType::Boolean,

        "timestamp" | "google.protobuf.Timestamp" => ValueType::Timestamp,

        "enum" => ValueType::Enum,

        _ => return None,
    };
    Some(value_type)
}

/// Best-effort value type from the target path text alone.
///
/// Checked in priority order, case-insensitively:
/// 1. `timestamp` / `time` → `Timestamp`
/// 2. `score` / `confidence` → `Float`
/// 3. `port` / `bytes` / `size` → `Integer`
/// 4. anything else → `String`
///
/// Only consulted when the schema does not declare a primitive type for the
/// target field.
pub fn infer_type_from_path_heuristics(path: &str) -> ValueType {
    let lower = path.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["timestamp", "time"]) {
        ValueType::Timestamp
    } else if has(&["score", "confidence"]) {
        ValueType::Float
    } else if has(&["port", "bytes", "size"]) {
        ValueType::Integer
    } else {
        ValueType::String
    }
}
