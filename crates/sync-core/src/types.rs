//! Semantic field types of emitted records.

use serde::{Deserialize, Serialize};

/// Semantic type of a single record field.
///
/// Every field of every stream is declared with one of these. The JSON
/// Schema published in the SCHEMA message is derived from it, so a field's
/// `FieldType` is part of the contract with downstream loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 text
    String,
    /// 64-bit signed integer
    Integer,
    /// true / false
    Boolean,
    /// Calendar date, serialized as `YYYY-MM-DD`
    Date,
}

impl FieldType {
    /// JSON Schema `type` keyword for this field type.
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Date => "string",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
        }
    }

    /// JSON Schema `format` keyword, if the type has one.
    pub fn json_format(&self) -> Option<&'static str> {
        match self {
            FieldType::Date => Some("date"),
            _ => None,
        }
    }

    /// Whether a JSON value is an acceptable non-null encoding of this type.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;

        match (self, value) {
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Date, Value::String(s)) => {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_type_and_format() {
        assert_eq!(FieldType::Date.json_type(), "string");
        assert_eq!(FieldType::Date.json_format(), Some("date"));
        assert_eq!(FieldType::Integer.json_type(), "integer");
        assert_eq!(FieldType::Boolean.json_format(), None);
    }

    #[test]
    fn test_accepts() {
        assert!(FieldType::Integer.accepts(&json!(42)));
        assert!(!FieldType::Integer.accepts(&json!("42")));
        assert!(!FieldType::Integer.accepts(&json!(4.2)));
        assert!(FieldType::Date.accepts(&json!("2021-02-10")));
        assert!(!FieldType::Date.accepts(&json!("10-Feb-2021")));
        assert!(FieldType::Boolean.accepts(&json!(false)));
    }
}
