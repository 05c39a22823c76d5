//! Static record schemas.
//!
//! Each stream declares its record layout once, as a `const` [`StreamSchema`].
//! The JSON Schema published to downstream consumers is generated from that
//! declaration, and every record is checked against it before it is written.

use crate::types::FieldType;
use serde_json::{json, Map, Value};

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema checks.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchemaError {
    /// Record did not serialize to a JSON object
    #[error("Record for stream '{stream}' is not a JSON object")]
    NotAnObject { stream: String },

    /// Required field absent or null
    #[error("Required field '{field}' missing from '{stream}' record")]
    MissingField { stream: String, field: String },

    /// Field present with a value of the wrong type
    #[error("Field '{field}' of '{stream}' record expected {expected}, got {value}")]
    TypeMismatch {
        stream: String,
        field: String,
        expected: FieldType,
        value: String,
    },

    /// Field present in the record but not declared
    #[error("Field '{field}' of '{stream}' record is not declared in the schema")]
    UndeclaredField { stream: String, field: String },
}

// ============================================================================
// Schema Types
// ============================================================================

/// One declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub field_type: FieldType,
    /// Required fields must be present and non-null in every record.
    pub required: bool,
}

impl FieldSchema {
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
        }
    }

    fn to_json_schema(self) -> Value {
        let mut property = Map::new();
        if self.required {
            property.insert("type".into(), json!(self.field_type.json_type()));
        } else {
            property.insert("type".into(), json!([self.field_type.json_type(), "null"]));
        }
        if let Some(format) = self.field_type.json_format() {
            property.insert("format".into(), json!(format));
        }
        Value::Object(property)
    }
}

/// Field-to-type mapping of a stream's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSchema {
    pub stream: &'static str,
    pub fields: &'static [FieldSchema],
}

impl StreamSchema {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Render the schema as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Verify that a serialized record conforms to this schema.
    pub fn check(&self, record: &Value) -> Result<(), SchemaError> {
        let object = record.as_object().ok_or_else(|| SchemaError::NotAnObject {
            stream: self.stream.to_string(),
        })?;

        if let Some(key) = object.keys().find(|key| self.field(key).is_none()) {
            return Err(SchemaError::UndeclaredField {
                stream: self.stream.to_string(),
                field: key.clone(),
            });
        }

        for field in self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(SchemaError::MissingField {
                        stream: self.stream.to_string(),
                        field: field.name.to_string(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.field_type.accepts(value) => {
                    return Err(SchemaError::TypeMismatch {
                        stream: self.stream.to_string(),
                        field: field.name.to_string(),
                        expected: field.field_type,
                        value: value.to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
