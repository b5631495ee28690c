//! The validator (§4.9): compiles a generation schema once with the
//! `jsonschema` crate, in the style of `connector_proxy`'s
//! `jsonschema::JSONSchema::options().compile(...)` / `.validate(...)`
//! pairing, and layers a streaming uniqueness check for the configured key
//! field on top (draft-07 has no native single-field uniqueness keyword).

use crate::error::Error;
use serde_json::Value;
use std::collections::HashSet;

pub struct Validator {
    compiled: jsonschema::JSONSchema,
    key_field: String,
    seen_keys: HashSet<String>,
}

/// A single schema violation, addressed by the JSON-pointer path of the
/// offending instance value (§4.9 "a structured error list with
/// JSON-pointer-style paths").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

/// One document's validation outcome: schema errors and/or a duplicate key.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub schema_errors: Vec<SchemaError>,
    pub duplicate_key: Option<String>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.schema_errors.is_empty() && self.duplicate_key.is_none()
    }
}

impl Validator {
    pub fn compile(schema: &Value, key_field: impl Into<String>) -> Result<Self, Error> {
        let compiled = jsonschema::JSONSchema::options()
            .compile(schema)
            .map_err(|e| Error::Validation(e.to_string()))?;
        Ok(Validator {
            compiled,
            key_field: key_field.into(),
            seen_keys: HashSet::new(),
        })
    }

    pub fn validate_one(&mut self, doc: &Value) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        if let Err(errors) = self.compiled.validate(doc) {
            outcome.schema_errors = errors
                .map(|e| SchemaError {
                    path: e.instance_path.to_string(),
                    message: e.to_string(),
                })
                .collect();
        }
        if let Some(key) = doc.get(&self.key_field).and_then(Value::as_str) {
            if !self.seen_keys.insert(key.to_string()) {
                outcome.duplicate_key = Some(key.to_string());
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "_id": {"type": "string", "format": "objectid"},
                "age": {"type": "integer", "minimum": 0.0, "maximum": 120.0},
            },
            "required": ["_id", "age"],
            "additionalProperties": false,
        })
    }

    #[test]
    fn valid_document_passes() {
        let mut validator = Validator::compile(&schema(), "_id").unwrap();
        let outcome = validator.validate_one(&json!({"_id": "a", "age": 30}));
        assert!(outcome.is_valid());
    }

    #[test]
    fn schema_violation_is_reported() {
        let mut validator = Validator::compile(&schema(), "_id").unwrap();
        let outcome = validator.validate_one(&json!({"_id": "a", "age": "thirty"}));
        assert!(!outcome.schema_errors.is_empty());
        assert_eq!(outcome.schema_errors[0].path, "/age");
    }

    #[test]
    fn repeated_key_field_value_is_flagged_as_duplicate() {
        let mut validator = Validator::compile(&schema(), "_id").unwrap();
        assert!(validator.validate_one(&json!({"_id": "a", "age": 1})).duplicate_key.is_none());
        let outcome = validator.validate_one(&json!({"_id": "a", "age": 2}));
        assert_eq!(outcome.duplicate_key.as_deref(), Some("a"));
    }
}
