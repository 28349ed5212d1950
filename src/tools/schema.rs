//! Input shape declarations for registered tools.
//!
//! A shape is declared once per tool, rendered to JSON Schema for
//! `tools/list` discovery, and enforced against every `tools/call` argument
//! object before the executor runs. Unknown argument keys are ignored.

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Validation failure for a `tools/call` argument object.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Arguments were not a JSON object.
    #[error("arguments must be a JSON object")]
    NotAnObject,
    /// A required argument was absent.
    #[error("missing required argument '{name}'")]
    MissingRequired { name: String },
    /// An argument had the wrong JSON type.
    #[error("argument '{name}' must be {expected}")]
    WrongType { name: String, expected: &'static str },
    /// A string argument was outside its allowed value set.
    #[error("argument '{name}' must be one of {allowed:?}, got '{value}'")]
    NotAllowed {
        name: String,
        allowed: &'static [&'static str],
        value: String,
    },
}

/// The JSON type a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A string, optionally restricted to a fixed value set.
    String {
        allowed: Option<&'static [&'static str]>,
    },
    /// An integer. Integral floats (`10.0`) are rejected.
    Integer,
}

/// One named field of an input shape.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: &'static str,
    description: &'static str,
    required: bool,
    kind: FieldKind,
}

impl FieldSpec {
    /// Declare an optional string field.
    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: FieldKind::String { allowed: None },
        }
    }

    /// Declare an optional integer field.
    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: FieldKind::Integer,
        }
    }

    /// Restrict a string field to a fixed value set.
    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.kind = FieldKind::String {
            allowed: Some(allowed),
        };
        self
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn json_schema(&self) -> Value {
        match self.kind {
            FieldKind::String { allowed } => {
                let mut property = Map::new();
                property.insert("type".to_string(), json!("string"));
                if let Some(allowed) = allowed {
                    property.insert("enum".to_string(), json!(allowed));
                }
                property.insert("description".to_string(), json!(self.description));
                Value::Object(property)
            }
            FieldKind::Integer => json!({
                "type": "integer",
                "description": self.description,
            }),
        }
    }

    fn validate(&self, value: &Value) -> Result<(), ShapeError> {
        match self.kind {
            FieldKind::String { allowed } => {
                let text = value.as_str().ok_or_else(|| ShapeError::WrongType {
                    name: self.name.to_string(),
                    expected: "a string",
                })?;
                if let Some(allowed) = allowed {
                    if !allowed.contains(&text) {
                        return Err(ShapeError::NotAllowed {
                            name: self.name.to_string(),
                            allowed,
                            value: text.to_string(),
                        });
                    }
                }
                Ok(())
            }
            FieldKind::Integer => {
                if value.as_i64().is_none() {
                    return Err(ShapeError::WrongType {
                        name: self.name.to_string(),
                        expected: "an integer",
                    });
                }
                Ok(())
            }
        }
    }
}

/// Declared argument shape of one tool.
#[derive(Debug, Clone, Default)]
pub struct InputShape {
    fields: Vec<FieldSpec>,
}

impl InputShape {
    /// An empty shape (tool takes no arguments).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field declaration.
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Render the shape as a JSON Schema object for `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.to_string(), field.json_schema());
            if field.required {
                required.push(field.name);
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
        Value::Object(schema)
    }

    /// Check an argument object against the shape.
    pub fn validate(&self, arguments: &Value) -> Result<(), ShapeError> {
        let object = arguments.as_object().ok_or(ShapeError::NotAnObject)?;
        for field in &self.fields {
            match object.get(field.name) {
                Some(value) => field.validate(value)?,
                None if field.required => {
                    return Err(ShapeError::MissingRequired {
                        name: field.name.to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(())
    }
}
