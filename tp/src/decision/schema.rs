//! Decision schemas - the shape a structured model answer must have

use serde_json::Value;

use super::DecisionError;

/// JSON type of a required field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Array,
    Object,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Bool => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

/// Required top-level fields of a decision
#[derive(Debug, Clone)]
pub struct DecisionSchema {
    name: String,
    fields: Vec<(String, FieldKind)>,
    example: Value,
}

impl DecisionSchema {
    pub fn new(name: impl Into<String>, example: Value) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            example,
        }
    }

    pub fn require(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((field.into(), kind));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check a parsed answer against the required fields
    pub fn check(&self, value: &Value) -> Result<(), DecisionError> {
        let object = value.as_object().ok_or_else(|| {
            DecisionError::SchemaViolation(format!("{}: expected a JSON object", self.name))
        })?;
        for (field, kind) in &self.fields {
            match object.get(field) {
                Some(v) if kind.matches(v) => {}
                Some(_) => {
                    return Err(DecisionError::SchemaViolation(format!(
                        "{}: field '{}' must be a {}",
                        self.name,
                        field,
                        kind.as_str()
                    )));
                }
                None => {
                    return Err(DecisionError::SchemaViolation(format!(
                        "{}: missing field '{}'",
                        self.name, field
                    )));
                }
            }
        }
        Ok(())
    }

    /// Output-format instructions appended to the system prompt
    pub fn instructions(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|(f, k)| format!("\"{}\" ({})", f, k.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Respond with a single JSON object only, no prose. Required fields: {}.\nExample:\n{}",
            fields,
            serde_json::to_string_pretty(&self.example).unwrap_or_default()
        )
    }
}
