//! Schema value objects

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Output format an agent is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    Json,
    Markdown,
    Xml,
    #[default]
    Text,
}

impl FormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatType::Json => "json",
            FormatType::Markdown => "markdown",
            FormatType::Xml => "xml",
            FormatType::Text => "text",
        }
    }
}

impl FromStr for FormatType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(FormatType::Json),
            "markdown" | "md" => Ok(FormatType::Markdown),
            "xml" | "tags" => Ok(FormatType::Xml),
            "text" | "plain" => Ok(FormatType::Text),
            other => Err(DomainError::UnknownFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for FormatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declared output contract for a role.
///
/// `required_fields` means object keys for JSON, section headers for
/// Markdown and tag names for XML. `definition` maps JSON field names to a
/// primitive type name (`"string"`, `"number"`, `"array"`, `"object"`,
/// `"boolean"`), either directly or as `{"type": "..."}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSchema {
    pub format: FormatType,
    pub required_fields: Vec<String>,
    pub definition: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_format: Option<String>,
}

impl OutputSchema {
    pub fn new(format: FormatType) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn with_required(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declare a field's primitive type. Does not make it required.
    pub fn with_field_type(mut self, field: impl Into<String>, type_name: &str) -> Self {
        self.definition
            .insert(field.into(), Value::String(type_name.to_string()));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn with_error_format(mut self, template: impl Into<String>) -> Self {
        self.error_format = Some(template.into());
        self
    }

    /// Declared type name for `field`, if any.
    pub fn field_type(&self, field: &str) -> Option<&str> {
        match self.definition.get(field)? {
            Value::String(name) => Some(name.as_str()),
            Value::Object(map) => map.get("type").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Outcome class of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    /// Output looked like the right format but could not be parsed even
    /// after automatic repair; a re-prompt is needed.
    NeedsRepair,
}

/// Result of validating one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub result: ValidationStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Normalized output (compact JSON for the JSON path).
    pub repaired_output: Option<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            result: ValidationStatus::Valid,
            errors: Vec::new(),
            warnings: Vec::new(),
            repaired_output: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.result == ValidationStatus::Valid
    }

    pub(crate) fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        if self.result == ValidationStatus::Valid {
            self.result = ValidationStatus::Invalid;
        }
    }

    pub(crate) fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<FormatType>().unwrap(), FormatType::Json);
        assert_eq!("md".parse::<FormatType>().unwrap(), FormatType::Markdown);
        assert!("yaml".parse::<FormatType>().is_err());
    }

    #[test]
    fn test_field_type_accepts_both_shapes() {
        let mut schema = OutputSchema::new(FormatType::Json).with_field_type("a", "number");
        schema
            .definition
            .insert("b".to_string(), serde_json::json!({"type": "array"}));
        assert_eq!(schema.field_type("a"), Some("number"));
        assert_eq!(schema.field_type("b"), Some("array"));
        assert_eq!(schema.field_type("c"), None);
    }

    #[test]
    fn test_schema_deserializes_from_toml_shape() {
        let schema: OutputSchema = serde_json::from_value(serde_json::json!({
            "format": "markdown",
            "required_fields": ["Summary", "Risks"]
        }))
        .unwrap();
        assert_eq!(schema.format, FormatType::Markdown);
        assert_eq!(schema.required_fields.len(), 2);
        assert!(schema.max_tokens.is_none());
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&ValidationStatus::NeedsRepair).unwrap();
        assert_eq!(json, "\"NEEDS_REPAIR\"");
    }
}
