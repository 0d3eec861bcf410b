//! Provider-specific prompt framing.

use crate::schema::{FormatType, OutputSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// How a provider family prefers its instructions framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptDialect {
    /// `<instructions>...</instructions>`
    TagWrapped,
    /// Body followed by a JSON schema for the payload.
    JsonSchemaSuffixed,
    /// `[INST] ... [/INST]`
    InstructionTagged,
    Plain,
}

impl PromptDialect {
    pub fn for_provider(provider: &str) -> Self {
        let provider = provider.to_lowercase();
        if ["anthropic", "claude", "bedrock"]
            .iter()
            .any(|p| provider.contains(p))
        {
            PromptDialect::TagWrapped
        } else if ["openai", "gpt", "azure"].iter().any(|p| provider.contains(p)) {
            PromptDialect::JsonSchemaSuffixed
        } else if ["gemini", "llama", "mistral", "ollama"]
            .iter()
            .any(|p| provider.contains(p))
        {
            PromptDialect::InstructionTagged
        } else {
            PromptDialect::Plain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptDialect::TagWrapped => "tag_wrapped",
            PromptDialect::JsonSchemaSuffixed => "json_schema_suffixed",
            PromptDialect::InstructionTagged => "instruction_tagged",
            PromptDialect::Plain => "plain",
        }
    }

    pub fn wrap(&self, body: &str, schema: &OutputSchema) -> String {
        match self {
            PromptDialect::TagWrapped => format!("<instructions>\n{}\n</instructions>", body),
            PromptDialect::JsonSchemaSuffixed => match json_schema(schema) {
                Some(schema) => format!(
                    "{}\n\nThe PAYLOAD must conform to this JSON schema:\n{}",
                    body, schema
                ),
                None => body.to_string(),
            },
            PromptDialect::InstructionTagged => format!("[INST]\n{}\n[/INST]", body),
            PromptDialect::Plain => body.to_string(),
        }
    }
}

/// JSON-schema rendering of a JSON output contract; `None` for other formats.
fn json_schema(schema: &OutputSchema) -> Option<String> {
    if schema.format != FormatType::Json {
        return None;
    }
    let mut properties = Map::new();
    for field in schema.definition.keys().chain(schema.required_fields.iter()) {
        let type_name = schema.field_type(field).unwrap_or("string");
        properties.insert(field.clone(), json!({ "type": type_name }));
    }
    let rendered = json!({
        "type": "object",
        "required": schema.required_fields,
        "properties": Value::Object(properties),
    });
    serde_json::to_string_pretty(&rendered).ok()
}
