//! Offline provider that answers from the prompt itself.
//!
//! [`EchoProvider`] reads the task and output requirements out of a compiled
//! prompt and replies with a well-formed structured answer. It lets the
//! binary run end to end without network access and gives tests a
//! deterministic model.

use async_trait::async_trait;
use concord_application::ports::model_provider::{
    Generation, GenerationRequest, ModelProvider, ProviderError, TokenUsage,
};
use concord_domain::FormatType;
use concord_domain::util::estimate_tokens;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

pub const ECHO_PROVIDER_NAME: &str = "echo";

const DEFAULT_ECHO_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct EchoProvider {
    name: String,
    confidence: f64,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self {
            name: ECHO_PROVIDER_NAME.to_string(),
            confidence: DEFAULT_ECHO_CONFIDENCE,
        }
    }

    /// Register under another name, e.g. to stand in for a real provider.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Confidence reported in every reply, clamped to `[0, 1]`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

impl Default for EchoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for EchoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, ProviderError> {
        let prompt = PromptOutline::read(&request.prompt);
        debug!(
            "Echo reply for role {} as {}",
            prompt.role.as_deref().unwrap_or("unknown"),
            prompt.format
        );

        let text = format!(
            "PAYLOAD: {}\nCONFIDENCE: {:.2}\nRISK_FLAGS: none\nRATIONALE: Echoed from the prompt; no model was called.",
            prompt.payload(),
            self.confidence
        );

        Ok(Generation {
            usage: TokenUsage {
                prompt_tokens: estimate_tokens(&request.prompt) as u32,
                completion_tokens: estimate_tokens(&text) as u32,
            },
            text,
        })
    }
}

// ==================== Prompt Reading ====================

/// The parts of a compiled prompt the echo reply is built from.
#[derive(Debug, Default)]
struct PromptOutline {
    role: Option<String>,
    task: String,
    format: FormatType,
    required: Vec<String>,
    field_types: BTreeMap<String, String>,
    example: Option<String>,
}

impl PromptOutline {
    fn read(prompt: &str) -> Self {
        let mut outline = PromptOutline::default();
        let mut task_lines = Vec::new();
        let mut in_task = false;
        let mut lines = prompt.lines();

        while let Some(line) = lines.next() {
            let trimmed = line.trim();

            if trimmed.starts_with("## ") || trimmed.starts_with(['<', '[']) {
                in_task = trimmed == "## Task";
                continue;
            }
            if in_task {
                // The brief ends at the first blank line after it starts.
                if trimmed.is_empty() && !task_lines.is_empty() {
                    in_task = false;
                } else if !trimmed.is_empty() {
                    task_lines.push(trimmed);
                }
                continue;
            }

            if let Some(role) = trimmed.strip_prefix("# Role:") {
                outline.role = Some(role.trim().to_string());
            } else if let Some(rest) = trimmed.strip_prefix("PAYLOAD: <your result as ") {
                if let Ok(format) = rest.trim_end_matches('>').parse() {
                    outline.format = format;
                }
            } else if let Some(fields) = trimmed.strip_prefix("The payload must contain:") {
                outline.required = split_list(fields).map(str::to_string).collect();
            } else if let Some(types) = trimmed.strip_prefix("Field types:") {
                outline.field_types = split_list(types)
                    .filter_map(|pair| pair.split_once(':'))
                    .map(|(field, ty)| (field.trim().to_string(), ty.trim().to_string()))
                    .collect();
            } else if trimmed == "Example payload:" {
                outline.example = lines.next().map(|l| l.trim().to_string());
            }
        }

        outline.task = task_lines.join(" ");
        outline
    }

    fn payload(&self) -> String {
        if let Some(example) = &self.example {
            return example.clone();
        }

        let task = if self.task.is_empty() {
            "(no task)"
        } else {
            self.task.as_str()
        };

        match self.format {
            FormatType::Json => {
                let object: Map<String, Value> = self
                    .required
                    .iter()
                    .map(|field| {
                        let ty = self.field_types.get(field).map(String::as_str);
                        (field.clone(), placeholder(ty, task))
                    })
                    .collect();
                Value::Object(object).to_string()
            }
            FormatType::Markdown => self
                .required
                .iter()
                .map(|section| format!("## {}\n{}", section, task))
                .collect::<Vec<_>>()
                .join("\n\n"),
            FormatType::Xml => self
                .required
                .iter()
                .map(|tag| format!("<{tag}>{task}</{tag}>"))
                .collect::<Vec<_>>()
                .join("\n"),
            FormatType::Text => format!("Echo: {}", task),
        }
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn placeholder(type_name: Option<&str>, task: &str) -> Value {
    match type_name.map(str::to_lowercase).as_deref() {
        Some("array" | "list") => Value::Array(vec![Value::String(task.to_string())]),
        Some("boolean" | "bool") => Value::Bool(true),
        Some("number" | "float" | "integer") => Value::from(1),
        Some("object") => Value::Object(Map::new()),
        _ => Value::String(task.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::{PromptCompiler, PromptContext, SchemaValidator, parse_structured_output};

    async fn echo_for(role: &str, provider: &str) -> (String, concord_domain::OutputSchema) {
        let compiler = PromptCompiler::default();
        let compiled = compiler
            .compile(
                role,
                "Add retry support to the fetcher",
                &PromptContext::new().with_file("src/fetch.rs", "fn fetch() {}"),
                provider,
                0,
            )
            .unwrap();
        let generation = EchoProvider::new()
            .generate(GenerationRequest {
                prompt: compiled.text,
                model: None,
                temperature: None,
                max_tokens: compiled.token_budget,
            })
            .await
            .unwrap();
        assert!(generation.usage.prompt_tokens > 0);
        (generation.text, compiled.output_schema)
    }

    #[tokio::test]
    async fn test_replies_satisfy_builtin_schemas() {
        for role in ["planner", "researcher", "implementer", "reviewer", "synthesizer"] {
            let (text, schema) = echo_for(role, "echo").await;
            let parsed = parse_structured_output(&text);
            assert_eq!(parsed.confidence, 0.9, "{}", role);
            assert!(parsed.risk_flags.is_empty());

            let report = SchemaValidator::new().validate(&parsed.payload, &schema, None);
            assert!(report.is_valid(), "{}: {:?}", role, report.errors);
        }
    }

    #[tokio::test]
    async fn test_reads_through_dialect_wrapping() {
        for provider in ["anthropic", "openai", "llama"] {
            let (text, schema) = echo_for("implementer", provider).await;
            let parsed = parse_structured_output(&text);
            let report = SchemaValidator::new().validate(&parsed.payload, &schema, None);
            assert!(report.is_valid(), "{}: {:?}", provider, report.errors);
            assert!(parsed.payload.contains("Add retry support"));
        }
    }

    #[test]
    fn test_outline_reads_task_and_fields() {
        let outline = PromptOutline::read(
            "# Role: implementer\n\n## Task\nDo the thing\nquickly\n\n## Output Format\nPAYLOAD: <your result as json>\nThe payload must contain: summary, changes\nField types: changes: array, summary: string\n",
        );
        assert_eq!(outline.role.as_deref(), Some("implementer"));
        assert_eq!(outline.task, "Do the thing quickly");
        assert_eq!(outline.format, FormatType::Json);
        assert_eq!(outline.required, vec!["summary", "changes"]);
        assert_eq!(outline.field_types["changes"], "array");
        assert_eq!(
            outline.payload(),
            r#"{"changes":["Do the thing quickly"],"summary":"Do the thing quickly"}"#
        );
    }

    #[test]
    fn test_custom_name_and_confidence() {
        let provider = EchoProvider::new().with_name("anthropic").with_confidence(1.7);
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.confidence, 1.0);
    }
}
