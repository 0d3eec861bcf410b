//! Output validation against an [`OutputSchema`].
//!
//! One validation function per [`FormatType`], selected by `match`.

use super::entities::{FormatType, OutputSchema, ValidationReport, ValidationStatus};
use super::repair::{extract_json_candidate, repair_json};
use crate::util::estimate_tokens;
use serde_json::Value;

/// Stateless schema validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `output` against `schema`.
    ///
    /// `format` overrides the schema's declared format when given.
    pub fn validate(
        &self,
        output: &str,
        schema: &OutputSchema,
        format: Option<FormatType>,
    ) -> ValidationReport {
        let mut report = match format.unwrap_or(schema.format) {
            FormatType::Json => validate_json(output, schema),
            FormatType::Markdown => validate_markdown(output, schema),
            FormatType::Xml => validate_xml(output, schema),
            FormatType::Text => validate_text(output),
        };

        if let Some(max_tokens) = schema.max_tokens {
            let estimated = estimate_tokens(output);
            if estimated > max_tokens {
                report.push_warning(format!(
                    "Output is ~{} tokens, above the {} token hint",
                    estimated, max_tokens
                ));
            }
        }

        report
    }
}

fn validate_json(output: &str, schema: &OutputSchema) -> ValidationReport {
    let mut report = ValidationReport::valid();

    let Some(candidate) = extract_json_candidate(output) else {
        report.push_error("No JSON object found in output");
        return report;
    };

    let parsed = match serde_json::from_str::<Value>(&candidate) {
        Ok(value) => value,
        Err(first_error) => {
            let (repaired, actions) = repair_json(&candidate);
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) if actions.any() => {
                    report.push_warning(format!(
                        "Repaired malformed JSON ({})",
                        actions.describe()
                    ));
                    value
                }
                _ => {
                    report.result = ValidationStatus::NeedsRepair;
                    report
                        .errors
                        .push(format!("Invalid JSON: {}", first_error));
                    return report;
                }
            }
        }
    };

    let Value::Object(map) = &parsed else {
        report.push_error("Expected a JSON object at the top level");
        return report;
    };

    for field in &schema.required_fields {
        if !map.contains_key(field) {
            report.push_error(format!("Missing required field: {}", field));
        }
    }

    for (field, value) in map {
        let Some(expected) = schema.field_type(field) else {
            continue;
        };
        if !matches_type(value, expected) {
            report.push_error(format!(
                "Field '{}' should be {}, got {}",
                field,
                expected,
                json_type_name(value)
            ));
        }
    }

    report.repaired_output = serde_json::to_string(&parsed).ok();
    report
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected.to_lowercase().as_str() {
        "string" => value.is_string(),
        "number" | "float" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "array" | "list" => value.is_array(),
        "object" => value.is_object(),
        "boolean" | "bool" => value.is_boolean(),
        // Unknown type names are not enforced.
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn validate_markdown(output: &str, schema: &OutputSchema) -> ValidationReport {
    let mut report = ValidationReport::valid();

    let headers: Vec<String> = output
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let level = trimmed.chars().take_while(|c| *c == '#').count();
            if (1..=6).contains(&level) {
                let title = trimmed[level..].trim();
                (!title.is_empty()).then(|| title.trim_end_matches(':').to_lowercase())
            } else {
                None
            }
        })
        .collect();

    for section in &schema.required_fields {
        let wanted = section.to_lowercase();
        if !headers.iter().any(|h| *h == wanted) {
            report.push_error(format!("Missing required section: {}", section));
        }
    }

    report.repaired_output = Some(output.to_string());
    report
}

fn validate_xml(output: &str, schema: &OutputSchema) -> ValidationReport {
    let mut report = ValidationReport::valid();

    for tag in &schema.required_fields {
        let opens = count_open_tags(output, tag);
        let closes = output.matches(&format!("</{}>", tag)).count();

        if opens == 0 && closes == 0 {
            report.push_error(format!("Missing required tag: <{}>", tag));
        } else if opens != closes {
            report.push_error(format!(
                "Unbalanced tag <{}>: {} opening, {} closing",
                tag, opens, closes
            ));
        }
    }

    report.repaired_output = Some(output.to_string());
    report
}

/// Count `<tag>` and `<tag attr=...>` occurrences.
fn count_open_tags(output: &str, tag: &str) -> usize {
    let needle = format!("<{}", tag);
    output
        .match_indices(&needle)
        .filter(|(idx, _)| {
            let rest = &output[idx + needle.len()..];
            matches!(rest.chars().next(), Some('>') | Some(' ') | Some('\t') | Some('\n'))
        })
        .count()
}

fn validate_text(output: &str) -> ValidationReport {
    let mut report = ValidationReport::valid();
    if output.trim().is_empty() {
        report.push_warning("Output is empty");
    }
    report.repaired_output = Some(output.to_string());
    report
}
