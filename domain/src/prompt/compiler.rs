//! The prompt compiler: role + task + context + provider + budget → text.

use super::context::{PromptContext, PruneLimits};
use super::dialect::PromptDialect;
use super::role_template::{RoleTemplate, TemplateLibrary};
use crate::core::error::DomainError;
use crate::ir::DEFAULT_TOKEN_BUDGET;
use crate::schema::OutputSchema;
use crate::util::{CHARS_PER_TOKEN, estimate_tokens, truncate_chars};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::info;

pub const TRUNCATION_MARKER: &str = "[... context truncated to fit the token budget ...]";

const CODE_FENCE: &str = "```";

const DEFAULT_ERROR_SHAPE: &str = r#"PAYLOAD: {"error": "<what prevented completion>"}
CONFIDENCE: 0.0
RISK_FLAGS: CRITICAL_TASK_FAILED
RATIONALE: <why the task could not be completed>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    pub limits: PruneLimits,
    pub default_token_budget: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            limits: PruneLimits::default(),
            default_token_budget: DEFAULT_TOKEN_BUDGET,
        }
    }
}

/// Model-ready prompt plus the numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPrompt {
    pub text: String,
    pub role: String,
    pub provider: String,
    pub dialect: PromptDialect,
    pub estimated_tokens: usize,
    pub token_budget: u32,
    /// Token estimate before any context truncation.
    pub original_tokens: usize,
    pub compressed: bool,
    pub output_schema: OutputSchema,
}

impl CompiledPrompt {
    pub fn over_budget(&self) -> bool {
        self.estimated_tokens > self.token_budget as usize
    }
}

/// One line of the compilation log, kept for efficiency comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationRecord {
    pub timestamp: DateTime<Utc>,
    pub role: String,
    pub provider: String,
    pub estimated_tokens: usize,
    pub token_budget: u32,
    pub original_tokens: usize,
    pub compressed: bool,
    pub dropped_files: usize,
}

impl From<&CompiledPrompt> for CompilationRecord {
    fn from(prompt: &CompiledPrompt) -> Self {
        Self {
            timestamp: Utc::now(),
            role: prompt.role.clone(),
            provider: prompt.provider.clone(),
            estimated_tokens: prompt.estimated_tokens,
            token_budget: prompt.token_budget,
            original_tokens: prompt.original_tokens,
            compressed: prompt.compressed,
            dropped_files: 0,
        }
    }
}

/// Balance the code fences of a truncated context section.
///
/// A partial fence left at the cut is dropped; an unclosed block is closed.
fn close_open_fence(kept: &str) -> String {
    let mut kept = kept.to_string();
    if kept.matches(CODE_FENCE).count() % 2 == 1 {
        kept.truncate(kept.trim_end_matches('`').len());
        if kept.matches(CODE_FENCE).count() % 2 == 1 {
            if !kept.ends_with('\n') {
                kept.push('\n');
            }
            kept.push_str(CODE_FENCE);
        }
    }
    kept
}

/// Deterministic prompt builder.
///
/// 1. select the role template (unknown role is an error)
/// 2. prune the context
/// 3. interleave context into the template body
/// 4. wrap in the provider dialect
/// 5. append output requirements, including the error shape
/// 6. enforce the budget by truncating the context section only
pub struct PromptCompiler {
    config: CompilerConfig,
    templates: TemplateLibrary,
    log: RwLock<Vec<CompilationRecord>>,
}

impl PromptCompiler {
    pub fn new(config: CompilerConfig, templates: TemplateLibrary) -> Self {
        Self {
            config,
            templates,
            log: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    /// Compile a prompt. A `token_budget` of zero means the configured default.
    pub fn compile(
        &self,
        role: &str,
        task_brief: &str,
        context: &PromptContext,
        provider: &str,
        token_budget: u32,
    ) -> Result<CompiledPrompt, DomainError> {
        let template = self.templates.get(role)?;
        let budget = if token_budget == 0 {
            self.config.default_token_budget
        } else {
            token_budget
        };

        let pruned = context.prune(&self.config.limits);
        let dialect = PromptDialect::for_provider(provider);
        let requirements = output_requirements(&template.output_schema);
        let render = |context_section: &str| {
            let body = render_body(template, task_brief, context_section);
            format!(
                "{}\n\n{}",
                dialect.wrap(&body, &template.output_schema),
                requirements
            )
        };

        let context_text = pruned.render();
        let mut text = render(&context_text);
        let original_tokens = estimate_tokens(&text);
        let mut compressed = false;

        if original_tokens > budget as usize && !context_text.is_empty() {
            // Everything except the kept context, plus one token for the newline.
            let fixed_tokens = estimate_tokens(&render(TRUNCATION_MARKER)) + 1;
            let available = (budget as usize).saturating_sub(fixed_tokens);
            // Room for "\n```" in case the cut lands inside a fenced block.
            let max_chars = (available * CHARS_PER_TOKEN).saturating_sub(CODE_FENCE.len() + 1);
            let kept = close_open_fence(truncate_chars(&context_text, max_chars));
            let section = if kept.is_empty() {
                TRUNCATION_MARKER.to_string()
            } else {
                format!("{}\n{}", kept, TRUNCATION_MARKER)
            };
            text = render(&section);
            compressed = true;
        }

        let compiled = CompiledPrompt {
            estimated_tokens: estimate_tokens(&text),
            text,
            role: role.to_string(),
            provider: provider.to_string(),
            dialect,
            token_budget: budget,
            original_tokens,
            compressed,
            output_schema: template.output_schema.clone(),
        };

        info!(
            "Compiled prompt role={} provider={} tokens={}/{} compressed={}",
            compiled.role,
            compiled.provider,
            compiled.estimated_tokens,
            compiled.token_budget,
            compiled.compressed
        );

        let record = CompilationRecord {
            dropped_files: pruned.dropped_files,
            ..CompilationRecord::from(&compiled)
        };
        match self.log.write() {
            Ok(mut log) => log.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }

        Ok(compiled)
    }

    pub fn compilation_log(&self) -> Vec<CompilationRecord> {
        match self.log.read() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for PromptCompiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default(), TemplateLibrary::builtin())
    }
}

fn render_body(template: &RoleTemplate, task_brief: &str, context_section: &str) -> String {
    let mut body = format!("# Role: {}\n\n## Goal\n{}\n", template.role, template.goal);

    if !template.constraints.is_empty() {
        body.push_str("\n## Constraints\n");
        for constraint in &template.constraints {
            body.push_str(&format!("- {}\n", constraint));
        }
    }

    body.push_str(&format!("\n## Task\n{}\n", task_brief.trim()));

    if !context_section.is_empty() {
        body.push_str(&format!("\n## Context\n{}\n", context_section));
    }

    body.trim_end().to_string()
}

fn output_requirements(schema: &OutputSchema) -> String {
    let mut out = format!(
        r#"## Output Format
Respond with exactly these labeled sections:
PAYLOAD: <your result as {}>
CONFIDENCE: <a number between 0.0 and 1.0>
RISK_FLAGS: <comma-separated flags, prefix blocking issues with CRITICAL, or none>
RATIONALE: <brief reasoning>
"#,
        schema.format
    );

    if !schema.required_fields.is_empty() {
        out.push_str(&format!(
            "\nThe payload must contain: {}\n",
            schema.required_fields.join(", ")
        ));
    }
    let typed: Vec<String> = schema
        .definition
        .keys()
        .filter_map(|field| {
            schema
                .field_type(field)
                .map(|type_name| format!("{}: {}", field, type_name))
        })
        .collect();
    if !typed.is_empty() {
        out.push_str(&format!("Field types: {}\n", typed.join(", ")));
    }
    if let Some(max_tokens) = schema.max_tokens {
        out.push_str(&format!("Keep the payload under {} tokens.\n", max_tokens));
    }
    if let Some(example) = &schema.example {
        out.push_str(&format!("\nExample payload:\n{}\n", example));
    }

    out.push_str(&format!(
        "\nIf you cannot complete the task, respond with:\n{}",
        schema.error_format.as_deref().unwrap_or(DEFAULT_ERROR_SHAPE)
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::parse_structured_output;

    fn big_context(files: usize, lines: usize) -> PromptContext {
        let content = (0..lines)
            .map(|i| format!("let value_{} = compute_something({});", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let mut ctx = PromptContext::new().with_git_summary("main: 3 files changed");
        for i in 0..files {
            ctx = ctx.with_file(format!("src/file_{}.rs", i), content.clone());
        }
        ctx
    }

    #[test]
    fn test_compile_basic() {
        let compiler = PromptCompiler::default();
        let ctx = PromptContext::new().with_file("src/lib.rs", "pub fn x() {}");
        let prompt = compiler
            .compile("implementer", "Add a y function", &ctx, "echo", 4000)
            .unwrap();

        assert!(prompt.text.starts_with("# Role: implementer"));
        assert!(prompt.text.contains("## Task\nAdd a y function"));
        assert!(prompt.text.contains("### src/lib.rs"));
        assert!(prompt.text.contains("PAYLOAD:"));
        assert!(prompt.text.contains("The payload must contain: summary, changes"));
        assert!(prompt.text.contains("Field types: changes: array, summary: string"));
        assert!(prompt.text.contains("If you cannot complete the task"));
        assert!(!prompt.compressed);
        assert_eq!(prompt.dialect, PromptDialect::Plain);
        assert_eq!(prompt.estimated_tokens, prompt.original_tokens);
    }

    #[test]
    fn test_unknown_role() {
        let compiler = PromptCompiler::default();
        let err = compiler
            .compile("bard", "Sing", &PromptContext::new(), "echo", 1000)
            .unwrap_err();
        assert_eq!(err, DomainError::UnknownRole("bard".to_string()));
        assert!(compiler.compilation_log().is_empty());
    }

    #[test]
    fn test_dialect_applied() {
        let compiler = PromptCompiler::default();
        let prompt = compiler
            .compile("planner", "Plan", &PromptContext::new(), "anthropic", 4000)
            .unwrap();
        assert!(prompt.text.starts_with("<instructions>\n# Role: planner"));
        assert!(prompt.text.contains("</instructions>\n\n## Output Format"));
    }

    #[test]
    fn test_over_budget_truncates_context_only() {
        let compiler = PromptCompiler::default();
        let ctx = big_context(5, 150);
        let prompt = compiler
            .compile("reviewer", "Review the diff", &ctx, "openai", 800)
            .unwrap();

        assert!(prompt.compressed);
        assert!(prompt.original_tokens > 800);
        assert!(prompt.estimated_tokens <= 800);
        assert!(prompt.text.contains(TRUNCATION_MARKER));
        assert!(prompt.text.contains("## Task\nReview the diff"));
        assert!(prompt.text.contains("## Output Format"));
        assert!(prompt.text.contains("JSON schema"));
        assert!(prompt.text.contains("If you cannot complete the task"));
    }

    #[test]
    fn test_truncation_closes_open_fence() {
        let compiler = PromptCompiler::default();
        let ctx = big_context(1, 150);
        let prompt = compiler
            .compile("implementer", "Edit", &ctx, "echo", 700)
            .unwrap();

        assert!(prompt.compressed);
        assert!(prompt.estimated_tokens <= 700);
        assert_eq!(prompt.text.matches(CODE_FENCE).count() % 2, 0);
        assert!(prompt.text.contains(&format!("{}\n{}", CODE_FENCE, TRUNCATION_MARKER)));
    }

    #[test]
    fn test_close_open_fence() {
        assert_eq!(close_open_fence("### a\n```\nfn x()"), "### a\n```\nfn x()\n```");
        assert_eq!(close_open_fence("```\nfn x()\n``"), "```\nfn x()\n```");
        assert_eq!(close_open_fence("```\na\n```\n\n### b\n```"), "```\na\n```\n\n### b\n");
        assert_eq!(close_open_fence("plain text"), "plain text");
    }

    #[test]
    fn test_zero_budget_uses_default() {
        let compiler = PromptCompiler::default();
        let prompt = compiler
            .compile("planner", "Plan", &PromptContext::new(), "echo", 0)
            .unwrap();
        assert_eq!(prompt.token_budget, DEFAULT_TOKEN_BUDGET);
    }

    #[test]
    fn test_compilation_log() {
        let compiler = PromptCompiler::default();
        let ctx = big_context(12, 10);
        compiler.compile("planner", "Plan", &ctx, "echo", 4000).unwrap();
        compiler
            .compile("researcher", "Look", &ctx, "echo", 300)
            .unwrap();

        let log = compiler.compilation_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, "planner");
        assert_eq!(log[0].dropped_files, 2);
        assert!(!log[0].compressed);
        assert!(log[1].compressed);
    }

    #[test]
    fn test_error_shape_parses() {
        let parsed = parse_structured_output(DEFAULT_ERROR_SHAPE);
        assert_eq!(parsed.confidence, 0.0);
        assert_eq!(parsed.risk_flags, vec!["CRITICAL_TASK_FAILED"]);
    }
}
