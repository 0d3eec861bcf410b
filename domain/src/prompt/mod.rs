//! Prompt compilation.
//!
//! [`PromptCompiler`] turns a role, a task brief, a [`PromptContext`] and a
//! token budget into provider-ready text. Role templates come from the
//! built-in [`TemplateLibrary`] and may be overridden from configuration.

mod compiler;
mod context;
mod dialect;
mod role_template;

pub use compiler::{
    CompilationRecord, CompiledPrompt, CompilerConfig, PromptCompiler, TRUNCATION_MARKER,
};
pub use context::{
    ContextFile, DEFAULT_MAX_FILES, DEFAULT_MAX_LINES_PER_FILE, DEFAULT_MAX_SUMMARY_LINES,
    PromptContext, PruneLimits, PrunedContext,
};
pub use dialect::PromptDialect;
pub use role_template::{RoleTemplate, TemplateLibrary};
