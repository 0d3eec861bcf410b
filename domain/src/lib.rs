//! Domain layer for concord
//!
//! Pure, synchronous orchestration logic. No I/O and no async runtime.
//!
//! # Core Concepts
//!
//! ## Prompt IR
//!
//! Every agent instruction is first a [`PromptIR`]: role, intent, phase
//! type, context references, constraints, token budget and priority. The
//! [`PromptIRPipeline`] checks it against policy rules, then runs plugins
//! that each produce a new IR plus a hash-linked [`IRTransformation`].
//!
//! ## Compilation and validation
//!
//! The [`PromptCompiler`] renders IR-derived inputs into provider-ready text
//! under a token budget. Replies are read back by
//! [`parse_structured_output`] and checked by the [`SchemaValidator`].
//!
//! ## Governance
//!
//! The [`GovernanceEngine`] gates actions with pattern heuristics and keeps
//! an append-only audit log.
//!
//! ## Orchestration
//!
//! [`Phase`], [`AgentResponse`], [`Decision`] and [`RunLedger`] describe one
//! run; [`PhaseVerdict`] holds the continue/stop rule.

pub mod config;
pub mod core;
pub mod governance;
pub mod ir;
pub mod orchestration;
pub mod output;
pub mod prompt;
pub mod schema;
pub mod util;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use core::error::DomainError;
pub use governance::{
    ActionType, AuditEntry, AuditSummary, GovernanceDecision, GovernanceEngine, GovernanceResult,
    Principle,
};
pub use ir::{
    BudgetOptimizerPlugin, CONTEXT_DIGEST_SENTINEL, ContextDigestPlugin, IRTransformation,
    IrGovernance, IrPlugin, PhaseType, PipelineOutcome, PluginError, PolicyAction, PolicyRule, PolicyRuleChecker,
    PolicyRuleType, PromptIR, PromptIRPipeline,
};
pub use orchestration::{
    entities::{ContextMap, DEFAULT_CONFIDENCE_THRESHOLD, OrchestratorState, Phase},
    plan::default_plan,
    value_objects::{AGENT_FAILURE_FLAG, AgentResponse, Decision, PhaseOutcome, RunLedger},
    verdict::{PhaseVerdict, aggregate_confidence, synthesize_final, synthesize_phase},
};
pub use output::{StructuredOutput, parse_structured_output};
pub use prompt::{
    CompilationRecord, CompiledPrompt, CompilerConfig, PromptCompiler, PromptContext, RoleTemplate,
    TemplateLibrary,
};
pub use schema::{FormatType, OutputSchema, SchemaValidator, ValidationReport, ValidationStatus};
