//! Prompt IR: the structured, pre-compilation form of one agent instruction.
//!
//! An IR record is built once, then passed through [`PromptIRPipeline`],
//! which optionally checks it against policy rules and runs each plugin.
//! Plugins never mutate in place; every step yields a new IR and an
//! [`IRTransformation`] linking the before/after content hashes.

mod entities;
mod pipeline;
mod plugins;
mod policy;
mod transformation;

pub use entities::{
    DEFAULT_PRIORITY, DEFAULT_TOKEN_BUDGET, IR_SCHEMA_VERSION, MAX_PRIORITY, MIN_PRIORITY,
    PhaseType, PromptIR, PromptIRBuilder,
};
pub use pipeline::{PipelineOutcome, PromptIRPipeline};
pub use plugins::{
    BudgetOptimizerPlugin, CONTEXT_DIGEST_SENTINEL, ContextDigestPlugin,
    DEFAULT_DIGEST_THRESHOLD, IrPlugin, PluginError, Transformed,
};
pub use policy::{
    IrGovernance, PolicyAction, PolicyRule, PolicyRuleChecker, PolicyRuleType, PolicyVerdict,
};
pub use transformation::{IRTransformation, TransformationType, state_hash, verify_chain};
