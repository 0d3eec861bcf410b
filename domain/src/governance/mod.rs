//! Governance: pre-execution policy gating.
//!
//! [`GovernanceEngine`] evaluates a proposed action against four hard-coded
//! principles and appends one [`AuditEntry`] per evaluation.
//!
//! # Known limitation
//!
//! Detection is regex heuristics over the serialized action details. It is
//! not a security boundary: obfuscated input (encoded commands, string
//! concatenation, unusual whitespace) will slip through. A result of
//! [`GovernanceDecision::Approve`] means "no pattern matched", nothing more.

mod engine;
mod entities;
pub mod patterns;

pub use engine::{AuditSummary, GovernanceEngine};
pub use entities::{
    ActionType, AuditEntry, GovernanceDecision, GovernanceResult, Principle,
};
