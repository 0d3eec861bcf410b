//! Governance value objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of action being proposed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CodeExecution,
    NetworkRequest,
    FileDeletion,
    SystemModification,
    FileWrite,
    FileRead,
    SynthesisOutput,
    Other(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::CodeExecution => "code_execution",
            ActionType::NetworkRequest => "network_request",
            ActionType::FileDeletion => "file_deletion",
            ActionType::SystemModification => "system_modification",
            ActionType::FileWrite => "file_write",
            ActionType::FileRead => "file_read",
            ActionType::SynthesisOutput => "synthesis_output",
            ActionType::Other(name) => name,
        }
    }

    /// High-risk actions need a description and sufficient trust.
    pub fn is_high_risk(&self) -> bool {
        matches!(
            self,
            ActionType::CodeExecution
                | ActionType::NetworkRequest
                | ActionType::FileDeletion
                | ActionType::SystemModification
        )
    }

    /// Actions that write to the filesystem and are subject to the
    /// protected-path check.
    pub fn writes_files(&self) -> bool {
        matches!(
            self,
            ActionType::FileWrite | ActionType::FileDeletion | ActionType::SystemModification
        )
    }
}

impl From<&str> for ActionType {
    fn from(s: &str) -> Self {
        match s {
            "code_execution" => ActionType::CodeExecution,
            "network_request" => ActionType::NetworkRequest,
            "file_deletion" => ActionType::FileDeletion,
            "system_modification" => ActionType::SystemModification,
            "file_write" => ActionType::FileWrite,
            "file_read" => ActionType::FileRead,
            "synthesis_output" => ActionType::SynthesisOutput,
            other => ActionType::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four hard-coded principles, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principle {
    HarmPrevention,
    Privacy,
    Transparency,
    HumanSovereignty,
}

impl Principle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Principle::HarmPrevention => "harm_prevention",
            Principle::Privacy => "privacy",
            Principle::Transparency => "transparency",
            Principle::HumanSovereignty => "human_sovereignty",
        }
    }
}

impl std::fmt::Display for Principle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceDecision {
    Approve,
    Deny,
    Flag,
    RequireReview,
}

impl GovernanceDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GovernanceDecision::Approve => "approve",
            GovernanceDecision::Deny => "deny",
            GovernanceDecision::Flag => "flag",
            GovernanceDecision::RequireReview => "require_review",
        }
    }

    /// Whether the action may proceed (possibly with a flag attached).
    pub fn allows_execution(&self) -> bool {
        matches!(self, GovernanceDecision::Approve | GovernanceDecision::Flag)
    }
}

impl std::fmt::Display for GovernanceDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceResult {
    pub decision: GovernanceDecision,
    pub reason: String,
    pub trust_score: f64,
    pub violated_principles: Vec<Principle>,
    pub required_actions: Vec<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl GovernanceResult {
    pub(crate) fn new(decision: GovernanceDecision, reason: impl Into<String>, trust: f64) -> Self {
        Self {
            decision,
            reason: reason.into(),
            trust_score: trust,
            violated_principles: Vec::new(),
            required_actions: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub(crate) fn violating(mut self, principle: Principle) -> Self {
        self.violated_principles.push(principle);
        self
    }

    pub(crate) fn requiring(mut self, action: impl Into<String>) -> Self {
        self.required_actions.push(action.into());
        self
    }

    pub(crate) fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_denied(&self) -> bool {
        self.decision == GovernanceDecision::Deny
    }

    /// Violated principle names, for error messages and ledgers.
    pub fn violation_names(&self) -> Vec<String> {
        self.violated_principles
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }
}

/// Append-only record of one governance evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action_type: ActionType,
    pub decision: GovernanceDecision,
    pub reason: String,
    pub trust_score: f64,
    pub violated_principles: Vec<Principle>,
    /// Context keys supplied with the evaluation (values are not stored).
    pub context_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_risk_set() {
        assert!(ActionType::CodeExecution.is_high_risk());
        assert!(ActionType::NetworkRequest.is_high_risk());
        assert!(ActionType::FileDeletion.is_high_risk());
        assert!(ActionType::SystemModification.is_high_risk());
        assert!(!ActionType::FileWrite.is_high_risk());
        assert!(!ActionType::Other("chat".to_string()).is_high_risk());
    }

    #[test]
    fn test_action_type_from_str_round_trip() {
        for name in ["code_execution", "file_read", "synthesis_output", "custom_tool"] {
            assert_eq!(ActionType::from(name).as_str(), name);
        }
    }

    #[test]
    fn test_decision_allows_execution() {
        assert!(GovernanceDecision::Approve.allows_execution());
        assert!(GovernanceDecision::Flag.allows_execution());
        assert!(!GovernanceDecision::Deny.allows_execution());
        assert!(!GovernanceDecision::RequireReview.allows_execution());
    }

    #[test]
    fn test_decision_serializes_snake_case() {
        let json = serde_json::to_string(&GovernanceDecision::RequireReview).unwrap();
        assert_eq!(json, "\"require_review\"");
    }
}
