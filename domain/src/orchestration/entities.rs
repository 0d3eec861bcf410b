//! Orchestration entities: phases and the run state machine.

use crate::ir::PhaseType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-form context handed to agents.
pub type ContextMap = BTreeMap<String, Value>;

/// Minimum mean confidence a phase needs to stop looping.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.85;

fn default_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

/// A named unit of work executed by one or more agents.
///
/// Created by the planner and not modified once the run starts. A phase
/// deserialized without a `kind` gets one inferred from its name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PhaseRecord")]
pub struct Phase {
    pub name: String,
    pub kind: PhaseType,
    pub agents: Vec<String>,
    pub brief: String,
    pub context: ContextMap,
    pub termination_condition: String,
    pub confidence_threshold: f64,
}

/// Serialized form of [`Phase`] with the optional fields left open.
#[derive(Deserialize)]
struct PhaseRecord {
    name: String,
    #[serde(default)]
    kind: Option<PhaseType>,
    agents: Vec<String>,
    brief: String,
    #[serde(default)]
    context: ContextMap,
    #[serde(default)]
    termination_condition: String,
    #[serde(default = "default_threshold")]
    confidence_threshold: f64,
}

impl From<PhaseRecord> for Phase {
    fn from(record: PhaseRecord) -> Self {
        Self {
            kind: record
                .kind
                .unwrap_or_else(|| PhaseType::infer(&record.name)),
            name: record.name,
            agents: record.agents,
            brief: record.brief,
            context: record.context,
            termination_condition: record.termination_condition,
            confidence_threshold: record.confidence_threshold,
        }
    }
}

impl Phase {
    /// New phase; the kind is inferred from the name.
    pub fn new(
        name: impl Into<String>,
        agents: impl IntoIterator<Item = impl Into<String>>,
        brief: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            kind: PhaseType::infer(&name),
            name,
            agents: agents.into_iter().map(Into::into).collect(),
            brief: brief.into(),
            context: ContextMap::new(),
            termination_condition: String::new(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_kind(mut self, kind: PhaseType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_termination_condition(mut self, condition: impl Into<String>) -> Self {
        self.termination_condition = condition.into();
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }
}

/// Orchestrator state machine.
///
/// ```text
/// INIT → PLAN → EXECUTE_PHASE → SYNTHESIZE → VALIDATE ─┬→ EXECUTE_PHASE
///                                                      └→ SYNTHESIZE → TERMINATE
/// ```
/// `ERROR` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    Init,
    Plan,
    ExecutePhase,
    Synthesize,
    Validate,
    Terminate,
    Error,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Init => "INIT",
            OrchestratorState::Plan => "PLAN",
            OrchestratorState::ExecutePhase => "EXECUTE_PHASE",
            OrchestratorState::Synthesize => "SYNTHESIZE",
            OrchestratorState::Validate => "VALIDATE",
            OrchestratorState::Terminate => "TERMINATE",
            OrchestratorState::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorState::Terminate | OrchestratorState::Error)
    }

    pub fn can_transition_to(&self, next: OrchestratorState) -> bool {
        use OrchestratorState::*;

        if next == Error {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Init, Plan)
                | (Plan, ExecutePhase)
                | (ExecutePhase, Synthesize)
                | (Synthesize, Validate)
                | (Synthesize, Terminate)
                | (Validate, ExecutePhase)
                | (Validate, Synthesize)
        )
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_kind_inferred() {
        let phase = Phase::new("Code Review", ["reviewer"], "Review it");
        assert_eq!(phase.kind, PhaseType::Review);
        assert_eq!(phase.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_phase_deserialize_defaults() {
        let phase: Phase =
            serde_json::from_str(r#"{"name": "Build", "agents": ["implementer"], "brief": "b"}"#)
                .unwrap();
        assert_eq!(phase.confidence_threshold, 0.85);
        assert_eq!(phase.kind, PhaseType::Implementation);
        assert!(phase.context.is_empty());
    }

    #[test]
    fn test_phase_deserialize_infers_missing_kind() {
        let phase: Phase = serde_json::from_str(
            r#"{"name": "Code Review", "agents": ["reviewer"], "brief": "b"}"#,
        )
        .unwrap();
        assert_eq!(phase.kind, PhaseType::Review);

        let explicit: Phase = serde_json::from_str(
            r#"{"name": "Code Review", "kind": "research", "agents": ["reviewer"], "brief": "b"}"#,
        )
        .unwrap();
        assert_eq!(explicit.kind, PhaseType::Research);
    }

    #[test]
    fn test_phase_round_trips_kind() {
        let phase = Phase::new("Notes", ["scribe"], "b").with_kind(PhaseType::Synthesis);
        let json = serde_json::to_string(&phase).unwrap();
        let restored: Phase = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, phase);
    }

    #[test]
    fn test_transitions() {
        use OrchestratorState::*;
        assert!(Init.can_transition_to(Plan));
        assert!(Validate.can_transition_to(ExecutePhase));
        assert!(Validate.can_transition_to(Synthesize));
        assert!(Synthesize.can_transition_to(Terminate));
        assert!(ExecutePhase.can_transition_to(Error));
        assert!(!Init.can_transition_to(ExecutePhase));
        assert!(!Terminate.can_transition_to(Error));
        assert!(!Error.can_transition_to(Plan));
    }

    #[test]
    fn test_state_serializes_screaming() {
        let json = serde_json::to_string(&OrchestratorState::ExecutePhase).unwrap();
        assert_eq!(json, "\"EXECUTE_PHASE\"");
    }
}
