//! Orchestration value objects: agent responses, decisions and the run ledger.
//!
//! - [`AgentResponse`] - one agent invocation's result
//! - [`Decision`] - append-only audit record of a transition or choice
//! - [`PhaseOutcome`] - the verdict of one phase execution
//! - [`RunLedger`] - the complete record of one run

use super::entities::{OrchestratorState, Phase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Risk flag attached to the synthetic response of a failed agent call.
pub const AGENT_FAILURE_FLAG: &str = "CRITICAL_AGENT_FAILURE";

/// Prefix marking a risk flag as blocking.
pub const CRITICAL_PREFIX: &str = "CRITICAL";

/// Result of one agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: String,
    pub role: String,
    pub output: String,
    pub confidence: f64,
    pub risk_flags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Index of the planned phase that produced this response.
    #[serde(default)]
    pub phase: usize,
}

impl AgentResponse {
    /// New response; confidence is clamped to `[0, 1]` and NaN becomes 0.
    pub fn new(
        agent: impl Into<String>,
        role: impl Into<String>,
        output: impl Into<String>,
        confidence: f64,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            agent: agent.into(),
            role: role.into(),
            output: output.into(),
            confidence,
            risk_flags: BTreeSet::new(),
            metadata: BTreeMap::new(),
            phase: 0,
        }
    }

    /// Synthetic response standing in for an agent call that failed.
    pub fn failure(agent: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(agent, "error", format!("Agent failed: {}", error), 0.0)
            .with_flag(AGENT_FAILURE_FLAG)
            .with_metadata("error", Value::String(error))
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        let flag = flag.into();
        if !flag.trim().is_empty() {
            self.risk_flags.insert(flag);
        }
        self
    }

    pub fn with_flags(self, flags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        flags.into_iter().fold(self, |r, f| r.with_flag(f))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn in_phase(mut self, phase: usize) -> Self {
        self.phase = phase;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.role == "error"
    }

    pub fn critical_flags(&self) -> impl Iterator<Item = &str> {
        self.risk_flags
            .iter()
            .map(String::as_str)
            .filter(|f| f.starts_with(CRITICAL_PREFIX))
    }
}

/// Audit record of a state transition or consequential choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub timestamp: DateTime<Utc>,
    pub state: OrchestratorState,
    pub action: String,
    pub reason: String,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

impl Decision {
    pub fn new(
        state: OrchestratorState,
        action: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            state,
            action: action.into(),
            reason: reason.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Verdict and synthesis of one phase execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase_index: usize,
    pub name: String,
    pub iteration: u32,
    pub mean_confidence: f64,
    pub critical_flags: Vec<String>,
    pub should_continue: bool,
    pub response_count: usize,
    pub synthesis: String,
}

/// Complete, serializable record of one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLedger {
    pub run_id: String,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub phases: Vec<Phase>,
    pub responses: Vec<AgentResponse>,
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub phase_outcomes: Vec<PhaseOutcome>,
    pub final_output: Option<String>,
    pub aggregate_confidence: f64,
    pub state: OrchestratorState,
}

impl RunLedger {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            task: task.into(),
            started_at: Utc::now(),
            completed_at: None,
            phases: Vec::new(),
            responses: Vec::new(),
            decisions: Vec::new(),
            phase_outcomes: Vec::new(),
            final_output: None,
            aggregate_confidence: 0.0,
            state: OrchestratorState::Init,
        }
    }

    /// Responses produced by the planned phase at `index`, across iterations.
    pub fn responses_for_phase(&self, index: usize) -> Vec<&AgentResponse> {
        self.responses.iter().filter(|r| r.phase == index).collect()
    }

    pub fn decisions_with_action(&self, action: &str) -> Vec<&Decision> {
        self.decisions.iter().filter(|d| d.action == action).collect()
    }

    /// Number of phase executions, counting refinement iterations.
    pub fn executions(&self) -> usize {
        self.phase_outcomes.len()
    }

    pub fn is_success(&self) -> bool {
        self.state == OrchestratorState::Terminate
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
