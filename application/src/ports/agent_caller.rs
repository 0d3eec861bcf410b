//! Agent-call port
//!
//! Defines how the orchestrator invokes one agent. Adapters may return a full
//! [`AgentResponse`], a raw JSON map with the four structured-output fields,
//! or raw text; [`AgentReply::into_response`] normalizes all three.

use async_trait::async_trait;
use concord_domain::output::{DEFAULT_CONFIDENCE, parse_confidence, parse_risk_flags};
use concord_domain::{AgentResponse, ContextMap, DomainError, parse_structured_output};
use serde_json::{Map, Value};
use thiserror::Error;

use super::model_provider::ProviderError;

/// Errors an agent call can fail with.
///
/// The orchestrator never propagates these; each becomes a critical-flagged
/// synthetic response for the failing agent.
#[derive(Error, Debug)]
pub enum AgentCallError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Invalid instruction for {agent}: {source}")]
    InvalidInstruction {
        agent: String,
        #[source]
        source: DomainError,
    },

    #[error("Governance denied {agent}: {}", violations.join("; "))]
    GovernanceDenied {
        agent: String,
        violations: Vec<String>,
    },

    #[error("Prompt compilation failed: {0}")]
    Compilation(DomainError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Agent error: {0}")]
    Other(String),
}

/// What an agent call may hand back.
#[derive(Debug, Clone)]
pub enum AgentReply {
    Response(AgentResponse),
    /// `payload`, `confidence`, `risk_flags`, `rationale` (and optionally `role`).
    Structured(Map<String, Value>),
    /// Free text in the labeled-section format.
    Text(String),
}

impl AgentReply {
    /// Normalize into an [`AgentResponse`]. `agent` names the responder.
    pub fn into_response(self, agent: &str) -> AgentResponse {
        match self {
            AgentReply::Response(response) => response,
            AgentReply::Structured(map) => from_map(agent, &map),
            AgentReply::Text(text) => {
                let parsed = parse_structured_output(&text);
                AgentResponse::new(agent, agent, parsed.payload, parsed.confidence)
                    .with_flags(parsed.risk_flags)
                    .with_metadata("rationale", parsed.rationale)
            }
        }
    }
}

impl From<AgentResponse> for AgentReply {
    fn from(response: AgentResponse) -> Self {
        AgentReply::Response(response)
    }
}

fn from_map(agent: &str, map: &Map<String, Value>) -> AgentResponse {
    let payload = match map.get("payload") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let confidence = match map.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_CONFIDENCE),
        Some(Value::String(s)) => parse_confidence(s),
        _ => DEFAULT_CONFIDENCE,
    };
    let flags: Vec<String> = match map.get("risk_flags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .flat_map(parse_risk_flags)
            .collect(),
        Some(Value::String(s)) => parse_risk_flags(s),
        _ => Vec::new(),
    };
    let role = map.get("role").and_then(Value::as_str).unwrap_or(agent);
    let rationale = map
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or_default();

    AgentResponse::new(agent, role, payload, confidence)
        .with_flags(flags)
        .with_metadata("rationale", rationale)
}

/// Invokes one agent with a phase brief and the shared read-only context.
#[async_trait]
pub trait AgentCaller: Send + Sync {
    async fn call(
        &self,
        agent: &str,
        brief: &str,
        context: &ContextMap,
    ) -> Result<AgentReply, AgentCallError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_reply_is_parsed() {
        let reply = AgentReply::Text(
            "PAYLOAD: done\nCONFIDENCE: 0.8\nRISK_FLAGS: none\nRATIONALE: easy".to_string(),
        );
        let response = reply.into_response("implementer");
        assert_eq!(response.output, "done");
        assert_eq!(response.confidence, 0.8);
        assert!(response.risk_flags.is_empty());
        assert_eq!(response.metadata["rationale"], "easy");
    }

    #[test]
    fn test_structured_reply() {
        let map = json!({
            "payload": {"summary": "ok"},
            "confidence": 1.4,
            "risk_flags": ["CRITICAL_X", "minor"],
            "rationale": "because"
        });
        let Value::Object(map) = map else { unreachable!() };
        let response = AgentReply::Structured(map).into_response("reviewer");
        assert_eq!(response.role, "reviewer");
        assert_eq!(response.output, r#"{"summary":"ok"}"#);
        assert_eq!(response.confidence, 1.0);
        assert!(response.risk_flags.contains("CRITICAL_X"));
        assert_eq!(response.risk_flags.len(), 2);
    }

    #[test]
    fn test_structured_reply_with_string_fields() {
        let map = json!({"payload": "x", "confidence": "85%", "risk_flags": "a, b"});
        let Value::Object(map) = map else { unreachable!() };
        let response = AgentReply::Structured(map).into_response("a");
        assert!((response.confidence - 0.85).abs() < 1e-9);
        assert_eq!(response.risk_flags.len(), 2);
    }

    #[test]
    fn test_structured_reply_defaults() {
        let response = AgentReply::Structured(Map::new()).into_response("a");
        assert_eq!(response.output, "");
        assert_eq!(response.confidence, DEFAULT_CONFIDENCE);
    }
}
