//! Port for structured run-event logging.
//!
//! Defines the [`RunEventLogger`] trait for recording orchestration events
//! (state transitions, decisions, agent responses, phase verdicts, compiled
//! prompts) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the run in a
//! machine-readable format (JSONL).

use serde_json::Value;

/// A structured run event.
///
/// Each event has a type string and a JSON payload containing
/// event-specific fields. Adapters add the timestamp when writing.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEvent {
    /// Event type identifier (e.g., "state_transition", "phase_verdict").
    pub event_type: &'static str,
    pub payload: Value,
}

impl RunEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging run events.
///
/// `log` is synchronous and infallible so that a broken log sink never
/// disrupts a run; adapters swallow their own I/O errors.
pub trait RunEventLogger: Send + Sync {
    fn log(&self, event: RunEvent);
}

/// No-op implementation for tests and when event logging is disabled.
pub struct NoRunEventLogger;

impl RunEventLogger for NoRunEventLogger {
    fn log(&self, _event: RunEvent) {}
}
