//! Application layer for concord
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{AgentProfile, OrchestratorConfig};
pub use ports::{
    agent_caller::{AgentCallError, AgentCaller, AgentReply},
    ledger_store::{LedgerStore, LedgerStoreError},
    model_provider::{
        Generation, GenerationRequest, ModelProvider, ProviderError, ProviderRegistry, TokenUsage,
    },
    planner::{DefaultPlanner, Planner, PlannerError},
    progress::{NoProgress, ProgressNotifier},
    run_event_logger::{NoRunEventLogger, RunEvent, RunEventLogger},
};
pub use use_cases::dispatch_agent::{
    POLICY_FLAG, PromptedAgentCaller, SCHEMA_VIOLATION_CONFIDENCE_CAP, SCHEMA_VIOLATION_FLAG,
};
pub use use_cases::run_orchestration::{FORCE_TERMINATED, Orchestrator, OrchestratorError};
