//! Application-level configuration.
//!
//! - [`OrchestratorConfig`] - run loop control (phase ceiling, threshold, workers)
//! - [`AgentProfile`] - agent name to role/provider/model mapping

pub mod agent_profile;
pub mod orchestrator_config;

pub use agent_profile::AgentProfile;
pub use orchestrator_config::OrchestratorConfig;
