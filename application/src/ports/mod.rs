//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod agent_caller;
pub mod ledger_store;
pub mod model_provider;
pub mod planner;
pub mod progress;
pub mod run_event_logger;
