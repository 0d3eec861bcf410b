//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod dispatch_agent;
pub mod run_orchestration;
