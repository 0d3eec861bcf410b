//! Orchestration domain: phases, run state, responses, ledger and the
//! pure validation/synthesis rules the orchestrator applies.

pub mod entities;
pub mod plan;
pub mod value_objects;
pub mod verdict;
