//! Structured agent output.
//!
//! Agents are asked to answer in four labeled sections. [`parse_structured_output`]
//! pulls those sections out of free text without ever failing.

mod parsing;

pub use parsing::{
    DEFAULT_CONFIDENCE, StructuredOutput, parse_confidence, parse_risk_flags,
    parse_structured_output,
};
