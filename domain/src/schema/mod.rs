//! Output contracts and their validation.
//!
//! - [`OutputSchema`] - declared contract for an agent's output
//! - [`SchemaValidator`] - parse/validate/repair against a contract
//! - [`repair`] - best-effort JSON repair used by the JSON path

mod entities;
pub mod repair;
mod validator;

pub use entities::{FormatType, OutputSchema, ValidationReport, ValidationStatus};
pub use validator::SchemaValidator;
