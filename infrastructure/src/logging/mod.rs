//! Logging infrastructure for structured run events.
//!
//! Provides [`JsonlRunEventLogger`], a JSONL file writer that implements
//! the [`RunEventLogger`](concord_application::RunEventLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlRunEventLogger;
