//! Run artifact locations from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ```toml
/// [logging]
/// events_path = ".concord/events.jsonl"
/// ledger_path = ".concord/ledgers.jsonl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL run-event log; disabled when unset.
    pub events_path: Option<PathBuf>,
    /// JSONL ledger store; disabled when unset.
    pub ledger_path: Option<PathBuf>,
}
