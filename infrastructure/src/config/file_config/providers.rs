//! Provider selection from TOML (`[providers]` section)

use serde::{Deserialize, Serialize};

/// ```toml
/// [providers]
/// default = "echo"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProvidersConfig {
    /// Provider used by agents without an explicit one.
    pub default: Option<String>,
}
