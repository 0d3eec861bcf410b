//! Infrastructure layer for concord
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod logging;
pub mod providers;
pub mod storage;

// Re-export commonly used types
pub use config::{ConfigError, ConfigLoader, FileConfig, ResolvedConfig};
pub use logging::JsonlRunEventLogger;
pub use providers::{ECHO_PROVIDER_NAME, EchoProvider};
pub use storage::JsonlLedgerStore;
