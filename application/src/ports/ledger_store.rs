//! Ledger persistence port
//!
//! Run ledgers are appended to durable storage once a run finishes and can
//! be read back for replay or comparison.

use concord_domain::RunLedger;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error at record {line}: {source}")]
    Serialization {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub trait LedgerStore: Send + Sync {
    fn append(&self, ledger: &RunLedger) -> Result<(), LedgerStoreError>;

    /// Every stored ledger in append order.
    fn load_all(&self) -> Result<Vec<RunLedger>, LedgerStoreError>;
}
