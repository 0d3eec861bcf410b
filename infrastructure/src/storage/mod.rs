//! Durable storage adapters.

mod jsonl_ledger_store;

pub use jsonl_ledger_store::JsonlLedgerStore;
