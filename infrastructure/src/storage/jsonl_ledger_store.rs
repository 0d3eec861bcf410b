//! Append-only JSONL store for run ledgers.

use concord_application::ports::ledger_store::{LedgerStore, LedgerStoreError};
use concord_domain::RunLedger;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// One serialized [`RunLedger`] per line.
///
/// Appends are serialized through a mutex so concurrent runs never
/// interleave partial lines.
pub struct JsonlLedgerStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonlLedgerStore {
    fn append(&self, ledger: &RunLedger) -> Result<(), LedgerStoreError> {
        let line = serde_json::to_string(ledger)
            .map_err(|source| LedgerStoreError::Serialization { line: 0, source })?;

        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;

        debug!("Appended ledger {} to {}", ledger.run_id, self.path.display());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<RunLedger>, LedgerStoreError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ledgers = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let ledger = serde_json::from_str(&line).map_err(|source| {
                LedgerStoreError::Serialization {
                    line: index + 1,
                    source,
                }
            })?;
            ledgers.push(ledger);
        }
        Ok(ledgers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::{AgentResponse, OrchestratorState};

    fn finished_ledger(task: &str) -> RunLedger {
        let mut ledger = RunLedger::new(task);
        ledger
            .responses
            .push(AgentResponse::new("planner", "planner", "{\"steps\": []}", 0.9));
        ledger.final_output = Some(format!("# {}\n\ndone", task));
        ledger.aggregate_confidence = 0.9;
        ledger.state = OrchestratorState::Terminate;
        ledger
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlLedgerStore::new(dir.path().join("ledgers.jsonl"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlLedgerStore::new(dir.path().join("runs/ledgers.jsonl"));

        let first = finished_ledger("Implement X");
        let second = finished_ledger("Implement Y");
        store.append(&first).unwrap();
        store.append(&second).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].run_id, first.run_id);
        assert_eq!(loaded[1].task, "Implement Y");
        assert_eq!(loaded[1].state, OrchestratorState::Terminate);
        assert_eq!(loaded[1].responses.len(), 1);
    }

    #[test]
    fn test_corrupt_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgers.jsonl");
        let store = JsonlLedgerStore::new(&path);
        store.append(&finished_ledger("ok")).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json\n")
            .unwrap();

        let err = store.load_all().unwrap_err();
        assert!(matches!(err, LedgerStoreError::Serialization { line: 2, .. }));
    }
}
