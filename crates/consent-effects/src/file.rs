//! File-backed cell store
//!
//! Cells are held in memory and the whole table is written to a JSON
//! snapshot after every mutation. Writes go to a temporary file that is then
//! renamed over the snapshot, so a crash never leaves a torn file behind.
//! When the snapshot cannot be written the in-memory mutation is undone and
//! the error is returned; callers never observe a change that was not
//! persisted.

use crate::table::{CellSnapshot, CellTable, Ensured};
use consent_core::{CellHandle, CellStore, CompositeKey, LedgerError, Result, StoreStats};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Cell store persisted to a JSON snapshot file
#[derive(Debug)]
pub struct FileCellStore {
    path: PathBuf,
    table: RwLock<CellTable>,
}

impl FileCellStore {
    /// Open the snapshot at `path`, starting empty if it does not exist yet
    pub fn open(path: impl Into<PathBuf>, limit: Option<u64>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::storage(format!(
                    "Failed to create storage directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let table = match std::fs::read(&path) {
            Ok(bytes) => {
                let snapshot: CellSnapshot = serde_json::from_slice(&bytes)?;
                CellTable::from_snapshot(snapshot, limit)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CellTable::new(limit),
            Err(e) => return Err(e.into()),
        };

        info!(path = ?path, cells = table.len(), "opened file cell store");

        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    /// Location of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn persist(&self, table: &CellTable) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&table.snapshot())?;
        let temp = self.temp_path();
        std::fs::write(&temp, bytes)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl CellStore for FileCellStore {
    fn ensure_cell(&self, key: &CompositeKey, initial: u64) -> Result<CellHandle> {
        let mut table = self.table.write();
        let handle = match table.get_or_insert(key, initial) {
            Ok(Ensured::Allocated(handle)) => handle,
            Ok(existing) => return Ok(existing.into_handle()),
            Err(err) => {
                warn!(key = %key, error = %err, "cell allocation refused");
                return Err(err);
            }
        };

        if let Err(err) = self.persist(&table) {
            table.rollback_allocation(&handle);
            error!(key = %key, error = %err, "failed to persist new cell, allocation rolled back");
            return Err(err);
        }

        debug!(key = %key, slot = handle.slot(), "allocated consent cell");
        Ok(handle)
    }

    fn lookup_cell(&self, key: &CompositeKey) -> Result<Option<CellHandle>> {
        Ok(self.table.read().lookup(key))
    }

    fn read_cell(&self, handle: &CellHandle) -> Result<u64> {
        self.table.read().read(handle)
    }

    fn write_cell(&self, handle: &CellHandle, value: u64) -> Result<()> {
        let mut table = self.table.write();
        let previous = table.write(handle, value)?;
        if previous == value {
            return Ok(());
        }

        if let Err(err) = self.persist(&table) {
            table.write(handle, previous)?;
            error!(key = %handle.key(), error = %err, "failed to persist cell write, value restored");
            return Err(err);
        }
        Ok(())
    }

    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<CompositeKey>> {
        Ok(self.table.read().keys(prefix))
    }

    fn stats(&self) -> Result<StoreStats> {
        let table = self.table.read();
        Ok(StoreStats {
            cell_count: table.len(),
            cell_limit: table.limit(),
            backend_type: "file".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_core::derive_key;

    #[test]
    fn test_reopen_restores_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.json");
        let key = derive_key("alice", "school-A", "grades");

        {
            let store = FileCellStore::open(&path, None).unwrap();
            let handle = store.ensure_cell(&key, 0).unwrap();
            store.write_cell(&handle, 1).unwrap();
        }

        let reopened = FileCellStore::open(&path, None).unwrap();
        let handle = reopened.lookup_cell(&key).unwrap().unwrap();
        assert_eq!(reopened.read_cell(&handle).unwrap(), 1);
        assert_eq!(reopened.stats().unwrap().backend_type, "file");
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cells.json");

        let store = FileCellStore::open(&path, None).unwrap();
        store.ensure_cell(&derive_key("a", "r", "d"), 1).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_failed_persist_rolls_back_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.json");
        let store = FileCellStore::open(&path, None).unwrap();

        // A directory where the temp file should go makes every flush fail.
        std::fs::create_dir(store.temp_path()).unwrap();

        let key = derive_key("a", "r", "d");
        assert!(store.ensure_cell(&key, 1).is_err());
        assert!(store.lookup_cell(&key).unwrap().is_none());
        assert_eq!(store.stats().unwrap().cell_count, 0);
    }

    #[test]
    fn test_failed_persist_restores_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.json");
        let store = FileCellStore::open(&path, None).unwrap();
        let key = derive_key("a", "r", "d");
        let handle = store.ensure_cell(&key, 1).unwrap();

        std::fs::create_dir(store.temp_path()).unwrap();

        assert!(store.write_cell(&handle, 0).is_err());
        assert_eq!(store.read_cell(&handle).unwrap(), 1);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = FileCellStore::open(&path, None).unwrap_err();
        assert!(matches!(err, LedgerError::Serialization { .. }));
    }
}
