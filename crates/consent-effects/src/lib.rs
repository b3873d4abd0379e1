//! # Consent Effects - Storage Handlers
//!
//! Implementations of [`consent_core::CellStore`]:
//!
//! - [`MemoryCellStore`]: process-local cells behind a `parking_lot` lock
//! - [`FileCellStore`]: the same table persisted to a JSON snapshot
//!
//! [`open_store`] builds whichever backend the configuration selects.

#![forbid(unsafe_code)]

/// File-backed cell store
pub mod file;

/// In-memory cell store
pub mod memory;

mod table;

pub use file::FileCellStore;
pub use memory::MemoryCellStore;

use consent_core::{CellStore, LedgerError, Result, StorageBackend, StorageConfig};

/// Open the storage backend selected by `config`
pub fn open_store(config: &StorageConfig, max_cells: Option<u64>) -> Result<Box<dyn CellStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Box::new(MemoryCellStore::with_limit(max_cells))),
        StorageBackend::File => {
            let path = config.path.clone().ok_or_else(|| {
                LedgerError::invalid("storage.path is required for the file backend")
            })?;
            Ok(Box::new(FileCellStore::open(path, max_cells)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_store() {
        let store = open_store(&StorageConfig::default(), Some(5)).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.backend_type, "memory");
        assert_eq!(stats.cell_limit, Some(5));
    }

    #[test]
    fn test_open_file_store_requires_path() {
        let config = StorageConfig {
            backend: StorageBackend::File,
            path: None,
        };
        assert!(matches!(
            open_store(&config, None),
            Err(LedgerError::Invalid { .. })
        ));
    }

    #[test]
    fn test_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::File,
            path: Some(dir.path().join("cells.json")),
        };
        let store = open_store(&config, None).unwrap();
        assert_eq!(store.stats().unwrap().backend_type, "file");
    }
}
