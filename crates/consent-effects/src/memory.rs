//! In-memory cell store

use crate::table::{CellTable, Ensured};
use consent_core::{CellHandle, CellStore, CompositeKey, Result, StoreStats};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cell store backed by process memory
///
/// Cloning shares the underlying table.
#[derive(Debug, Clone)]
pub struct MemoryCellStore {
    table: Arc<RwLock<CellTable>>,
}

impl MemoryCellStore {
    /// Create an empty, unbounded store
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// Create an empty store that allocates at most `limit` cells
    pub fn with_limit(limit: Option<u64>) -> Self {
        Self {
            table: Arc::new(RwLock::new(CellTable::new(limit))),
        }
    }

    /// Number of allocated cells
    pub fn len(&self) -> usize {
        self.table.read().len() as usize
    }

    /// Whether no cell has been allocated
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCellStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CellStore for MemoryCellStore {
    fn ensure_cell(&self, key: &CompositeKey, initial: u64) -> Result<CellHandle> {
        let mut table = self.table.write();
        match table.get_or_insert(key, initial) {
            Ok(Ensured::Allocated(handle)) => {
                debug!(key = %key, slot = handle.slot(), "allocated consent cell");
                Ok(handle)
            }
            Ok(existing) => Ok(existing.into_handle()),
            Err(err) => {
                warn!(key = %key, error = %err, "cell allocation refused");
                Err(err)
            }
        }
    }

    fn lookup_cell(&self, key: &CompositeKey) -> Result<Option<CellHandle>> {
        Ok(self.table.read().lookup(key))
    }

    fn read_cell(&self, handle: &CellHandle) -> Result<u64> {
        self.table.read().read(handle)
    }

    fn write_cell(&self, handle: &CellHandle, value: u64) -> Result<()> {
        self.table.write().write(handle, value).map(|_| ())
    }

    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<CompositeKey>> {
        Ok(self.table.read().keys(prefix))
    }

    fn stats(&self) -> Result<StoreStats> {
        let table = self.table.read();
        Ok(StoreStats {
            cell_count: table.len(),
            cell_limit: table.limit(),
            backend_type: "memory".to_string(),
        })
    }
}
