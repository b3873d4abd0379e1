//! Cell storage interface
//!
//! The consent handlers never touch ambient state; they are given a
//! [`CellStore`] and address cells only through it. Implementations live in
//! `consent-effects` (production backends) and `consent-testkit` (fault
//! injection).

use crate::errors::Result;
use crate::identifiers::CompositeKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Handle to an allocated consent cell
///
/// Handles are only produced by [`CellStore::ensure_cell`] and
/// [`CellStore::lookup_cell`]; cells are never deallocated, so a handle stays
/// valid for the lifetime of the store that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellHandle {
    slot: usize,
    key: CompositeKey,
}

impl CellHandle {
    /// Create a handle for a slot. Intended for store implementations.
    pub fn new(slot: usize, key: CompositeKey) -> Self {
        Self { slot, key }
    }

    /// Slot index inside the issuing store
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Key the cell is addressed by
    pub fn key(&self) -> &CompositeKey {
        &self.key
    }
}

/// Storage statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of allocated cells
    pub cell_count: u64,
    /// Allocation limit, if any
    pub cell_limit: Option<u64>,
    /// Backend name (e.g. "memory", "file")
    pub backend_type: String,
}

/// Keyed registry of consent cells
///
/// Calls are synchronous. Implementations must make `ensure_cell` a single
/// atomic get-or-insert: two callers racing on one key observe the same cell
/// and at most one allocation happens.
pub trait CellStore: Send + Sync {
    /// Return the cell for `key`, allocating it with `initial` if absent
    ///
    /// An existing cell is returned unmodified. Allocation failure (quota or
    /// backend) leaves the store unchanged.
    fn ensure_cell(&self, key: &CompositeKey, initial: u64) -> Result<CellHandle>;

    /// Return the cell for `key` if one was ever allocated. Never allocates.
    fn lookup_cell(&self, key: &CompositeKey) -> Result<Option<CellHandle>>;

    /// Read the scalar stored in a cell
    fn read_cell(&self, handle: &CellHandle) -> Result<u64>;

    /// Overwrite the scalar stored in a cell
    fn write_cell(&self, handle: &CellHandle, value: u64) -> Result<()>;

    /// Keys of all allocated cells, optionally filtered by prefix, sorted
    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<CompositeKey>>;

    /// Storage statistics
    fn stats(&self) -> Result<StoreStats>;
}

impl<S: CellStore + ?Sized> CellStore for Arc<S> {
    fn ensure_cell(&self, key: &CompositeKey, initial: u64) -> Result<CellHandle> {
        (**self).ensure_cell(key, initial)
    }

    fn lookup_cell(&self, key: &CompositeKey) -> Result<Option<CellHandle>> {
        (**self).lookup_cell(key)
    }

    fn read_cell(&self, handle: &CellHandle) -> Result<u64> {
        (**self).read_cell(handle)
    }

    fn write_cell(&self, handle: &CellHandle, value: u64) -> Result<()> {
        (**self).write_cell(handle, value)
    }

    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<CompositeKey>> {
        (**self).list_keys(prefix)
    }

    fn stats(&self) -> Result<StoreStats> {
        (**self).stats()
    }
}

impl<S: CellStore + ?Sized> CellStore for Box<S> {
    fn ensure_cell(&self, key: &CompositeKey, initial: u64) -> Result<CellHandle> {
        (**self).ensure_cell(key, initial)
    }

    fn lookup_cell(&self, key: &CompositeKey) -> Result<Option<CellHandle>> {
        (**self).lookup_cell(key)
    }

    fn read_cell(&self, handle: &CellHandle) -> Result<u64> {
        (**self).read_cell(handle)
    }

    fn write_cell(&self, handle: &CellHandle, value: u64) -> Result<()> {
        (**self).write_cell(handle, value)
    }

    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<CompositeKey>> {
        (**self).list_keys(prefix)
    }

    fn stats(&self) -> Result<StoreStats> {
        (**self).stats()
    }
}
