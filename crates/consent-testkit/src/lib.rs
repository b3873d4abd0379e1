//! # Consent Testkit
//!
//! Test utilities for the consent ledger:
//!
//! - [`FlakyCellStore`]: wraps a store and fails allocations or writes on demand
//! - [`CorruptCellStore`]: serves configured out-of-domain values from `read_cell`
//! - [`inject_raw_value`]: writes a scalar the codec would never produce
//! - [`init_test_tracing`]: one-shot `tracing` subscriber for test output

#![forbid(unsafe_code)]

use consent_core::{CellHandle, CellStore, CompositeKey, LedgerError, Result, StoreStats};
use consent_effects::MemoryCellStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Store wrapper that fails operations on demand
#[derive(Debug, Default)]
pub struct FlakyCellStore<S = MemoryCellStore> {
    inner: S,
    fail_allocations: AtomicBool,
    fail_writes: AtomicBool,
    allocation_attempts: AtomicU64,
}

impl<S: CellStore> FlakyCellStore<S> {
    /// Wrap a store; nothing fails until a failure mode is switched on
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_allocations: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            allocation_attempts: AtomicU64::new(0),
        }
    }

    /// Refuse to allocate new cells. Existing cells are still returned.
    pub fn fail_allocations(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::SeqCst);
    }

    /// Refuse every write
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `ensure_cell` calls that found no existing cell
    ///
    /// Racing callers for the same new key may each count once even though
    /// the inner store allocates a single cell.
    pub fn allocation_attempts(&self) -> u64 {
        self.allocation_attempts.load(Ordering::SeqCst)
    }

    /// Wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: CellStore> CellStore for FlakyCellStore<S> {
    fn ensure_cell(&self, key: &CompositeKey, initial: u64) -> Result<CellHandle> {
        // The lookup only decides whether to count and inject a failure.
        // Creation itself stays a single atomic call on the inner store.
        if self.inner.lookup_cell(key)?.is_none() {
            self.allocation_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_allocations.load(Ordering::SeqCst) {
                return Err(LedgerError::storage(format!(
                    "injected allocation failure for {key}"
                )));
            }
        }
        self.inner.ensure_cell(key, initial)
    }

    fn lookup_cell(&self, key: &CompositeKey) -> Result<Option<CellHandle>> {
        self.inner.lookup_cell(key)
    }

    fn read_cell(&self, handle: &CellHandle) -> Result<u64> {
        self.inner.read_cell(handle)
    }

    fn write_cell(&self, handle: &CellHandle, value: u64) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::storage(format!(
                "injected write failure for {}",
                handle.key()
            )));
        }
        self.inner.write_cell(handle, value)
    }

    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<CompositeKey>> {
        self.inner.list_keys(prefix)
    }

    fn stats(&self) -> Result<StoreStats> {
        self.inner.stats()
    }
}

/// Store wrapper whose `read_cell` returns configured raw values
///
/// An override applies only to a cell that exists in the inner store and is
/// cleared by the next successful write to that cell.
#[derive(Debug, Default)]
pub struct CorruptCellStore<S = MemoryCellStore> {
    inner: S,
    overrides: RwLock<HashMap<CompositeKey, u64>>,
}

impl<S: CellStore> CorruptCellStore<S> {
    /// Wrap a store; reads pass through until a key is corrupted
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Make reads of `key` return `raw`
    pub fn corrupt(&self, key: &CompositeKey, raw: u64) {
        self.overrides.write().insert(key.clone(), raw);
    }

    /// Whether reads of `key` are currently overridden
    pub fn is_corrupted(&self, key: &CompositeKey) -> bool {
        self.overrides.read().contains_key(key)
    }

    /// Wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: CellStore> CellStore for CorruptCellStore<S> {
    fn ensure_cell(&self, key: &CompositeKey, initial: u64) -> Result<CellHandle> {
        self.inner.ensure_cell(key, initial)
    }

    fn lookup_cell(&self, key: &CompositeKey) -> Result<Option<CellHandle>> {
        self.inner.lookup_cell(key)
    }

    fn read_cell(&self, handle: &CellHandle) -> Result<u64> {
        let value = self.inner.read_cell(handle)?;
        Ok(self
            .overrides
            .read()
            .get(handle.key())
            .copied()
            .unwrap_or(value))
    }

    fn write_cell(&self, handle: &CellHandle, value: u64) -> Result<()> {
        self.inner.write_cell(handle, value)?;
        self.overrides.write().remove(handle.key());
        Ok(())
    }

    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<CompositeKey>> {
        self.inner.list_keys(prefix)
    }

    fn stats(&self) -> Result<StoreStats> {
        self.inner.stats()
    }
}

/// Store `value` in the cell for `key`, bypassing the status codec
pub fn inject_raw_value(store: &impl CellStore, key: &CompositeKey, value: u64) -> Result<()> {
    let handle = store.ensure_cell(key, value)?;
    store.write_cell(&handle, value)?;
    tracing::debug!(key = %key, value, "injected raw cell value");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_core::derive_key;

    #[test]
    fn test_flaky_allocation() {
        let store = FlakyCellStore::new(MemoryCellStore::new());
        let existing = derive_key("a", "r", "d");
        store.ensure_cell(&existing, 1).unwrap();

        store.fail_allocations(true);
        assert!(store.ensure_cell(&existing, 1).is_ok());
        assert!(store.ensure_cell(&derive_key("b", "r", "d"), 1).is_err());
        assert_eq!(store.allocation_attempts(), 2);
        assert_eq!(store.inner().len(), 1);
    }

    #[test]
    fn test_flaky_writes() {
        let store = FlakyCellStore::new(MemoryCellStore::new());
        let key = derive_key("a", "r", "d");
        let handle = store.ensure_cell(&key, 1).unwrap();

        store.fail_writes(true);
        assert!(store.write_cell(&handle, 0).is_err());
        assert_eq!(store.read_cell(&handle).unwrap(), 1);
    }

    #[test]
    fn test_flaky_counts_only_missing_cells() {
        let store = FlakyCellStore::new(MemoryCellStore::new());
        let key = derive_key("a", "r", "d");
        let first = store.ensure_cell(&key, 1).unwrap();
        let second = store.ensure_cell(&key, 0).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.read_cell(&second).unwrap(), 1);
        assert_eq!(store.allocation_attempts(), 1);
    }

    #[test]
    fn test_corrupt_reads_until_rewritten() {
        let store = CorruptCellStore::new(MemoryCellStore::new());
        let key = derive_key("a", "r", "d");
        let handle = store.ensure_cell(&key, 1).unwrap();

        store.corrupt(&key, 9);
        assert!(store.is_corrupted(&key));
        assert_eq!(store.read_cell(&handle).unwrap(), 9);
        assert_eq!(store.inner().read_cell(&handle).unwrap(), 1);

        store.write_cell(&handle, 0).unwrap();
        assert!(!store.is_corrupted(&key));
        assert_eq!(store.read_cell(&handle).unwrap(), 0);
    }

    #[test]
    fn test_inject_raw_value() {
        let store = MemoryCellStore::new();
        let key = derive_key("a", "r", "d");
        inject_raw_value(&store, &key, 7).unwrap();

        let handle = store.lookup_cell(&key).unwrap().unwrap();
        assert_eq!(store.read_cell(&handle).unwrap(), 7);
    }
}
