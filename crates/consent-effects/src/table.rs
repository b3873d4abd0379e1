//! Cell table shared by the storage handlers
//!
//! An index from composite key to slot plus a dense slot vector. Slots are
//! append-only: a cell is never removed once allocated.

use consent_core::{CellHandle, CompositeKey, LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Snapshot format version written by [`CellTable::snapshot`]
pub(crate) const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
struct Slot {
    key: CompositeKey,
    value: u64,
}

/// Outcome of [`CellTable::get_or_insert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ensured {
    /// The cell already existed
    Existing(CellHandle),
    /// The cell was allocated by this call
    Allocated(CellHandle),
}

impl Ensured {
    #[cfg(test)]
    pub(crate) fn handle(&self) -> &CellHandle {
        match self {
            Self::Existing(handle) | Self::Allocated(handle) => handle,
        }
    }

    pub(crate) fn into_handle(self) -> CellHandle {
        match self {
            Self::Existing(handle) | Self::Allocated(handle) => handle,
        }
    }
}

/// Persisted form of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CellSnapshot {
    pub(crate) version: u32,
    pub(crate) cells: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
pub(crate) struct CellTable {
    index: HashMap<CompositeKey, usize>,
    slots: Vec<Slot>,
    limit: Option<u64>,
}

impl CellTable {
    pub(crate) fn new(limit: Option<u64>) -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            limit,
        }
    }

    pub(crate) fn from_snapshot(snapshot: CellSnapshot, limit: Option<u64>) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LedgerError::storage(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }

        let mut table = Self::new(limit);
        for (key, value) in snapshot.cells {
            let key = CompositeKey::from_raw(key);
            table.index.insert(key.clone(), table.slots.len());
            table.slots.push(Slot { key, value });
        }
        Ok(table)
    }

    pub(crate) fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            version: SNAPSHOT_VERSION,
            cells: self
                .slots
                .iter()
                .map(|slot| (slot.key.as_str().to_string(), slot.value))
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> u64 {
        self.slots.len() as u64
    }

    pub(crate) fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub(crate) fn lookup(&self, key: &CompositeKey) -> Option<CellHandle> {
        self.index
            .get(key)
            .map(|&slot| CellHandle::new(slot, key.clone()))
    }

    /// Existence check and allocation under one borrow of the table
    pub(crate) fn get_or_insert(&mut self, key: &CompositeKey, initial: u64) -> Result<Ensured> {
        if let Some(&slot) = self.index.get(key) {
            return Ok(Ensured::Existing(CellHandle::new(slot, key.clone())));
        }

        if let Some(limit) = self.limit {
            if self.len() >= limit {
                return Err(LedgerError::quota_exceeded(self.len(), limit));
            }
        }

        let slot = self.slots.len();
        self.slots.push(Slot {
            key: key.clone(),
            value: initial,
        });
        self.index.insert(key.clone(), slot);
        Ok(Ensured::Allocated(CellHandle::new(slot, key.clone())))
    }

    /// Undo the most recent allocation. Only valid directly after it.
    pub(crate) fn rollback_allocation(&mut self, handle: &CellHandle) {
        if handle.slot() + 1 == self.slots.len() {
            self.slots.pop();
            self.index.remove(handle.key());
        }
    }

    pub(crate) fn read(&self, handle: &CellHandle) -> Result<u64> {
        Ok(self.resolve(handle)?.value)
    }

    /// Overwrite a cell, returning the previous value
    pub(crate) fn write(&mut self, handle: &CellHandle, value: u64) -> Result<u64> {
        self.resolve(handle)?;
        let slot = &mut self.slots[handle.slot()];
        Ok(std::mem::replace(&mut slot.value, value))
    }

    pub(crate) fn keys(&self, prefix: Option<&str>) -> Vec<CompositeKey> {
        let mut keys: Vec<CompositeKey> = self
            .slots
            .iter()
            .filter(|slot| prefix.map_or(true, |p| slot.key.as_str().starts_with(p)))
            .map(|slot| slot.key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn resolve(&self, handle: &CellHandle) -> Result<&Slot> {
        match self.slots.get(handle.slot()) {
            Some(slot) if &slot.key == handle.key() => Ok(slot),
            _ => Err(LedgerError::not_found(format!(
                "no cell at slot {} for key {}",
                handle.slot(),
                handle.key()
            ))),
        }
    }
}
