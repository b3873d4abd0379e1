//! # Consent Core - Foundation
//!
//! **Purpose**: Shared vocabulary for the consent ledger.
//!
//! - Identifier triples and composite key derivation
//! - The consent status codec and the three-valued logical status
//! - The unified [`LedgerError`]
//! - Ledger configuration
//! - The [`CellStore`] trait that storage backends implement
//!
//! Nothing in this crate touches storage directly; backends live in
//! `consent-effects` and the operation handlers in `consent-ledger`.

#![forbid(unsafe_code)]

/// Ledger configuration
pub mod config;

/// Unified error type
pub mod errors;

/// Identifier triples and composite keys
pub mod identifiers;

/// Status codec and audit records
pub mod status;

/// Cell storage trait
pub mod storage;

pub use config::{LedgerConfig, StorageBackend, StorageConfig};
pub use errors::{LedgerError, Result};
pub use identifiers::{derive_key, CompositeKey, ConsentTriple, SeparatorPolicy, KEY_SEPARATOR};
pub use status::{AuditRecord, ConsentStatus, LogicalStatus};
pub use storage::{CellHandle, CellStore, StoreStats};
