//! # Consent Ledger
//!
//! Records, per (student, receiver-group, data-group) triple, whether
//! data-sharing consent is currently granted or revoked.
//!
//! ```
//! use consent_effects::MemoryCellStore;
//! use consent_ledger::ConsentLedger;
//!
//! let ledger = ConsentLedger::new(MemoryCellStore::new());
//! let receipt = ledger.grant_consent("alice", "school-A", "grades")?;
//! assert_eq!(receipt.to_string(), "GRANTED:alice:school-A:grades");
//! # Ok::<(), consent_core::LedgerError>(())
//! ```
//!
//! Cells are addressed through an injected [`consent_core::CellStore`];
//! the host reaches the handlers through the method table in [`methods`].
//! Access requests from receiver groups are tracked in [`requests`].

#![forbid(unsafe_code)]

/// Data-group and request-group names
pub mod groups;

/// Consent operation handlers
pub mod ledger;

/// Host-facing method table and dispatch
pub mod methods;

/// Access-request workflow
pub mod requests;

pub use groups::{
    canonical_default_group, canonical_default_request_group, normalize_group_name,
    normalize_request_group_name, DEFAULT_DATA_GROUPS, DEFAULT_REQUEST_GROUPS,
};
pub use ledger::ConsentLedger;
pub use methods::{ConsentArgs, ConsentMethod, METHOD_PARAMS};
pub use requests::{AccessRequest, AccessRequestBook, RequestStatus};

pub use consent_core::{AuditRecord, LedgerConfig, LedgerError, LogicalStatus, Result};
