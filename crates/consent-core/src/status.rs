//! Consent status codec
//!
//! Cells store a single unsigned scalar. Only [`ConsentStatus`] values are
//! ever encoded, so a stored value outside {0, 1} can only come from
//! corruption and is reported as such instead of being folded into a status.

use crate::errors::{LedgerError, Result};
use crate::identifiers::CompositeKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored scalar for [`ConsentStatus::Granted`]
pub const GRANTED_VALUE: u64 = 1;

/// Stored scalar for [`ConsentStatus::Revoked`]
pub const REVOKED_VALUE: u64 = 0;

/// Status a consent cell can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    /// Data sharing is permitted
    Granted,
    /// Data sharing is not permitted
    Revoked,
}

impl ConsentStatus {
    /// Encode the status as the scalar stored in a cell
    pub const fn encode(self) -> u64 {
        match self {
            Self::Granted => GRANTED_VALUE,
            Self::Revoked => REVOKED_VALUE,
        }
    }

    /// Decode a stored scalar
    pub fn decode(value: u64) -> Result<Self> {
        match value {
            GRANTED_VALUE => Ok(Self::Granted),
            REVOKED_VALUE => Ok(Self::Revoked),
            other => Err(LedgerError::data_corruption(format!(
                "stored consent value {other} is outside {{{REVOKED_VALUE}, {GRANTED_VALUE}}}"
            ))),
        }
    }
}

/// Read-time view of a key: cell existence plus stored status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalStatus {
    /// No cell has ever been created for the key
    Absent,
    /// Cell exists and holds granted
    Granted,
    /// Cell exists and holds revoked
    Revoked,
}

impl LogicalStatus {
    /// Tag used as the prefix of an audit string
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Absent => "NONE",
            Self::Granted => "GRANTED",
            Self::Revoked => "REVOKED",
        }
    }

    /// Decode an optional stored value into a logical status
    pub fn from_cell(value: Option<u64>) -> Result<Self> {
        match value {
            None => Ok(Self::Absent),
            Some(raw) => ConsentStatus::decode(raw).map(Self::from),
        }
    }
}

impl From<ConsentStatus> for LogicalStatus {
    fn from(status: ConsentStatus) -> Self {
        match status {
            ConsentStatus::Granted => Self::Granted,
            ConsentStatus::Revoked => Self::Revoked,
        }
    }
}

/// Status-plus-key echo returned by every operation
///
/// Renders as `TAG:key`, e.g. `GRANTED:alice:school-A:grades`. This reflects
/// the current value of the cell, not a history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Logical status of the key after the operation
    pub status: LogicalStatus,
    /// Key the operation resolved to
    pub key: CompositeKey,
}

impl AuditRecord {
    /// Create an audit record
    pub fn new(status: LogicalStatus, key: CompositeKey) -> Self {
        Self { status, key }
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.status.tag(), self.key)
    }
}
