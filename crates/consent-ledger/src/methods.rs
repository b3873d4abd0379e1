//! Statically typed entry points for the host
//!
//! The host enumerates [`ConsentMethod::ALL`] to register the ledger's
//! methods and routes invocations through [`ConsentLedger::dispatch`] or
//! [`ConsentLedger::dispatch_json`].

use crate::ledger::ConsentLedger;
use consent_core::{AuditRecord, CellStore, ConsentTriple, LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arguments shared by every consent method
pub type ConsentArgs = ConsentTriple;

/// Parameter names, in positional order, accepted by every consent method
pub const METHOD_PARAMS: [&str; 3] = ["student_id", "receiver_group", "data_group"];

/// Methods the ledger exposes to its host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentMethod {
    /// Record consent as granted
    GrantConsent,
    /// Record consent as revoked
    RevokeConsent,
    /// Read the current consent status
    GetConsent,
}

impl ConsentMethod {
    /// Every method, in registration order
    pub const ALL: [ConsentMethod; 3] = [
        ConsentMethod::GrantConsent,
        ConsentMethod::RevokeConsent,
        ConsentMethod::GetConsent,
    ];

    /// Name the host registers the method under
    pub const fn name(self) -> &'static str {
        match self {
            Self::GrantConsent => "grant_consent",
            Self::RevokeConsent => "revoke_consent",
            Self::GetConsent => "get_consent",
        }
    }

    /// Whether invoking the method can change persistent state
    pub const fn mutates_state(self) -> bool {
        !matches!(self, Self::GetConsent)
    }

    /// Look a method up by its registered name
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.name() == name)
            .ok_or_else(|| LedgerError::not_found(format!("unknown consent method '{name}'")))
    }
}

impl fmt::Display for ConsentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<S: CellStore> ConsentLedger<S> {
    /// Invoke a method with typed arguments
    pub fn dispatch(&self, method: ConsentMethod, args: &ConsentArgs) -> Result<AuditRecord> {
        match method {
            ConsentMethod::GrantConsent => self.grant(args),
            ConsentMethod::RevokeConsent => self.revoke(args),
            ConsentMethod::GetConsent => self.query(args),
        }
    }

    /// Invoke a method by name with a JSON object of arguments
    ///
    /// Returns the rendered audit string. Both `student_id` and `studentId`
    /// style field names are accepted.
    pub fn dispatch_json(&self, method_name: &str, args_json: &str) -> Result<String> {
        let method = ConsentMethod::parse(method_name)?;
        let args: ConsentArgs = serde_json::from_str(args_json).map_err(|e| {
            LedgerError::invalid(format!("malformed arguments for {method}: {e}"))
        })?;
        self.dispatch(method, &args).map(|record| record.to_string())
    }
}
