//! Consent operation handlers
//!
//! Every handler resolves its triple to a composite key, touches exactly one
//! cell through the injected [`CellStore`] and answers with an
//! [`AuditRecord`]. Each key behaves as an independent last-write-wins
//! register.

use consent_core::{
    AuditRecord, CellStore, CompositeKey, ConsentStatus, ConsentTriple, LedgerConfig,
    LedgerError, LogicalStatus, Result, SeparatorPolicy, StoreStats, KEY_SEPARATOR,
};
use consent_effects::open_store;
use tracing::{debug, error, info, instrument};

/// Consent store over an injected cell backend
#[derive(Debug)]
pub struct ConsentLedger<S> {
    store: S,
    separator_policy: SeparatorPolicy,
}

impl ConsentLedger<Box<dyn CellStore>> {
    /// Build a ledger and its storage backend from configuration
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.storage, config.max_cells)?;
        info!(
            backend = ?config.storage.backend,
            separator_policy = ?config.separator_policy,
            max_cells = ?config.max_cells,
            "consent ledger ready"
        );
        Ok(Self::with_separator_policy(store, config.separator_policy))
    }
}

impl<S: CellStore> ConsentLedger<S> {
    /// Create a ledger that rejects identifiers containing the key separator
    pub fn new(store: S) -> Self {
        Self::with_separator_policy(store, SeparatorPolicy::default())
    }

    /// Create a ledger with an explicit separator policy
    pub fn with_separator_policy(store: S, separator_policy: SeparatorPolicy) -> Self {
        Self {
            store,
            separator_policy,
        }
    }

    /// Separator policy applied to incoming identifiers
    pub fn separator_policy(&self) -> SeparatorPolicy {
        self.separator_policy
    }

    /// Underlying cell store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Grant consent, returning `GRANTED:<key>`
    pub fn grant_consent(
        &self,
        student_id: &str,
        receiver_group: &str,
        data_group: &str,
    ) -> Result<AuditRecord> {
        self.grant(&ConsentTriple::new(student_id, receiver_group, data_group))
    }

    /// Revoke consent, returning `REVOKED:<key>`
    pub fn revoke_consent(
        &self,
        student_id: &str,
        receiver_group: &str,
        data_group: &str,
    ) -> Result<AuditRecord> {
        self.revoke(&ConsentTriple::new(student_id, receiver_group, data_group))
    }

    /// Query consent, returning `NONE:<key>`, `GRANTED:<key>` or `REVOKED:<key>`
    pub fn get_consent(
        &self,
        student_id: &str,
        receiver_group: &str,
        data_group: &str,
    ) -> Result<AuditRecord> {
        self.query(&ConsentTriple::new(student_id, receiver_group, data_group))
    }

    /// Grant consent for a triple
    pub fn grant(&self, triple: &ConsentTriple) -> Result<AuditRecord> {
        self.record(triple, ConsentStatus::Granted)
    }

    /// Revoke consent for a triple
    pub fn revoke(&self, triple: &ConsentTriple) -> Result<AuditRecord> {
        self.record(triple, ConsentStatus::Revoked)
    }

    /// Read the current status of a triple without allocating storage
    #[instrument(level = "debug", skip(self))]
    pub fn query(&self, triple: &ConsentTriple) -> Result<AuditRecord> {
        let key = self.resolve_key(triple)?;
        let status = self.status_at(&key)?;
        Ok(AuditRecord::new(status, key))
    }

    /// Current consents recorded for a student, sorted by key
    ///
    /// Under [`SeparatorPolicy::Permit`] the prefix scan may also match keys
    /// of a student whose identifier extends this one with a separator.
    #[instrument(level = "debug", skip(self))]
    pub fn consents_for_student(&self, student_id: &str) -> Result<Vec<AuditRecord>> {
        if self.separator_policy == SeparatorPolicy::Reject && student_id.contains(KEY_SEPARATOR)
        {
            return Err(LedgerError::invalid(format!(
                "student_id '{student_id}' contains the key separator '{KEY_SEPARATOR}'"
            )));
        }

        let prefix = CompositeKey::student_prefix(student_id);
        self.store
            .list_keys(Some(&prefix))?
            .into_iter()
            .map(|key| {
                let status = self.status_at(&key)?;
                Ok(AuditRecord::new(status, key))
            })
            .collect()
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    #[instrument(level = "debug", skip(self))]
    fn record(&self, triple: &ConsentTriple, status: ConsentStatus) -> Result<AuditRecord> {
        let key = self.resolve_key(triple)?;
        let value = status.encode();

        // A new cell starts out holding the value being written.
        let cell = self.store.ensure_cell(&key, value)?;
        self.store.write_cell(&cell, value)?;

        debug!(key = %key, ?status, "consent recorded");
        Ok(AuditRecord::new(status.into(), key))
    }

    fn resolve_key(&self, triple: &ConsentTriple) -> Result<CompositeKey> {
        triple.validate(self.separator_policy)?;
        Ok(triple.composite_key())
    }

    fn status_at(&self, key: &CompositeKey) -> Result<LogicalStatus> {
        let value = match self.store.lookup_cell(key)? {
            Some(cell) => Some(self.store.read_cell(&cell)?),
            None => None,
        };

        LogicalStatus::from_cell(value).map_err(|err| {
            error!(key = %key, error = %err, "consent cell holds an undecodable value");
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_core::StorageConfig;
    use consent_effects::MemoryCellStore;

    fn ledger() -> ConsentLedger<MemoryCellStore> {
        ConsentLedger::new(MemoryCellStore::new())
    }

    #[test]
    fn test_grant_example() {
        let ledger = ledger();
        let granted = ledger.grant_consent("alice", "school-A", "grades").unwrap();
        assert_eq!(granted.to_string(), "GRANTED:alice:school-A:grades");

        let queried = ledger.get_consent("alice", "school-A", "grades").unwrap();
        assert_eq!(queried.to_string(), "GRANTED:alice:school-A:grades");
    }

    #[test]
    fn test_untouched_triple_is_none() {
        let ledger = ledger();
        let record = ledger.get_consent("bob", "uni", "transcript").unwrap();
        assert_eq!(record.to_string(), "NONE:bob:uni:transcript");
        assert_eq!(record.status, LogicalStatus::Absent);
    }

    #[test]
    fn test_query_never_allocates() {
        let ledger = ledger();
        ledger.get_consent("bob", "uni", "transcript").unwrap();
        assert!(ledger.store().is_empty());
    }

    #[test]
    fn test_revoke_without_prior_grant_creates_cell() {
        let ledger = ledger();
        let revoked = ledger.revoke_consent("carol", "clinic", "health").unwrap();
        assert_eq!(revoked.to_string(), "REVOKED:carol:clinic:health");
        assert_eq!(
            ledger.get_consent("carol", "clinic", "health").unwrap().status,
            LogicalStatus::Revoked
        );
        assert_eq!(ledger.store().len(), 1);
    }

    #[test]
    fn test_separator_rejected_before_storage() {
        let ledger = ledger();
        let err = ledger.grant_consent("a:b", "c", "d").unwrap_err();
        assert!(matches!(err, LedgerError::Invalid { .. }));
        assert!(ledger.store().is_empty());
    }

    #[test]
    fn test_consents_for_student() {
        let ledger = ledger();
        ledger.grant_consent("alice", "school-B", "grades").unwrap();
        ledger.revoke_consent("alice", "school-A", "grades").unwrap();
        ledger.grant_consent("alicia", "school-A", "grades").unwrap();

        let records: Vec<String> = ledger
            .consents_for_student("alice")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            records,
            vec![
                "REVOKED:alice:school-A:grades",
                "GRANTED:alice:school-B:grades"
            ]
        );
        assert!(ledger.consents_for_student("ali:ce").is_err());
    }

    #[test]
    fn test_from_config() {
        let config = LedgerConfig {
            separator_policy: SeparatorPolicy::Permit,
            max_cells: Some(2),
            storage: StorageConfig::default(),
        };
        let ledger = ConsentLedger::from_config(&config).unwrap();
        assert_eq!(ledger.separator_policy(), SeparatorPolicy::Permit);
        assert_eq!(ledger.stats().unwrap().cell_limit, Some(2));
    }

    #[test]
    fn test_from_config_validates() {
        let config = LedgerConfig {
            max_cells: Some(0),
            ..LedgerConfig::default()
        };
        assert!(ConsentLedger::from_config(&config).is_err());
    }
}
