//! Access requests
//!
//! A receiver group asks for one of a student's data groups. The request
//! stays pending until it is approved, which grants consent on the ledger,
//! or rejected. Decided requests are final.

use crate::ledger::ConsentLedger;
use consent_core::{CellStore, ConsentTriple, LedgerError, Result, SeparatorPolicy};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

/// Lifecycle state of an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting a decision
    Pending,
    /// Approved; consent was granted on the ledger
    Approved,
    /// Rejected; the ledger was not touched
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        })
    }
}

/// A receiver group's request for a student's data group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Request identifier
    pub id: Uuid,
    /// Student whose data is requested
    pub student_id: String,
    /// Group asking for access
    pub requester_group: String,
    /// Data group requested
    pub data_group: String,
    /// Free-form purpose given by the requester
    pub purpose: String,
    /// Current state
    pub status: RequestStatus,
    /// Audit string returned by the ledger when the request was approved
    pub approval_receipt: Option<String>,
    /// Reason given on rejection
    pub reject_reason: Option<String>,
    /// Submission time
    pub created_at: OffsetDateTime,
    /// Time of the last state change
    pub updated_at: OffsetDateTime,
    #[serde(skip)]
    sequence: u64,
}

impl AccessRequest {
    /// Consent triple approval would grant
    pub fn triple(&self) -> ConsentTriple {
        ConsentTriple::new(&self.student_id, &self.requester_group, &self.data_group)
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.status == RequestStatus::Pending {
            Ok(())
        } else {
            Err(LedgerError::conflict(format!(
                "request {} already {}",
                self.id, self.status
            )))
        }
    }
}

#[derive(Debug, Default)]
struct BookState {
    requests: HashMap<Uuid, AccessRequest>,
    next_sequence: u64,
}

/// In-memory register of access requests
#[derive(Debug, Default)]
pub struct AccessRequestBook {
    state: RwLock<BookState>,
}

impl AccessRequestBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// File a new pending request
    ///
    /// Student, requester and data group are required and must not contain
    /// the key separator. They are stored exactly as given.
    pub fn submit(
        &self,
        student_id: &str,
        requester_group: &str,
        data_group: &str,
        purpose: Option<&str>,
    ) -> Result<AccessRequest> {
        if [student_id, requester_group, data_group]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(LedgerError::invalid(
                "student_id, requester_group and data_group are required",
            ));
        }

        ConsentTriple::new(student_id, requester_group, data_group)
            .validate(SeparatorPolicy::Reject)?;

        let now = OffsetDateTime::now_utc();

        let mut state = self.state.write();
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let request = AccessRequest {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            requester_group: requester_group.to_string(),
            data_group: data_group.to_string(),
            purpose: purpose.unwrap_or_default().to_string(),
            status: RequestStatus::Pending,
            approval_receipt: None,
            reject_reason: None,
            created_at: now,
            updated_at: now,
            sequence,
        };
        state.requests.insert(request.id, request.clone());

        debug!(id = %request.id, student_id, requester_group, "access request submitted");
        Ok(request)
    }

    /// Approve a pending request and grant consent on `ledger`
    ///
    /// If the ledger refuses the grant the request stays pending.
    pub fn approve<S: CellStore>(
        &self,
        id: Uuid,
        ledger: &ConsentLedger<S>,
    ) -> Result<AccessRequest> {
        let mut state = self.state.write();
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(format!("access request {id}")))?;
        request.ensure_pending()?;

        let receipt = ledger.grant(&request.triple())?;

        request.status = RequestStatus::Approved;
        request.approval_receipt = Some(receipt.to_string());
        request.updated_at = OffsetDateTime::now_utc();

        info!(id = %id, receipt = %receipt, "access request approved");
        Ok(request.clone())
    }

    /// Reject a pending request
    pub fn reject(&self, id: Uuid, reason: Option<&str>) -> Result<AccessRequest> {
        let mut state = self.state.write();
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(format!("access request {id}")))?;
        request.ensure_pending()?;

        request.status = RequestStatus::Rejected;
        request.reject_reason = Some(reason.unwrap_or_default().to_string());
        request.updated_at = OffsetDateTime::now_utc();

        info!(id = %id, "access request rejected");
        Ok(request.clone())
    }

    /// Look a request up by id
    pub fn get(&self, id: Uuid) -> Option<AccessRequest> {
        self.state.read().requests.get(&id).cloned()
    }

    /// Requests concerning a student, newest first
    pub fn for_student(&self, student_id: &str) -> Vec<AccessRequest> {
        self.filtered(|request| request.student_id == student_id)
    }

    /// Requests filed by a requester group, newest first
    pub fn for_requester(&self, requester_group: &str) -> Vec<AccessRequest> {
        self.filtered(|request| request.requester_group == requester_group)
    }

    fn filtered(&self, predicate: impl Fn(&AccessRequest) -> bool) -> Vec<AccessRequest> {
        let state = self.state.read();
        let mut requests: Vec<AccessRequest> = state
            .requests
            .values()
            .filter(|request| predicate(request))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_core::LogicalStatus;
    use consent_effects::MemoryCellStore;

    #[test]
    fn test_submit_defaults() {
        let book = AccessRequestBook::new();
        let request = book.submit("alice", "school-A", "academics", None).unwrap();

        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.data_group, "academics");
        assert_eq!(request.purpose, "");
        assert_eq!(book.get(request.id), Some(request));
    }

    #[test]
    fn test_submit_requires_fields() {
        let book = AccessRequestBook::new();
        let err = book.submit("alice", "  ", "grades", None).unwrap_err();
        assert!(matches!(err, LedgerError::Invalid { .. }));
    }

    #[test]
    fn test_approve_grants_consent() {
        let book = AccessRequestBook::new();
        let ledger = ConsentLedger::new(MemoryCellStore::new());
        let request = book
            .submit("alice", "school-A", "grades", Some("admissions"))
            .unwrap();

        let approved = book.approve(request.id, &ledger).unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(
            approved.approval_receipt.as_deref(),
            Some("GRANTED:alice:school-A:grades")
        );
        assert_eq!(
            ledger.get_consent("alice", "school-A", "grades").unwrap().status,
            LogicalStatus::Granted
        );
    }

    #[test]
    fn test_decided_requests_are_final() {
        let book = AccessRequestBook::new();
        let ledger = ConsentLedger::new(MemoryCellStore::new());
        let request = book.submit("alice", "school-A", "grades", None).unwrap();

        book.reject(request.id, Some("not needed")).unwrap();
        let err = book.approve(request.id, &ledger).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));
        assert!(err.to_string().contains("already rejected"));
        assert!(ledger.store().is_empty());
    }

    #[test]
    fn test_unknown_request() {
        let book = AccessRequestBook::new();
        assert!(matches!(
            book.reject(Uuid::new_v4(), None),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_approval_grants_the_submitted_key() {
        let book = AccessRequestBook::new();
        let ledger = ConsentLedger::new(MemoryCellStore::new());
        let request = book.submit("alice", "school-A", "academics", None).unwrap();

        let approved = book.approve(request.id, &ledger).unwrap();
        assert_eq!(
            approved.approval_receipt.as_deref(),
            Some("GRANTED:alice:school-A:academics")
        );
        assert_eq!(
            ledger.get_consent("alice", "school-A", "academics").unwrap().to_string(),
            "GRANTED:alice:school-A:academics"
        );
        assert_eq!(
            ledger.get_consent("alice", "school-A", "Academics").unwrap().status,
            LogicalStatus::Absent
        );
    }

    #[test]
    fn test_submit_rejects_key_separator() {
        let book = AccessRequestBook::new();
        for (student, requester, group) in [
            ("alice", "school:A", "grades"),
            ("alice", "school-A", "grades:2024"),
            ("al:ice", "school-A", "grades"),
        ] {
            let err = book.submit(student, requester, group, None).unwrap_err();
            assert!(matches!(err, LedgerError::Invalid { .. }));
        }
        assert!(book.for_student("alice").is_empty());
    }

    #[test]
    fn test_listings_newest_first() {
        let book = AccessRequestBook::new();
        let first = book.submit("alice", "school-A", "grades", None).unwrap();
        let second = book.submit("alice", "school-B", "grades", None).unwrap();
        book.submit("bob", "school-A", "grades", None).unwrap();

        let ids: Vec<Uuid> = book.for_student("alice").iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(book.for_requester("school-A").len(), 2);
    }
}
