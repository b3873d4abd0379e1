//! Identifier fields and composite key derivation
//!
//! A consent cell is addressed by the concatenation of three opaque
//! identifiers joined with [`KEY_SEPARATOR`]. Derivation itself never fails;
//! whether identifiers containing the separator are admitted is decided by
//! [`SeparatorPolicy`] before a key is derived.

use crate::errors::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between identifier fields in a composite key
pub const KEY_SEPARATOR: char = ':';

/// How identifiers containing [`KEY_SEPARATOR`] are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparatorPolicy {
    /// Identifiers containing the separator are rejected; keys are injective
    #[default]
    Reject,
    /// Identifiers are concatenated as-is; distinct triples may alias
    Permit,
}

impl SeparatorPolicy {
    /// Parse a policy name as used in configuration files and environment
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "permit" => Ok(Self::Permit),
            other => Err(LedgerError::invalid(format!(
                "unknown separator policy '{other}', expected 'reject' or 'permit'"
            ))),
        }
    }
}

/// The (student, receiver-group, data-group) triple a consent cell belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsentTriple {
    /// Student whose data is shared
    #[serde(alias = "studentId")]
    pub student_id: String,
    /// Group receiving the data
    #[serde(alias = "receiverGroup")]
    pub receiver_group: String,
    /// Group of data being shared
    #[serde(alias = "dataGroup")]
    pub data_group: String,
}

impl ConsentTriple {
    /// Create a triple from its three identifiers
    pub fn new(
        student_id: impl Into<String>,
        receiver_group: impl Into<String>,
        data_group: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            receiver_group: receiver_group.into(),
            data_group: data_group.into(),
        }
    }

    /// Check the identifiers against a separator policy
    ///
    /// Empty identifiers are accepted under every policy.
    pub fn validate(&self, policy: SeparatorPolicy) -> Result<()> {
        if policy == SeparatorPolicy::Permit {
            return Ok(());
        }

        for (field, value) in self.fields() {
            if value.contains(KEY_SEPARATOR) {
                return Err(LedgerError::invalid(format!(
                    "{field} '{value}' contains the key separator '{KEY_SEPARATOR}'"
                )));
            }
        }
        Ok(())
    }

    /// Composite key addressing this triple's consent cell
    pub fn composite_key(&self) -> CompositeKey {
        derive_key(&self.student_id, &self.receiver_group, &self.data_group)
    }

    fn fields(&self) -> [(&'static str, &str); 3] {
        [
            ("student_id", self.student_id.as_str()),
            ("receiver_group", self.receiver_group.as_str()),
            ("data_group", self.data_group.as_str()),
        ]
    }
}

/// Canonical key addressing one consent cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
    /// Wrap an already-derived key, e.g. one read back from persisted storage
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by every key belonging to `student_id`
    pub fn student_prefix(student_id: &str) -> String {
        format!("{student_id}{KEY_SEPARATOR}")
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CompositeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the composite key for a triple
///
/// Pure and total. Every operation handler resolves its cell through this
/// function so that grant, revoke and query agree on the address.
pub fn derive_key(student_id: &str, receiver_group: &str, data_group: &str) -> CompositeKey {
    let mut key =
        String::with_capacity(student_id.len() + receiver_group.len() + data_group.len() + 2);
    key.push_str(student_id);
    key.push(KEY_SEPARATOR);
    key.push_str(receiver_group);
    key.push(KEY_SEPARATOR);
    key.push_str(data_group);
    CompositeKey(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derive_key_format() {
        let key = derive_key("alice", "school-A", "grades");
        assert_eq!(key.as_str(), "alice:school-A:grades");
        assert_eq!(key.to_string(), "alice:school-A:grades");
    }

    #[test]
    fn test_empty_fields_are_accepted() {
        let triple = ConsentTriple::new("", "", "");
        assert!(triple.validate(SeparatorPolicy::Reject).is_ok());
        assert_eq!(triple.composite_key().as_str(), "::");
    }

    #[test]
    fn test_separator_aliasing_under_permit() {
        let left = ConsentTriple::new("a:b", "c", "d");
        let right = ConsentTriple::new("a", "b:c", "d");

        assert!(left.validate(SeparatorPolicy::Permit).is_ok());
        assert!(right.validate(SeparatorPolicy::Permit).is_ok());
        assert_eq!(left.composite_key(), right.composite_key());
        assert_eq!(left.composite_key().as_str(), "a:b:c:d");
    }

    #[test]
    fn test_separator_rejected_under_reject() {
        let err = ConsentTriple::new("a", "b:c", "d")
            .validate(SeparatorPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Invalid { .. }));
        assert!(err.to_string().contains("receiver_group"));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(SeparatorPolicy::parse("Reject").unwrap(), SeparatorPolicy::Reject);
        assert_eq!(SeparatorPolicy::parse(" permit ").unwrap(), SeparatorPolicy::Permit);
        assert!(SeparatorPolicy::parse("escape").is_err());
    }

    fn identifier() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_. -]{0,12}"
    }

    proptest! {
        #[test]
        fn derive_key_is_deterministic(s in identifier(), r in identifier(), d in identifier()) {
            prop_assert_eq!(derive_key(&s, &r, &d), derive_key(&s, &r, &d));
        }

        #[test]
        fn derive_key_is_injective_without_separator(
            a in (identifier(), identifier(), identifier()),
            b in (identifier(), identifier(), identifier()),
        ) {
            let ka = derive_key(&a.0, &a.1, &a.2);
            let kb = derive_key(&b.0, &b.1, &b.2);
            prop_assert_eq!(a == b, ka == kb);
        }
    }
}
