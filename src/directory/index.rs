//! Validated in-memory directory index.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::record::{fold_name, UserRecord};
use super::DirectoryError;

/// An immutable, validated snapshot of the member directory.
///
/// Built once per load and shared behind `Arc`. The id index is
/// authoritative. The name index exists solely for reconciling legacy roster
/// rows that predate member codes; display names that collide within a
/// snapshot are excluded from it rather than guessed at.
#[derive(Debug)]
pub struct Directory {
    by_id: HashMap<String, UserRecord>,
    by_name: HashMap<String, String>,
    built_at: DateTime<Utc>,
}

impl Directory {
    /// Validate and index a batch of normalized records.
    ///
    /// Duplicate member codes abort the build: two people must never share a
    /// code, and silently shadowing one of them would hide the corruption.
    pub fn build(records: Vec<UserRecord>) -> Result<Self, DirectoryError> {
        let mut by_id: HashMap<String, UserRecord> = HashMap::with_capacity(records.len());
        let mut by_name: HashMap<String, String> = HashMap::with_capacity(records.len());
        let mut ambiguous: HashSet<String> = HashSet::new();

        for rec in records {
            let id = rec.id.clone();
            let key = rec.name_key();
            if by_id.insert(id.clone(), rec).is_some() {
                return Err(DirectoryError::DuplicateId { id });
            }
            if key.is_empty() || ambiguous.contains(&key) {
                continue;
            }
            match by_name.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
                Entry::Occupied(slot) => {
                    let (key, _) = slot.remove_entry();
                    tracing::debug!(target: "directory", name = %key, "display name is ambiguous; excluded from name index");
                    ambiguous.insert(key);
                }
            }
        }

        Ok(Directory { by_id, by_name, built_at: Utc::now() })
    }

    pub fn lookup(&self, id: &str) -> Option<&UserRecord> {
        self.by_id.get(id.trim())
    }

    /// Legacy reconciliation lookup by folded display name. Names that
    /// collide in this snapshot resolve to nothing.
    pub fn lookup_name(&self, name: &str) -> Option<&UserRecord> {
        let key = fold_name(name);
        if key.is_empty() {
            return None;
        }
        self.by_name.get(&key).and_then(|id| self.by_id.get(id))
    }

    /// Reconcile a legacy roster against this snapshot.
    ///
    /// Every roster row must agree with the directory: matched by code with
    /// no field drift, or (for rows whose code is gone) matched by name to
    /// the same member. Any disagreement fails the whole load so the operator
    /// reconciles the sources; nothing picks a winner silently. Members that
    /// exist only in this snapshot are growth, not conflicts.
    pub fn cross_check(&self, roster: &[UserRecord]) -> Result<(), DirectoryError> {
        let mut drifted: Vec<String> = Vec::new();
        let mut mismatched: Vec<String> = Vec::new();
        let mut missing: Vec<String> = Vec::new();

        for legacy in roster {
            if let Some(current) = self.lookup(&legacy.id) {
                if records_drift(legacy, current) {
                    drifted.push(legacy.id.clone());
                }
            } else if let Some(named) = self.lookup_name(&legacy.display_name) {
                mismatched.push(format!("{} vs {}", legacy.id, named.id));
            } else {
                missing.push(legacy.id.clone());
            }
        }

        if drifted.is_empty() && mismatched.is_empty() && missing.is_empty() {
            return Ok(());
        }
        let mut parts: Vec<String> = Vec::new();
        if !drifted.is_empty() {
            parts.push(format!("drifted fields for codes [{}]", drifted.join(", ")));
        }
        if !mismatched.is_empty() {
            parts.push(format!("code/name mismatches [{}]", mismatched.join(", ")));
        }
        if !missing.is_empty() {
            parts.push(format!("codes missing from the live table [{}]", missing.join(", ")));
        }
        Err(DirectoryError::SourceConflict { detail: parts.join("; ") })
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn records(&self) -> impl Iterator<Item = &UserRecord> {
        self.by_id.values()
    }
}

/// Identity fields the reconciliation compares. Email and entitlement are
/// enrichment data and may legitimately exist on only one side.
fn records_drift(a: &UserRecord, b: &UserRecord) -> bool {
    a.name_key() != b.name_key() || a.status != b.status || a.role != b.role
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{AccountStatus, Role};

    fn rec(id: &str, name: &str, status: AccountStatus, role: Role) -> UserRecord {
        UserRecord {
            id: id.into(),
            display_name: name.into(),
            email: None,
            status,
            role,
            entitlement: None,
        }
    }

    fn active(id: &str, name: &str) -> UserRecord {
        rec(id, name, AccountStatus::Active, Role::BetaTester)
    }

    #[test]
    fn lookup_trims_and_matches_codes() {
        let dir = Directory::build(vec![active("1001", "Joshua Serrano")]).unwrap();
        assert_eq!(dir.lookup(" 1001 ").map(|r| r.display_name.as_str()), Some("Joshua Serrano"));
        assert!(dir.lookup("9999").is_none());
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn duplicate_codes_abort_the_build() {
        let err = Directory::build(vec![active("1001", "A"), active("1001", "B")]).unwrap_err();
        assert_eq!(err, DirectoryError::DuplicateId { id: "1001".into() });
    }

    #[test]
    fn ambiguous_names_are_excluded_from_the_name_index() {
        let dir = Directory::build(vec![
            active("1001", "Dana Cruz"),
            active("1002", "dana cruz"),
            active("1003", "Ines Walker"),
        ])
        .unwrap();
        assert!(dir.lookup_name("Dana Cruz").is_none());
        assert_eq!(dir.lookup_name("INES WALKER").map(|r| r.id.as_str()), Some("1003"));
        // Codes stay authoritative either way.
        assert!(dir.lookup("1001").is_some());
        assert!(dir.lookup("1002").is_some());
    }

    #[test]
    fn cross_check_accepts_matching_sources_and_remote_growth() {
        let dir = Directory::build(vec![
            active("1001", "Joshua Serrano"),
            active("1002", "Ines Walker"),
            active("1003", "New Member"),
        ])
        .unwrap();
        let roster = vec![active("1001", "JOSHUA SERRANO"), active("1002", "Ines Walker")];
        assert!(dir.cross_check(&roster).is_ok());
    }

    #[test]
    fn cross_check_reports_drift_mismatch_and_missing() {
        let dir = Directory::build(vec![
            rec("1001", "Joshua Serrano", AccountStatus::Inactive, Role::BetaTester),
            active("2002", "Ines Walker"),
        ])
        .unwrap();
        let roster = vec![
            active("1001", "Joshua Serrano"), // status drifted
            active("1002", "Ines Walker"),    // same person, re-keyed remotely
            active("1005", "Gone Person"),    // absent remotely
        ];
        let err = dir.cross_check(&roster).unwrap_err();
        match err {
            DirectoryError::SourceConflict { detail } => {
                assert!(detail.contains("1001"), "drift code listed: {detail}");
                assert!(detail.contains("1002 vs 2002"), "mismatch pair listed: {detail}");
                assert!(detail.contains("1005"), "missing code listed: {detail}");
            }
            other => panic!("expected SourceConflict, got {other:?}"),
        }
    }
}
