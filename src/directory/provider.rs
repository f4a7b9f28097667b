//! Directory provider seam and the roster-file implementation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{DirectorySource, GateConfig};
use crate::error::{GateError, GateResult};

use super::index::Directory;
use super::record::{AccountStatus, Role, UserRecord};
use super::DirectoryError;

/// Source of member records behind the guard.
///
/// `load` produces a fresh validated snapshot or fails. Implementations keep
/// their last good snapshot so a failed refresh never erases what the gate
/// already knew.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    async fn load(&self) -> Result<Arc<Directory>, DirectoryError>;

    /// Last successfully loaded snapshot, if any.
    fn snapshot(&self) -> Option<Arc<Directory>>;

    /// Short source label for log fields.
    fn source(&self) -> &'static str;
}

/// Roster-file directory: parsed and validated once at construction, after
/// which loads are infallible.
#[derive(Debug)]
pub struct StaticDirectory {
    path: PathBuf,
    current: Arc<Directory>,
}

impl StaticDirectory {
    pub fn from_file(path: &Path) -> Result<Self, DirectoryError> {
        let records = load_roster(path)?;
        let dir = Directory::build(records)?;
        tracing::info!(target: "directory", path = %path.display(), members = dir.len(), "roster loaded");
        Ok(StaticDirectory { path: path.to_path_buf(), current: Arc::new(dir) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DirectoryProvider for StaticDirectory {
    async fn load(&self) -> Result<Arc<Directory>, DirectoryError> {
        Ok(self.current.clone())
    }

    fn snapshot(&self) -> Option<Arc<Directory>> {
        Some(self.current.clone())
    }

    fn source(&self) -> &'static str {
        "static"
    }
}

/// Construct the provider the config selects. Expects a validated config;
/// missing source settings still come back as config errors, not panics.
pub fn build_provider(cfg: &GateConfig) -> GateResult<Arc<dyn DirectoryProvider>> {
    match cfg.directory {
        DirectorySource::Static => {
            let path = cfg
                .roster_file
                .as_deref()
                .ok_or_else(|| GateError::config("static directory requires a roster file"))?;
            Ok(Arc::new(StaticDirectory::from_file(path)?))
        }
        DirectorySource::Remote => {
            #[cfg(feature = "remote")]
            {
                let url = cfg
                    .remote_url
                    .clone()
                    .ok_or_else(|| GateError::config("remote directory requires a url"))?;
                let token = cfg
                    .remote_token
                    .clone()
                    .ok_or_else(|| GateError::config("remote directory requires a token"))?;
                // A roster configured alongside the remote table is the
                // legacy reference every fetch reconciles against.
                let roster = match cfg.roster_file.as_deref() {
                    Some(p) => Some(load_roster(p)?),
                    None => None,
                };
                let provider =
                    super::remote::RemoteDirectory::new(url, token, cfg.fetch_timeout, roster)?;
                Ok(Arc::new(provider))
            }
            #[cfg(not(feature = "remote"))]
            {
                Err(GateError::config(
                    "this build carries no remote directory support (enable the 'remote' feature)",
                ))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RosterEntry {
    id: String,
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    entitlement: Option<String>,
}

/// Read and normalize a roster file. Operator-authored, so it is held to a
/// stricter standard than the remote table: an entry without an id or name
/// fails the whole file instead of being skipped.
pub(crate) fn load_roster(path: &Path) -> Result<Vec<UserRecord>, DirectoryError> {
    let shown = path.display().to_string();
    let raw = fs::read_to_string(path)
        .map_err(|e| DirectoryError::Roster { path: shown.clone(), detail: e.to_string() })?;
    let entries: Vec<RosterEntry> = serde_json::from_str(&raw)
        .map_err(|e| DirectoryError::Roster { path: shown.clone(), detail: e.to_string() })?;

    let mut records = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let id = entry.id.trim().to_string();
        let name = entry.name.trim().to_string();
        if id.is_empty() || name.is_empty() {
            return Err(DirectoryError::Roster {
                path: shown,
                detail: format!("entry {i} is missing an id or name"),
            });
        }
        records.push(UserRecord {
            id,
            display_name: name,
            email: entry.email.filter(|s| !s.trim().is_empty()),
            status: entry
                .status
                .as_deref()
                .map(AccountStatus::normalize)
                .unwrap_or(AccountStatus::Active),
            role: entry.role.as_deref().map(Role::normalize).unwrap_or(Role::BetaTester),
            entitlement: entry.entitlement.filter(|s| !s.trim().is_empty()),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn roster_file(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[tokio::test]
    async fn static_provider_loads_and_snapshots() {
        let f = roster_file(
            r#"[{"id": "1001", "name": "Joshua Serrano", "email": "js@example.com",
                 "status": "active", "role": "admin", "entitlement": "full-kit"}]"#,
        );
        let provider = StaticDirectory::from_file(f.path()).unwrap();
        let dir = provider.load().await.unwrap();
        let rec = dir.lookup("1001").unwrap();
        assert_eq!(rec.display_name, "Joshua Serrano");
        assert_eq!(rec.role, Role::Admin);
        assert!(rec.is_active());
        assert!(provider.snapshot().is_some());
        assert_eq!(provider.source(), "static");
    }

    #[test]
    fn roster_defaults_apply_to_omitted_fields() {
        let f = roster_file(r#"[{"id": "7", "name": "Quiet Member"}]"#);
        let records = load_roster(f.path()).unwrap();
        assert_eq!(records[0].status, AccountStatus::Active);
        assert_eq!(records[0].role, Role::BetaTester);
        assert!(records[0].email.is_none());
        assert!(records[0].entitlement.is_none());
    }

    #[test]
    fn roster_entry_without_identity_fails_the_file() {
        let f = roster_file(r#"[{"id": "  ", "name": "Nobody"}]"#);
        let err = load_roster(f.path()).unwrap_err();
        assert!(matches!(err, DirectoryError::Roster { .. }), "got {err:?}");
    }

    #[test]
    fn duplicate_roster_codes_fail_construction() {
        let f = roster_file(r#"[{"id": "1", "name": "A"}, {"id": "1", "name": "B"}]"#);
        let err = StaticDirectory::from_file(f.path()).unwrap_err();
        assert_eq!(err, DirectoryError::DuplicateId { id: "1".into() });
    }

    #[test]
    fn missing_roster_file_is_a_roster_error() {
        let err = load_roster(Path::new("/nonexistent/roster.json")).unwrap_err();
        assert!(matches!(err, DirectoryError::Roster { .. }));
    }
}
