//! Durable visit session: one JSON record under the state directory.
//!
//! The record identifies who logged in on this client and when. It carries
//! no secret and grants nothing by itself; the guard re-verifies it against
//! the directory on every protected page. Concurrent processes sharing a
//! state directory overwrite each other last-write-wins, and nothing
//! notifies the loser. A cleared session in one process is only noticed by
//! another on its next page decision.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::UserRecord;
use crate::error::{GateError, GateResult};
use crate::paths;

/// The persisted login record. `email` and `role` are echoes captured at
/// login time for display while offline; the directory stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    pub logged_in_at: DateTime<Utc>,
}

impl Session {
    /// A record without a user id identifies nobody.
    pub fn identifies_someone(&self) -> bool {
        !self.user_id.trim().is_empty()
    }
}

/// File-backed store under a state directory.
pub struct SessionStore {
    state_dir: PathBuf,
}

impl SessionStore {
    /// Open (and create if needed) the state directory.
    pub fn open(state_dir: impl Into<PathBuf>) -> GateResult<Self> {
        let state_dir = state_dir.into();
        fs::create_dir_all(&state_dir).map_err(|e| {
            GateError::storage(format!("cannot create state dir {}: {e}", state_dir.display()))
        })?;
        Ok(SessionStore { state_dir })
    }

    pub fn path(&self) -> PathBuf {
        paths::session_file(&self.state_dir)
    }

    /// Current session, or None. A missing file, unreadable JSON or an empty
    /// user id all read back as "no session" rather than an error; the guard
    /// must keep deciding pages whatever state the disk is in.
    pub fn get(&self) -> Option<Session> {
        let path = self.path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(target: "session", path = %path.display(), error = %e, "session file unreadable");
                return None;
            }
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) if session.identifies_someone() => Some(session),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(target: "session", path = %path.display(), error = %e, "session file corrupt; treating as logged out");
                None
            }
        }
    }

    /// Record a login from bare identifiers, stamped now.
    pub fn login(&self, user_id: &str, display_name: &str) -> GateResult<Session> {
        let session = Session {
            user_id: user_id.trim().to_string(),
            display_name: display_name.trim().to_string(),
            email: String::new(),
            role: String::new(),
            logged_in_at: Utc::now(),
        };
        self.persist(&session)?;
        Ok(session)
    }

    /// Record a login from a resolved directory record, carrying its echoes.
    pub fn login_record(&self, rec: &UserRecord) -> GateResult<Session> {
        let session = Session {
            user_id: rec.id.clone(),
            display_name: rec.display_name.clone(),
            email: rec.email.clone().unwrap_or_default(),
            role: rec.role.to_string(),
            logged_in_at: Utc::now(),
        };
        self.persist(&session)?;
        Ok(session)
    }

    /// Forget the session. Pure data operation; any navigation to the login
    /// page is composed by the caller.
    pub fn clear(&self) -> GateResult<()> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(target: "session", "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GateError::storage(format!(
                "cannot remove {}: {e}",
                path.display()
            ))),
        }
    }

    /// Write the whole record, then rename into place so a concurrent reader
    /// never observes a torn file.
    fn persist(&self, session: &Session) -> GateResult<()> {
        let tmp = paths::session_file_tmp(&self.state_dir);
        let path = self.path();
        let body = serde_json::to_vec_pretty(session)
            .map_err(|e| GateError::storage(format!("cannot encode session: {e}")))?;
        fs::write(&tmp, body)
            .map_err(|e| GateError::storage(format!("cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path).map_err(|e| {
            GateError::storage(format!("cannot move session into place at {}: {e}", path.display()))
        })?;
        tracing::debug!(target: "session", user = %session.user_id, "session persisted");
        Ok(())
    }
}
