//! The gate context object: owns config, directory provider and session
//! store, and is passed explicitly to whoever decides pages. No global
//! state; two gates with different configs coexist in one process.

use std::sync::Arc;

use crate::config::GateConfig;
use crate::directory::{build_provider, DirectoryProvider};
use crate::error::{GateError, GateResult};
use crate::guard::{decide, Outcome, Visit};
use crate::session::{Session, SessionStore};

pub struct Gate {
    config: GateConfig,
    provider: Arc<dyn DirectoryProvider>,
    store: SessionStore,
}

impl Gate {
    /// Validate the config and wire up the provider it selects plus the
    /// session store under its state directory.
    pub fn new(config: GateConfig) -> GateResult<Self> {
        config.validate()?;
        let provider = build_provider(&config)?;
        let store = SessionStore::open(&config.state_dir)?;
        tracing::info!(
            target: "gate",
            source = provider.source(),
            state_dir = %config.state_dir.display(),
            "gate ready"
        );
        Ok(Gate { config, provider, store })
    }

    /// Wire a gate around a caller-supplied provider. Directory-source
    /// settings in the config are moot here, so only the guard-facing parts
    /// of it are checked.
    pub fn with_provider(
        config: GateConfig,
        provider: Arc<dyn DirectoryProvider>,
    ) -> GateResult<Self> {
        if !config.login_path.starts_with('/') {
            return Err(GateError::config(format!(
                "login path must be site-absolute, got '{}'",
                config.login_path
            )));
        }
        let store = SessionStore::open(&config.state_dir)?;
        Ok(Gate { config, provider, store })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn DirectoryProvider {
        self.provider.as_ref()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Start a visit for a page path. Each page load gets its own visit.
    pub fn begin_visit(&self, path: impl Into<String>) -> Visit {
        Visit::new(path)
    }

    /// Decide a visit. Never fails: every internal failure folds into the
    /// redirect or soft-fail policy. Deciding an already-decided visit
    /// returns its recorded outcome.
    pub async fn evaluate(&self, visit: &Visit) -> Outcome {
        decide(&self.config, self.provider.as_ref(), &self.store, visit).await
    }

    /// Resolve a member code against the directory and record the session.
    ///
    /// Login is where strictness pays: with the directory unreachable and no
    /// snapshot to fall back on, this fails rather than minting a session
    /// for a code nobody could check.
    pub async fn login(&self, id: &str) -> GateResult<Session> {
        let id = id.trim();
        if id.is_empty() {
            return Err(GateError::config("member code must not be empty"));
        }
        let directory = match self.provider.load().await {
            Ok(dir) => dir,
            Err(err) => match self.provider.snapshot() {
                Some(dir) => {
                    tracing::warn!(target: "gate", error = %err, "directory load failed; authenticating against snapshot");
                    dir
                }
                None => return Err(err.into()),
            },
        };
        let rec = directory
            .lookup(id)
            .ok_or_else(|| GateError::UnknownUser { id: id.to_string() })?;
        if !rec.is_active() {
            return Err(GateError::InactiveAccount {
                id: rec.id.clone(),
                status: rec.status.to_string(),
            });
        }
        let session = self.store.login_record(rec)?;
        tracing::info!(target: "session", user = %session.user_id, "login recorded");
        Ok(session)
    }

    /// Clear the session and hand back the login path for the caller to
    /// navigate to. The data half and the navigation half of logout are
    /// deliberately separate operations.
    pub fn logout(&self) -> GateResult<String> {
        self.store.clear()?;
        Ok(self.config.login_path.clone())
    }

    /// Current persisted session, if any.
    pub fn session(&self) -> Option<Session> {
        self.store.get()
    }
}
