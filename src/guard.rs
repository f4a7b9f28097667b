//! Per-visit access decision.
//!
//! Each page load is one [`Visit`] walking a fixed path:
//! `Uninitialized -> DirectoryLoading -> Deciding -> {Allowed, Redirecting}`.
//! Public paths short-circuit to Allowed without touching the directory. For
//! protected paths the directory load strictly precedes the decision, and
//! the terminal outcome is recorded on the visit once: re-evaluating returns
//! the recorded outcome instead of constructing a second redirect.
//!
//! Nothing in here returns an error to the caller. A page decision that
//! throws would strand the visitor on a broken page; every failure folds
//! into either the redirect or the soft-fail policy.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::config::GateConfig;
use crate::directory::{DirectoryProvider, Role, UserRecord};
use crate::session::{Session, SessionStore};

/// Where a visit currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Uninitialized,
    DirectoryLoading,
    Deciding,
    Allowed,
    Redirecting,
}

/// Why a visit was sent to the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NoSession,
    UnknownUser,
    InactiveAccount,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NoSession => "no_session",
            DenyReason::UnknownUser => "unknown_user",
            DenyReason::InactiveAccount => "inactive_account",
        }
    }

    /// Query flag appended to the login redirect. Only the inactive case is
    /// surfaced; the login page tells a paused member why they bounced, and
    /// stays quiet about codes it has never heard of.
    pub fn query_flag(&self) -> Option<&'static str> {
        match self {
            DenyReason::InactiveAccount => Some("inactive"),
            DenyReason::NoSession | DenyReason::UnknownUser => None,
        }
    }
}

/// The member a visit resolved to, as exposed to the admitted page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateUser {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub entitlement: Option<String>,
    /// True when resolved against a loaded directory; false when admitted by
    /// the soft-fail policy from the session echo alone.
    pub verified: bool,
}

impl GateUser {
    pub(crate) fn from_record(rec: &UserRecord) -> Self {
        GateUser {
            id: rec.id.clone(),
            display_name: rec.display_name.clone(),
            email: rec.email.clone(),
            role: rec.role,
            entitlement: rec.entitlement.clone(),
            verified: true,
        }
    }

    pub(crate) fn from_session_echo(session: &Session) -> Self {
        GateUser {
            id: session.user_id.clone(),
            display_name: session.display_name.clone(),
            email: (!session.email.trim().is_empty()).then(|| session.email.clone()),
            role: Role::normalize(&session.role),
            entitlement: None,
            verified: false,
        }
    }
}

/// Terminal result of a visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Outcome {
    /// Render the page. `user` is None on public paths, where no directory
    /// work happened.
    Allowed { user: Option<GateUser> },
    /// Navigate to `location` instead of rendering.
    Redirect { location: String, reason: DenyReason },
}

impl Outcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed { .. })
    }

    pub fn user(&self) -> Option<&GateUser> {
        match self {
            Outcome::Allowed { user } => user.as_ref(),
            Outcome::Redirect { .. } => None,
        }
    }
}

/// One page load. Holds the requested path and, once decided, the recorded
/// terminal outcome for the rest of the visit's lifetime.
pub struct Visit {
    id: Uuid,
    path: String,
    state: Mutex<VisitState>,
    decided: OnceCell<Outcome>,
}

impl Visit {
    pub fn new(path: impl Into<String>) -> Self {
        Visit {
            id: Uuid::new_v4(),
            path: path.into(),
            state: Mutex::new(VisitState::Uninitialized),
            decided: OnceCell::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> VisitState {
        *self.state.lock()
    }

    /// The recorded outcome, if the visit has been decided.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.decided.get()
    }

    /// The resolved member on an allowed visit. Narrow accessor for page
    /// code; everything else should take the whole outcome.
    pub fn user(&self) -> Option<GateUser> {
        self.decided.get().and_then(|o| o.user().cloned())
    }

    fn enter(&self, state: VisitState) {
        *self.state.lock() = state;
    }

    fn settle(&self, outcome: Outcome) -> Outcome {
        let settled = self.decided.get_or_init(|| outcome).clone();
        self.enter(match settled {
            Outcome::Allowed { .. } => VisitState::Allowed,
            Outcome::Redirect { .. } => VisitState::Redirecting,
        });
        settled
    }
}

/// Build the login redirect target: original path URL-encoded into the
/// `redirect` parameter, plus the reason flag when the reason carries one.
pub fn redirect_location(login_path: &str, original_path: &str, reason: DenyReason) -> String {
    let mut location = format!("{login_path}?redirect={}", urlencoding::encode(original_path));
    if let Some(flag) = reason.query_flag() {
        location.push_str("&reason=");
        location.push_str(flag);
    }
    location
}

/// Run the decision procedure for one visit. Infallible by construction.
pub(crate) async fn decide(
    cfg: &GateConfig,
    provider: &dyn DirectoryProvider,
    store: &SessionStore,
    visit: &Visit,
) -> Outcome {
    if let Some(prior) = visit.outcome() {
        tracing::debug!(target: "gate", visit = %visit.id(), "visit already decided; returning recorded outcome");
        return prior.clone();
    }

    if cfg.is_public(visit.path()) {
        tracing::debug!(target: "gate", visit = %visit.id(), path = %visit.path(), "public path admitted");
        return visit.settle(Outcome::Allowed { user: None });
    }

    visit.enter(VisitState::DirectoryLoading);
    let directory = match provider.load().await {
        Ok(dir) => Some(dir),
        Err(err) => {
            let fallback = provider.snapshot();
            tracing::warn!(
                target: "gate",
                visit = %visit.id(),
                source = provider.source(),
                error = %err,
                snapshot = fallback.is_some(),
                "directory load failed"
            );
            fallback
        }
    };

    visit.enter(VisitState::Deciding);
    let session = store.get();

    let outcome = match (&directory, &session) {
        (_, None) => deny(cfg, visit, DenyReason::NoSession),
        (Some(dir), Some(session)) => match dir.lookup(&session.user_id) {
            None => deny(cfg, visit, DenyReason::UnknownUser),
            Some(rec) if !rec.is_active() => deny(cfg, visit, DenyReason::InactiveAccount),
            Some(rec) => allow(visit, GateUser::from_record(rec)),
        },
        (None, Some(session)) => {
            // Soft-fail: the directory cannot be consulted at all. A session
            // that names somebody is honored unverified; forcing a logout
            // here would lock every member out along with the directory.
            if session.identifies_someone() && !session.display_name.trim().is_empty() {
                tracing::info!(
                    target: "gate",
                    visit = %visit.id(),
                    user = %session.user_id,
                    "directory unavailable; admitting existing session unverified"
                );
                allow(visit, GateUser::from_session_echo(session))
            } else {
                deny(cfg, visit, DenyReason::NoSession)
            }
        }
    };
    visit.settle(outcome)
}

fn allow(visit: &Visit, user: GateUser) -> Outcome {
    tracing::debug!(target: "gate", visit = %visit.id(), path = %visit.path(), user = %user.id, verified = user.verified, "admitted");
    Outcome::Allowed { user: Some(user) }
}

fn deny(cfg: &GateConfig, visit: &Visit, reason: DenyReason) -> Outcome {
    let location = redirect_location(&cfg.login_path, visit.path(), reason);
    tracing::info!(
        target: "gate",
        visit = %visit.id(),
        path = %visit.path(),
        reason = reason.as_str(),
        "redirecting to login"
    );
    Outcome::Redirect { location, reason }
}
