//! Unified gate error model and mapping helpers.
//! This module provides the common error enum shared by the library surface
//! (gate-level login/logout, configuration, session storage) and the CLI,
//! along with the stable string codes the login page and tooling key off.

use serde::{Deserialize, Serialize};

use crate::directory::DirectoryError;

/// Error taxonomy for gate operations.
///
/// The first three variants mirror the guard's deny reasons; the rest cover
/// the ambient failure modes (directory refresh, configuration, persistence).
/// `DirectoryUnavailable` is the only soft failure: guard policy allows an
/// existing session through when the directory cannot be refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateError {
    #[error("no session is present")]
    NoSession,
    #[error("member code {id} is not present in the directory")]
    UnknownUser { id: String },
    #[error("member {id} is not active (status: {status})")]
    InactiveAccount { id: String, status: String },
    #[error("directory unavailable: {detail}")]
    DirectoryUnavailable { detail: String },
    #[error("configuration error: {detail}")]
    Config { detail: String },
    #[error("session storage error: {detail}")]
    Storage { detail: String },
}

impl GateError {
    pub fn config<S: Into<String>>(detail: S) -> Self {
        GateError::Config { detail: detail.into() }
    }

    pub fn storage<S: Into<String>>(detail: S) -> Self {
        GateError::Storage { detail: detail.into() }
    }

    pub fn directory<S: Into<String>>(detail: S) -> Self {
        GateError::DirectoryUnavailable { detail: detail.into() }
    }

    /// Stable machine code, used in `--json` output and log fields.
    pub fn code_str(&self) -> &'static str {
        match self {
            GateError::NoSession => "no_session",
            GateError::UnknownUser { .. } => "unknown_user",
            GateError::InactiveAccount { .. } => "inactive_account",
            GateError::DirectoryUnavailable { .. } => "directory_unavailable",
            GateError::Config { .. } => "config_error",
            GateError::Storage { .. } => "storage_error",
        }
    }

    /// Map to a CLI process exit code. 0 and 1 are reserved for the
    /// allowed/redirect decision outcomes, 2 for usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            GateError::Config { .. } => 2,
            GateError::NoSession => 3,
            GateError::UnknownUser { .. } => 4,
            GateError::InactiveAccount { .. } => 5,
            GateError::DirectoryUnavailable { .. } => 6,
            GateError::Storage { .. } => 7,
        }
    }

    /// True for failures the guard treats as non-fatal (soft-fail policy:
    /// an unreachable directory never forces an existing session out).
    pub fn is_soft(&self) -> bool {
        matches!(self, GateError::DirectoryUnavailable { .. })
    }
}

impl From<DirectoryError> for GateError {
    fn from(err: DirectoryError) -> Self {
        // Guard policy folds every directory failure, expected or not,
        // into "cannot refresh right now".
        GateError::DirectoryUnavailable { detail: err.to_string() }
    }
}

pub type GateResult<T> = Result<T, GateError>;
