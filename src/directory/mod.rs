//! Member directory: records, the validated index, and the providers that
//! load it from a roster file or a remote table.

mod index;
mod provider;
mod record;
#[cfg(feature = "remote")]
mod remote;

pub use index::Directory;
pub use provider::{build_provider, DirectoryProvider, StaticDirectory};
pub use record::{AccountStatus, Role, UserRecord};
#[cfg(feature = "remote")]
pub use remote::RemoteDirectory;

/// Failures raised while loading or validating a directory source.
///
/// Every variant folds into the gate's soft-fail policy at the guard seam;
/// the distinctions matter to the `validate` tooling and the logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory source unreachable: {0}")]
    Unreachable(String),
    #[error("malformed directory payload: {0}")]
    Malformed(String),
    #[error("duplicate member code {id} in directory source")]
    DuplicateId { id: String },
    #[error("roster reconciliation failed: {detail}")]
    SourceConflict { detail: String },
    #[error("roster file {path}: {detail}")]
    Roster { path: String, detail: String },
}
