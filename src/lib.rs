pub mod config;
pub mod directory;
pub mod error;
pub mod gate;
pub mod guard;
pub mod paths;
pub mod session;

pub use config::{DirectorySource, GateConfig};
#[cfg(feature = "remote")]
pub use directory::RemoteDirectory;
pub use directory::{
    build_provider, AccountStatus, Directory, DirectoryError, DirectoryProvider, Role,
    StaticDirectory, UserRecord,
};
pub use error::{GateError, GateResult};
pub use gate::Gate;
pub use guard::{redirect_location, DenyReason, GateUser, Outcome, Visit, VisitState};
pub use session::{Session, SessionStore};
