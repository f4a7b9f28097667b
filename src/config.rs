//! Gate configuration: environment variables with compiled-in defaults.
//!
//! Everything the gate needs is carried by one [`GateConfig`] value built at
//! startup; nothing reads the environment after construction. Binaries layer
//! command-line flags on top by mutating the parsed config before
//! [`GateConfig::validate`] runs.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{GateError, GateResult};
use crate::paths;

pub const ENV_DIRECTORY: &str = "VESTIBULE_DIRECTORY";
pub const ENV_ROSTER_FILE: &str = "VESTIBULE_ROSTER_FILE";
pub const ENV_DIRECTORY_URL: &str = "VESTIBULE_DIRECTORY_URL";
pub const ENV_DIRECTORY_TOKEN: &str = "VESTIBULE_DIRECTORY_TOKEN";
pub const ENV_FETCH_TIMEOUT_MS: &str = "VESTIBULE_FETCH_TIMEOUT_MS";
pub const ENV_STATE_DIR: &str = "VESTIBULE_STATE_DIR";
pub const ENV_LOGIN_PATH: &str = "VESTIBULE_LOGIN_PATH";
pub const ENV_PUBLIC_PATHS: &str = "VESTIBULE_PUBLIC_PATHS";
pub const ENV_PUBLIC_EXACT: &str = "VESTIBULE_PUBLIC_EXACT";

pub const DEFAULT_LOGIN_PATH: &str = "/login.html";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 4000;

/// Substring entries of the public allow-list. A protected site keeps its
/// login, recovery and screening pages reachable without a session.
pub const DEFAULT_PUBLIC_SUBSTRINGS: &[&str] = &["/login", "/recover", "/screening"];

/// Exact-match entries. The site root lives here and only here: as a
/// substring a bare `/` would make every path public.
pub const DEFAULT_PUBLIC_EXACT: &[&str] = &["/", "/index.html"];

/// Which directory implementation the gate constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorySource {
    /// Roster file compiled into an in-memory index at startup.
    Static,
    /// Bearer-token HTTP fetch per load, with snapshot fallback.
    Remote,
}

impl DirectorySource {
    pub fn parse(value: &str) -> GateResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(DirectorySource::Static),
            "remote" => Ok(DirectorySource::Remote),
            other => Err(GateError::config(format!(
                "{ENV_DIRECTORY} must be 'static' or 'remote', got '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DirectorySource::Static => "static",
            DirectorySource::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub directory: DirectorySource,
    pub roster_file: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    pub fetch_timeout: Duration,
    pub state_dir: PathBuf,
    pub login_path: String,
    pub public_substrings: Vec<String>,
    pub public_exact: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            directory: DirectorySource::Static,
            roster_file: None,
            remote_url: None,
            remote_token: None,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            state_dir: paths::default_state_dir(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            public_substrings: DEFAULT_PUBLIC_SUBSTRINGS.iter().map(|s| s.to_string()).collect(),
            public_exact: DEFAULT_PUBLIC_EXACT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GateConfig {
    /// Build from process environment.
    pub fn from_env() -> GateResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Tests feed a closure over a map so config
    /// parsing never touches the real environment.
    pub fn from_lookup<F>(lookup: F) -> GateResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = GateConfig::default();
        if let Some(raw) = lookup(ENV_DIRECTORY) {
            cfg.directory = DirectorySource::parse(&raw)?;
        }
        if let Some(raw) = lookup(ENV_ROSTER_FILE) {
            if !raw.trim().is_empty() {
                cfg.roster_file = Some(PathBuf::from(raw));
            }
        }
        if let Some(raw) = lookup(ENV_DIRECTORY_URL) {
            if !raw.trim().is_empty() {
                cfg.remote_url = Some(raw);
            }
        }
        if let Some(raw) = lookup(ENV_DIRECTORY_TOKEN) {
            if !raw.trim().is_empty() {
                cfg.remote_token = Some(raw);
            }
        }
        if let Some(ms) = parse_millis(ENV_FETCH_TIMEOUT_MS, lookup(ENV_FETCH_TIMEOUT_MS)) {
            cfg.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_STATE_DIR) {
            if !raw.trim().is_empty() {
                cfg.state_dir = PathBuf::from(raw);
            }
        }
        if let Some(raw) = lookup(ENV_LOGIN_PATH) {
            if !raw.trim().is_empty() {
                cfg.login_path = raw;
            }
        }
        if let Some(raw) = lookup(ENV_PUBLIC_PATHS) {
            cfg.public_substrings = split_list(&raw);
        }
        if let Some(raw) = lookup(ENV_PUBLIC_EXACT) {
            cfg.public_exact = split_list(&raw);
        }
        Ok(cfg)
    }

    /// Reject incoherent combinations before any provider is constructed.
    pub fn validate(&self) -> GateResult<()> {
        match self.directory {
            DirectorySource::Static => {
                if self.roster_file.is_none() {
                    return Err(GateError::config(format!(
                        "static directory selected but {ENV_ROSTER_FILE} is unset"
                    )));
                }
            }
            DirectorySource::Remote => {
                if self.remote_url.is_none() {
                    return Err(GateError::config(format!(
                        "remote directory selected but {ENV_DIRECTORY_URL} is unset"
                    )));
                }
                if self.remote_token.is_none() {
                    return Err(GateError::config(format!(
                        "remote directory selected but {ENV_DIRECTORY_TOKEN} is unset"
                    )));
                }
            }
        }
        if !self.login_path.starts_with('/') {
            return Err(GateError::config(format!(
                "login path must be site-absolute, got '{}'",
                self.login_path
            )));
        }
        if self.fetch_timeout.is_zero() {
            return Err(GateError::config("fetch timeout must be positive"));
        }
        Ok(())
    }

    /// Allow-list check: exact entries match whole paths, substring entries
    /// match anywhere in the path.
    pub fn is_public(&self, path: &str) -> bool {
        if self.public_exact.iter().any(|p| p == path) {
            return true;
        }
        self.public_substrings.iter().any(|p| path.contains(p.as_str()))
    }
}

fn parse_millis(name: &str, raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(target: "gate", %name, value = %raw, "ignoring unparsable duration");
            None
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg_from(pairs: &[(&str, &str)]) -> GateConfig {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        GateConfig::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let cfg = cfg_from(&[]);
        assert_eq!(cfg.directory, DirectorySource::Static);
        assert_eq!(cfg.login_path, DEFAULT_LOGIN_PATH);
        assert_eq!(cfg.fetch_timeout, Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS));
        assert_eq!(cfg.state_dir, paths::default_state_dir());
        assert!(cfg.roster_file.is_none());
    }

    #[test]
    fn env_overrides_defaults() {
        let cfg = cfg_from(&[
            (ENV_DIRECTORY, "remote"),
            (ENV_DIRECTORY_URL, "http://127.0.0.1:9000/members"),
            (ENV_DIRECTORY_TOKEN, "tok-123"),
            (ENV_FETCH_TIMEOUT_MS, "250"),
            (ENV_STATE_DIR, "/tmp/gate"),
            (ENV_LOGIN_PATH, "/enter.html"),
        ]);
        assert_eq!(cfg.directory, DirectorySource::Remote);
        assert_eq!(cfg.remote_url.as_deref(), Some("http://127.0.0.1:9000/members"));
        assert_eq!(cfg.remote_token.as_deref(), Some("tok-123"));
        assert_eq!(cfg.fetch_timeout, Duration::from_millis(250));
        assert_eq!(cfg.state_dir, PathBuf::from("/tmp/gate"));
        assert_eq!(cfg.login_path, "/enter.html");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_directory_source_is_a_config_error() {
        let err = GateConfig::from_lookup(|key| {
            (key == ENV_DIRECTORY).then(|| "airtable".to_string())
        })
        .unwrap_err();
        assert_eq!(err.code_str(), "config_error");
    }

    #[test]
    fn unparsable_timeout_falls_back_to_default() {
        let cfg = cfg_from(&[(ENV_FETCH_TIMEOUT_MS, "soon")]);
        assert_eq!(cfg.fetch_timeout, Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS));
    }

    #[test]
    fn validate_requires_source_specific_settings() {
        let cfg = cfg_from(&[]);
        assert!(cfg.validate().is_err(), "static without a roster file");

        let cfg = cfg_from(&[(ENV_DIRECTORY, "remote"), (ENV_DIRECTORY_URL, "http://x/y")]);
        assert!(cfg.validate().is_err(), "remote without a token");

        let cfg = cfg_from(&[(ENV_ROSTER_FILE, "roster.json"), (ENV_LOGIN_PATH, "login.html")]);
        assert!(cfg.validate().is_err(), "login path must start with /");
    }

    #[test]
    fn allow_list_matches_exact_and_substring_entries() {
        let cfg = cfg_from(&[]);
        assert!(cfg.is_public("/"));
        assert!(cfg.is_public("/index.html"));
        assert!(cfg.is_public("/login.html"));
        assert!(cfg.is_public("/account/recover-code.html"));
        assert!(cfg.is_public("/screening"));
        assert!(!cfg.is_public("/gallery.html"));
        // Root is exact-only; other slash-bearing paths stay protected.
        assert!(!cfg.is_public("/members/area.html"));
    }

    #[test]
    fn allow_list_env_replaces_defaults() {
        let cfg = cfg_from(&[(ENV_PUBLIC_PATHS, "/open, /faq"), (ENV_PUBLIC_EXACT, "/")]);
        assert!(cfg.is_public("/open/one.html"));
        assert!(cfg.is_public("/faq"));
        assert!(cfg.is_public("/"));
        assert!(!cfg.is_public("/login.html"));
        assert!(!cfg.is_public("/index.html"));
    }
}
