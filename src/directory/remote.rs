//! Remote member table: one authenticated GET per load, normalized into the
//! validated index. Field names follow the collaborating service's export
//! shape; this module is the only place that knows them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;

use super::index::Directory;
use super::provider::DirectoryProvider;
use super::record::{AccountStatus, Role, UserRecord};
use super::DirectoryError;

pub struct RemoteDirectory {
    client: reqwest::Client,
    url: String,
    token: String,
    /// Legacy roster reconciled against every successful fetch.
    roster_reference: Option<Vec<UserRecord>>,
    current: RwLock<Option<Arc<Directory>>>,
}

impl RemoteDirectory {
    pub fn new(
        url: String,
        token: String,
        timeout: Duration,
        roster_reference: Option<Vec<UserRecord>>,
    ) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;
        Ok(RemoteDirectory {
            client,
            url,
            token,
            roster_reference,
            current: RwLock::new(None),
        })
    }

    async fn fetch(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        let resp = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DirectoryError::Unreachable(format!(
                "{} returned {status}",
                self.url
            )));
        }
        let payload: WirePayload =
            resp.json().await.map_err(|e| DirectoryError::Malformed(e.to_string()))?;
        Ok(normalize_rows(payload))
    }
}

#[async_trait]
impl DirectoryProvider for RemoteDirectory {
    async fn load(&self) -> Result<Arc<Directory>, DirectoryError> {
        let records = self.fetch().await?;
        let dir = Directory::build(records)?;
        if let Some(roster) = &self.roster_reference {
            dir.cross_check(roster)?;
        }
        let dir = Arc::new(dir);
        *self.current.write() = Some(dir.clone());
        tracing::info!(target: "directory", members = dir.len(), "remote directory refreshed");
        Ok(dir)
    }

    fn snapshot(&self) -> Option<Arc<Directory>> {
        self.current.read().clone()
    }

    fn source(&self) -> &'static str {
        "remote"
    }
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default)]
    records: Vec<WireRecord>,
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    /// Source row id, used only to identify skipped rows in logs.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    fields: WireFields,
}

#[derive(Debug, Default, Deserialize)]
struct WireFields {
    #[serde(rename = "Code")]
    code: Option<CodeValue>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Email")]
    email: Option<String>,
    #[serde(rename = "Status")]
    status: Option<String>,
    #[serde(rename = "Role")]
    role: Option<String>,
    #[serde(rename = "Package")]
    package: Option<String>,
}

/// Member codes arrive as strings or bare numbers depending on how the
/// source column is typed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeValue {
    Text(String),
    Number(i64),
}

impl CodeValue {
    fn into_string(self) -> String {
        match self {
            CodeValue::Text(s) => s.trim().to_string(),
            CodeValue::Number(n) => n.to_string(),
        }
    }
}

/// Fold wire rows into normalized records. Ragged rows (no code or no name)
/// are expected from spreadsheet-backed tables and skipped with a warning;
/// a blank status cell grants nothing and lands on `Pending`.
fn normalize_rows(payload: WirePayload) -> Vec<UserRecord> {
    let mut out = Vec::with_capacity(payload.records.len());
    for row in payload.records {
        let row_id = row.id.unwrap_or_default();
        let code = row.fields.code.map(CodeValue::into_string).unwrap_or_default();
        let name = row.fields.name.map(|n| n.trim().to_string()).unwrap_or_default();
        if code.is_empty() || name.is_empty() {
            tracing::warn!(target: "directory", row = %row_id, "skipping ragged row without code or name");
            continue;
        }
        out.push(UserRecord {
            id: code,
            display_name: name,
            email: row.fields.email.filter(|s| !s.trim().is_empty()),
            status: row
                .fields
                .status
                .as_deref()
                .map(AccountStatus::normalize)
                .unwrap_or(AccountStatus::Pending),
            role: row.fields.role.as_deref().map(Role::normalize).unwrap_or(Role::BetaTester),
            entitlement: row.fields.package.filter(|s| !s.trim().is_empty()),
        });
    }
    out
}
