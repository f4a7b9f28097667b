//! Member records and the normalizers that fold source spellings onto them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account standing. Only `Active` passes the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Inactive,
    Pending,
}

impl AccountStatus {
    /// Case-insensitive mapping from a source value. Unknown spellings land
    /// on `Pending` so a typo in the source table locks nobody in, only out.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => AccountStatus::Active,
            "inactive" => AccountStatus::Inactive,
            "pending" => AccountStatus::Pending,
            _ => AccountStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Inactive => "Inactive",
            AccountStatus::Pending => "Pending",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse member role. The source table spells roles freely ("Beta Tester",
/// "Site Admin"); anything mentioning admin is an admin, the rest are testers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    BetaTester,
    Admin,
}

impl Role {
    pub fn normalize(raw: &str) -> Self {
        if raw.to_ascii_lowercase().contains("admin") {
            Role::Admin
        } else {
            Role::BetaTester
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::BetaTester => "BetaTester",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One directory entry, already normalized from its source shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Short member code the session refers to.
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub status: AccountStatus,
    pub role: Role,
    /// Optional package tag describing what the member bought into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlement: Option<String>,
}

impl UserRecord {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Display name folded for the legacy case-insensitive name lookup.
    pub fn name_key(&self) -> String {
        fold_name(&self.display_name)
    }
}

#[inline]
pub(crate) fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_normalization_is_case_insensitive() {
        assert_eq!(AccountStatus::normalize("Active"), AccountStatus::Active);
        assert_eq!(AccountStatus::normalize(" ACTIVE "), AccountStatus::Active);
        assert_eq!(AccountStatus::normalize("inactive"), AccountStatus::Inactive);
        assert_eq!(AccountStatus::normalize("Pending"), AccountStatus::Pending);
    }

    #[test]
    fn unknown_status_lands_on_pending() {
        assert_eq!(AccountStatus::normalize("suspended"), AccountStatus::Pending);
        assert_eq!(AccountStatus::normalize(""), AccountStatus::Pending);
    }

    #[test]
    fn role_normalization_matches_admin_substring() {
        assert_eq!(Role::normalize("Admin"), Role::Admin);
        assert_eq!(Role::normalize("Site ADMIN"), Role::Admin);
        assert_eq!(Role::normalize("Beta Tester"), Role::BetaTester);
        assert_eq!(Role::normalize("beta-tester"), Role::BetaTester);
        assert_eq!(Role::normalize(""), Role::BetaTester);
    }

    #[test]
    fn name_key_folds_case_and_whitespace() {
        let rec = UserRecord {
            id: "1001".into(),
            display_name: "  Joshua Serrano ".into(),
            email: None,
            status: AccountStatus::Active,
            role: Role::BetaTester,
            entitlement: None,
        };
        assert_eq!(rec.name_key(), "joshua serrano");
        assert!(rec.is_active());
    }
}
