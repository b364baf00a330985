use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
pub const ROLE_MANAGER: &str = "ROLE_MANAGER";
pub const ROLE_STAFF: &str = "ROLE_STAFF";
pub const ROLE_USER: &str = "ROLE_USER";

/// Roles that must exist before the service accepts traffic.
pub const DEFAULT_ROLES: [&str; 4] = [ROLE_ADMIN, ROLE_MANAGER, ROLE_STAFF, ROLE_USER];

/// Login eligibility of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Disabled,
    Locked,
    /// Registered but e-mail not yet verified
    Pending,
}

impl AccountStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Disabled => "DISABLED",
            Self::Locked => "LOCKED",
            Self::Pending => "PENDING",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "DISABLED" => Ok(Self::Disabled),
            "LOCKED" => Ok(Self::Locked),
            "PENDING" => Ok(Self::Pending),
            other => Err(format!("Unknown account status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: i32,
    pub name: String,
}

/// Storage-layer account record with its role already loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i32,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub status: AccountStatus,
    pub role: Role,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Account {
    /// `false` for federated-only accounts, which must never pass a password check.
    #[must_use]
    pub fn has_local_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    #[must_use]
    pub fn has_avatar(&self) -> bool {
        self.avatar_url.as_deref().is_some_and(|a| !a.trim().is_empty())
    }

    /// Best human-readable identifier, used in logs.
    #[must_use]
    pub fn login_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("account#{}", self.id))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "<redacted>"),
            )
            .field("status", &self.status)
            .field("role", &self.role)
            .field("name", &self.name)
            .field("avatar_url", &self.avatar_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(password_hash: Option<&str>) -> Account {
        Account {
            id: 7,
            username: None,
            email: Some("diner@example.com".to_string()),
            password_hash: password_hash.map(str::to_string),
            status: AccountStatus::Active,
            role: Role {
                id: 1,
                name: ROLE_USER.to_string(),
            },
            name: None,
            avatar_url: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Disabled,
            AccountStatus::Locked,
            AccountStatus::Pending,
        ] {
            assert_eq!(status.as_str().parse::<AccountStatus>(), Ok(status));
        }
        assert!("SUSPENDED".parse::<AccountStatus>().is_err());
    }

    #[test]
    fn empty_hash_is_not_a_local_password() {
        assert!(!account(None).has_local_password());
        assert!(!account(Some("")).has_local_password());
        assert!(account(Some("$argon2id$...")).has_local_password());
    }

    #[test]
    fn debug_output_redacts_hash() {
        let rendered = format!("{:?}", account(Some("$argon2id$secret")));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn login_name_falls_back_to_email_then_id() {
        let mut acc = account(None);
        assert_eq!(acc.login_name(), "diner@example.com");
        acc.email = None;
        assert_eq!(acc.login_name(), "account#7");
    }
}
