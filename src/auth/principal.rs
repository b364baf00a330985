use serde::{Deserialize, Serialize};

use crate::models::account::Account;

/// Authenticated identity plus its authority set.
///
/// Built from an [`Account`] but independent of the storage schema; downstream
/// authorization only ever sees this view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub account_id: i32,
    pub username: Option<String>,
    pub email: Option<String>,
    pub authorities: Vec<String>,
}

impl Principal {
    #[must_use]
    pub fn from_account(account: &Account) -> Self {
        Self {
            account_id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            authorities: vec![account.role.name.clone()],
        }
    }

    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    /// The single role-derived authority.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.authorities.first().map(String::as_str)
    }

    #[must_use]
    pub fn subject(&self) -> String {
        self.account_id.to_string()
    }
}
