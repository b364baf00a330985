//! Domain service for session establishment.
//!
//! Handles password login, token refresh and bearer-token authorization.

use serde::Serialize;

pub use crate::auth::AuthError;
use crate::auth::{IssuedTokens, Principal};

/// Tokens plus the identity they were issued for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    #[serde(flatten)]
    pub tokens: IssuedTokens,
    pub principal: Principal,
}

/// Account details safe to show the account holder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: i32,
    pub username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub status: String,
    pub has_password: bool,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and issues an access/refresh pair.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] rejection reason when login fails.
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Exchanges a refresh token for a new pair. The account is re-read so
    /// role changes and lockouts apply immediately.
    async fn refresh(&self, refresh_token: &str) -> Result<LoginResult, AuthError>;

    /// Validates a bearer access token without touching the store.
    fn principal_from_access_token(&self, token: &str) -> Result<Principal, AuthError>;

    async fn account_info(&self, account_id: i32) -> Result<AccountInfo, AuthError>;
}
