use thiserror::Error;

/// Rejection reasons produced by the authentication pipeline.
///
/// `UnknownIdentity` and `BadCredentials` are kept apart for logging, but the
/// HTTP layer renders them identically so callers cannot enumerate accounts.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No account matches the identifier")]
    UnknownIdentity,

    #[error("Account has no local password")]
    FederatedAccountNoPassword,

    #[error("Invalid credentials")]
    BadCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Account is locked")]
    AccountLocked,

    #[error("Default role {0} is missing; role seeding has not run")]
    MissingRoleConfiguration(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code, used in API bodies and failure redirects.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            // Deliberately indistinguishable
            Self::UnknownIdentity | Self::BadCredentials => "BAD_CREDENTIALS",
            Self::FederatedAccountNoPassword => "FEDERATED_ACCOUNT_NO_PASSWORD",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::MissingRoleConfiguration(_) => "MISSING_ROLE_CONFIGURATION",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::Validation(_) => "VALIDATION",
            Self::Database(_) | Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}
