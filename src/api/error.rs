use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::auth::AuthError;
use crate::payment::PaymentError;

#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),

    Payment(PaymentError),

    ValidationError(String),

    NotFound(String),

    Unauthorized(String),

    Forbidden(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(e) => write!(f, "Authentication error: {e}"),
            Self::Payment(e) => write!(f, "Payment error: {e}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::Auth(e) => auth_parts(e),
            Self::Payment(PaymentError::InvalidAmount) => (
                StatusCode::BAD_REQUEST,
                "INVALID_AMOUNT",
                PaymentError::InvalidAmount.to_string(),
            ),
            Self::Payment(PaymentError::Config(msg)) => {
                tracing::error!(error = %msg, "Payment gateway misconfigured");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PAYMENT_UNAVAILABLE",
                    "Payments are not available".to_string(),
                )
            }
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

fn auth_parts(err: &AuthError) -> (StatusCode, &'static str, String) {
    let code = err.code();
    match err {
        AuthError::UnknownIdentity | AuthError::BadCredentials => (
            StatusCode::UNAUTHORIZED,
            code,
            "Invalid credentials".to_string(),
        ),
        AuthError::FederatedAccountNoPassword => (
            StatusCode::UNAUTHORIZED,
            code,
            "This account signs in with an external provider".to_string(),
        ),
        AuthError::InvalidToken | AuthError::TokenExpired => {
            (StatusCode::UNAUTHORIZED, code, err.to_string())
        }
        AuthError::AccountDisabled | AuthError::AccountLocked => {
            (StatusCode::FORBIDDEN, code, err.to_string())
        }
        AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, code, msg.clone()),
        AuthError::MissingRoleConfiguration(_)
        | AuthError::Database(_)
        | AuthError::Internal(_) => {
            tracing::error!(error = %err, "Authentication pipeline failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                code,
                "An internal error occurred".to_string(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = ApiResponse::<()>::error(code, message);
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self::Payment(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized("Authentication required".to_string())
    }
}
