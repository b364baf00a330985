use axum::{
    Json,
    body::Bytes,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::auth::Principal;
use crate::auth::session::refresh_token_from_headers;
use crate::services::{AccountInfo, LoginResult};

/// Paths reachable without a principal. Entries ending in `/` match as prefixes.
pub const PUBLIC_PATHS: &[&str] = &[
    "/api/auth/",
    "/api/health",
    "/api/catalog/",
    "/api/branches/status",
    "/api/payments/vnpay/return",
    "/oauth2/",
    "/login/oauth2/",
];

#[must_use]
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.iter().any(|public| {
        if public.ends_with('/') {
            path.starts_with(public)
        } else {
            path == *public
        }
    })
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or e-mail, depending on the configured lookup strategies
    #[serde(alias = "username", alias = "email")]
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

/// The authenticated caller, as attached by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Self)
            .ok_or_else(ApiError::unauthorized)
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Attaches the bearer token's [`Principal`] to the request. Public paths
/// pass through without one; everything else is rejected with 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let public = is_public_path(request.uri().path());

    let principal = match bearer_token(request.headers()) {
        Some(token) => match state.auth().principal_from_access_token(token) {
            Ok(principal) => Some(principal),
            Err(_) if public => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    match principal {
        Some(principal) => {
            tracing::Span::current().record("user_id", principal.account_id);
            request.extensions_mut().insert(principal);
        }
        None if !public => return Err(ApiError::unauthorized()),
        None => {}
    }

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

fn session_response(state: &AppState, result: LoginResult) -> Response {
    let cookie = state.transport().refresh_cookie(&result.tokens.refresh_token);
    let mut response = Json(ApiResponse::success(result)).into_response();
    state.transport().attach_cookie(&mut response, &cookie);
    response
}

/// POST /auth/login
/// Exchange credentials for an access token and a refresh cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let result = state
        .auth()
        .login(&payload.identifier, &payload.password)
        .await?;

    Ok(session_response(&state, result))
}

/// POST /auth/refresh
/// Refresh token comes from the cookie, or from a `{"refreshToken": ...}` body
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let token = refresh_token_from_headers(&headers)
        .or_else(|| {
            serde_json::from_slice::<RefreshRequest>(&body)
                .ok()
                .map(|r| r.refresh_token)
        })
        .ok_or_else(|| ApiError::Unauthorized("Refresh token required".to_string()))?;

    let result = state.auth().refresh(&token).await?;
    Ok(session_response(&state, result))
}

/// POST /auth/logout
pub async fn logout(State(state): State<Arc<AppState>>) -> Response {
    let mut response = Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    }))
    .into_response();
    state
        .transport()
        .attach_cookie(&mut response, &state.transport().expired_refresh_cookie());
    response
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<ApiResponse<AccountInfo>>, ApiError> {
    let info = state.auth().account_info(principal.account_id).await?;
    Ok(Json(ApiResponse::success(info)))
}
