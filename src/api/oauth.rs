use axum::{Json, extract::State, http::HeaderMap, response::Response};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use super::{ApiError, AppState};
use crate::auth::FederatedAssertion;

pub const ADAPTER_TOKEN_HEADER: &str = "x-oauth-adapter-token";

/// POST /login/oauth2/success
///
/// Called by the provider adapter after it has exchanged the authorization
/// code for the user's profile. Answers with the redirect the browser follows.
pub async fn federated_success(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(assertion): Json<FederatedAssertion>,
) -> Result<Response, ApiError> {
    if !adapter_authorized(&state.config().oauth.adapter_token, &headers) {
        warn!(
            event = "oauth2_adapter_rejected",
            "Federated login callback without a valid adapter token"
        );
        return Err(ApiError::unauthorized());
    }

    Ok(state.oauth().on_authentication_success(&assertion).await)
}

/// Digests are compared so the check does not short-circuit on the first differing byte.
fn adapter_authorized(expected: &str, headers: &HeaderMap) -> bool {
    if expected.is_empty() {
        return false;
    }

    headers
        .get(ADAPTER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|presented| {
            Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
        })
}
