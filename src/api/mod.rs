use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{OAuth2LinkingHandler, SessionTransport};
use crate::config::Config;
use crate::db::Store;
use crate::payment::PaymentSigner;
use crate::services::AuthService;
use crate::state::SharedState;

pub mod auth;
mod error;
mod oauth;
mod observability;
mod payments;
mod system;
mod types;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn transport(&self) -> &SessionTransport {
        &self.shared.transport
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuth2LinkingHandler {
        &self.shared.oauth
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentSigner {
        &self.shared.payments
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .route("/payments/vnpay", post(payments::create_vnpay_payment))
        .route("/payments/vnpay/return", get(payments::vnpay_return))
        .with_state(state.clone());

    let oauth_router = Router::new()
        .route("/login/oauth2/success", post(oauth::federated_success))
        .with_state(state.clone());

    let cors_layer = if cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    // Applied to the whole tree so unknown non-public paths also answer 401
    Router::new()
        .nest("/api", api_router)
        .merge(oauth_router)
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}
