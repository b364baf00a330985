use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::auth::{
    Argon2PasswordEncoder, CredentialAuthenticator, IdentityResolver, JwtTokenIssuer,
    OAuth2LinkingHandler, PasswordEncoder, SessionTransport, TokenIssuer,
};
use crate::config::Config;
use crate::db::Store;
use crate::payment::PaymentSigner;
use crate::services::{AuthService, HousekeepingService, SeaOrmAuthService};

/// Long-lived components shared by the HTTP layer, the scheduler and the CLI.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,

    pub oauth: Arc<OAuth2LinkingHandler>,

    pub transport: Arc<SessionTransport>,

    pub payments: Arc<PaymentSigner>,

    pub housekeeping: HousekeepingService,
}

impl SharedState {
    /// Open the store, seed roles and wire the authentication pipeline.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let housekeeping =
            HousekeepingService::new(store.clone(), config.scheduler.registration_ttl_hours);

        // Federated sign-up needs ROLE_USER before the first request arrives
        housekeeping
            .seed_roles()
            .await
            .context("Failed to seed default roles")?;

        let encoder: Arc<dyn PasswordEncoder> =
            Arc::new(Argon2PasswordEncoder::new(&config.security)?);
        let resolver = IdentityResolver::with_strategies(
            store.clone(),
            config.security.lookup_strategies.clone(),
        );
        let authenticator = CredentialAuthenticator::new(resolver, encoder);

        let issuer: Arc<dyn TokenIssuer> = Arc::new(JwtTokenIssuer::new(&config.security.jwt));
        let transport = Arc::new(SessionTransport::new(
            &config.server,
            &config.oauth,
            &config.security.jwt,
        )?);

        let oauth = Arc::new(OAuth2LinkingHandler::new(
            store.clone(),
            issuer.clone(),
            transport.clone(),
        ));
        let auth_service: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            authenticator,
            issuer,
        ));

        let payments = Arc::new(PaymentSigner::new(config.payment.clone()));

        info!(
            strategies = ?config.security.lookup_strategies,
            "Authentication pipeline ready"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            auth_service,
            oauth,
            transport,
            payments,
            housekeeping,
        })
    }
}
