//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::auth::{CredentialAuthenticator, Principal, TokenIssuer, TokenKind};
use crate::db::Store;
use crate::models::account::AccountStatus;
use crate::services::auth_service::{AccountInfo, AuthError, AuthService, LoginResult};

pub struct SeaOrmAuthService {
    store: Store,
    authenticator: CredentialAuthenticator,
    issuer: Arc<dyn TokenIssuer>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        authenticator: CredentialAuthenticator,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            store,
            authenticator,
            issuer,
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResult, AuthError> {
        let principal = self.authenticator.authenticate(identifier, password).await?;
        let tokens = self.issuer.issue_pair(&principal)?;

        Ok(LoginResult { tokens, principal })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<LoginResult, AuthError> {
        let claims = self.issuer.verify(refresh_token, TokenKind::Refresh)?;
        let account_id = claims
            .sub
            .parse::<i32>()
            .map_err(|_| AuthError::InvalidToken)?;

        // Deleted accounts cannot refresh
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        match account.status {
            AccountStatus::Active => {}
            AccountStatus::Disabled | AccountStatus::Pending => {
                return Err(AuthError::AccountDisabled);
            }
            AccountStatus::Locked => return Err(AuthError::AccountLocked),
        }

        let principal = Principal::from_account(&account);
        let tokens = self.issuer.issue_pair(&principal)?;
        info!(event = "token_refreshed", account_id, "Issued refreshed token pair");

        Ok(LoginResult { tokens, principal })
    }

    fn principal_from_access_token(&self, token: &str) -> Result<Principal, AuthError> {
        self.issuer
            .verify(token, TokenKind::Access)?
            .into_principal()
    }

    async fn account_info(&self, account_id: i32) -> Result<AccountInfo, AuthError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(AuthError::UnknownIdentity)?;

        Ok(AccountInfo {
            id: account.id,
            has_password: account.has_local_password(),
            username: account.username,
            email: account.email,
            name: account.name,
            avatar_url: account.avatar_url,
            role: account.role.name,
            status: account.status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::tests::test_encoder;
    use crate::auth::{IdentityResolver, JwtTokenIssuer, PasswordEncoder};
    use crate::config::JwtConfig;
    use crate::db::NewLocalAccount;
    use crate::db::testing::{TempStore, temp_store};
    use crate::models::account::ROLE_STAFF;

    async fn service() -> (TempStore, SeaOrmAuthService, i32) {
        let store = temp_store().await;
        store.ensure_role(ROLE_STAFF).await.unwrap();
        let role = store.get_role_by_name(ROLE_STAFF).await.unwrap().unwrap();

        let encoder: Arc<dyn PasswordEncoder> = Arc::new(test_encoder());
        let account = store
            .create_local_account(NewLocalAccount {
                username: Some("chef".to_string()),
                email: Some("chef@bistro.test".to_string()),
                password_hash: encoder.hash("mise-en-place").unwrap(),
                status: AccountStatus::Active,
                role_id: role.id,
            })
            .await
            .unwrap();

        let issuer = Arc::new(JwtTokenIssuer::new(&JwtConfig {
            secret: "service-test-secret-service-test".to_string(),
            ..JwtConfig::default()
        }));
        let authenticator =
            CredentialAuthenticator::new(IdentityResolver::new(store.clone()), encoder);

        let service = SeaOrmAuthService::new(store.clone(), authenticator, issuer);
        (store, service, account.id)
    }

    #[tokio::test]
    async fn login_issues_tokens_for_principal() {
        let (_store, service, id) = service().await;

        let result = service.login("chef", "mise-en-place").await.unwrap();
        assert_eq!(result.principal.account_id, id);

        let principal = service
            .principal_from_access_token(&result.tokens.access_token)
            .unwrap();
        assert_eq!(principal, result.principal);
    }

    #[tokio::test]
    async fn refresh_token_yields_new_pair() {
        let (_store, service, id) = service().await;
        let login = service.login("chef", "mise-en-place").await.unwrap();

        let refreshed = service.refresh(&login.tokens.refresh_token).await.unwrap();
        assert_eq!(refreshed.principal.account_id, id);
        assert!(
            service
                .principal_from_access_token(&refreshed.tokens.access_token)
                .is_ok()
        );
    }

    #[tokio::test]
    async fn access_token_cannot_be_used_to_refresh() {
        let (_store, service, _) = service().await;
        let login = service.login("chef", "mise-en-place").await.unwrap();

        assert!(matches!(
            service.refresh(&login.tokens.access_token).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            service.principal_from_access_token(&login.tokens.refresh_token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn refresh_rechecks_account_status() {
        let (store, service, id) = service().await;
        let login = service.login("chef", "mise-en-place").await.unwrap();

        store
            .update_account_status(id, AccountStatus::Locked)
            .await
            .unwrap();

        assert!(matches!(
            service.refresh(&login.tokens.refresh_token).await,
            Err(AuthError::AccountLocked)
        ));
    }

    #[tokio::test]
    async fn account_info_reports_role_and_password_flag() {
        let (_store, service, id) = service().await;

        let info = service.account_info(id).await.unwrap();
        assert_eq!(info.role, ROLE_STAFF);
        assert_eq!(info.status, "ACTIVE");
        assert!(info.has_password);

        assert!(matches!(
            service.account_info(id + 1000).await,
            Err(AuthError::UnknownIdentity)
        ));
    }
}
