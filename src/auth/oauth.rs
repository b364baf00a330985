use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::{AuthError, IssuedTokens, Principal, SessionTransport, TokenIssuer};
use crate::db::{InsertOutcome, NewFederatedAccount, Store};
use crate::models::account::{Account, ROLE_USER};

/// Identity asserted by a third-party provider after a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct FederatedAssertion {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl FederatedAssertion {
    fn picture(&self) -> Option<&str> {
        self.picture.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Links a federated identity to a local account and issues tokens for it.
pub struct OAuth2LinkingHandler {
    store: Store,
    issuer: Arc<dyn TokenIssuer>,
    transport: Arc<SessionTransport>,
}

impl OAuth2LinkingHandler {
    #[must_use]
    pub fn new(
        store: Store,
        issuer: Arc<dyn TokenIssuer>,
        transport: Arc<SessionTransport>,
    ) -> Self {
        Self {
            store,
            issuer,
            transport,
        }
    }

    /// Find-or-create the account and issue its token pair.
    pub async fn link(
        &self,
        assertion: &FederatedAssertion,
    ) -> Result<(Account, IssuedTokens), AuthError> {
        let email = assertion.email.trim();
        if email.is_empty() {
            return Err(AuthError::Validation(
                "Federated assertion has no email".to_string(),
            ));
        }

        let account = match self.store.get_account_by_email(email).await? {
            Some(existing) => self.backfill_avatar(existing, assertion).await?,
            None => self.create_account(email, assertion).await?,
        };

        let tokens = self.issuer.issue_pair(&Principal::from_account(&account))?;
        Ok((account, tokens))
    }

    /// Entry point for the provider callback. Always answers with a redirect.
    pub async fn on_authentication_success(&self, assertion: &FederatedAssertion) -> Response {
        match self.link(assertion).await {
            Ok((account, tokens)) => {
                metrics::counter!("auth_attempts_total", "method" => "oauth2", "outcome" => "success")
                    .increment(1);
                info!(
                    event = "oauth2_login_succeeded",
                    account_id = account.id,
                    "Federated login linked"
                );
                self.transport.success_redirect(&tokens)
            }
            Err(e) => {
                metrics::counter!("auth_attempts_total", "method" => "oauth2", "outcome" => e.code())
                    .increment(1);
                error!(
                    event = "oauth2_login_failed",
                    reason = e.code(),
                    error = %e,
                    "Federated login failed"
                );
                self.transport.failure_redirect(e.code())
            }
        }
    }

    async fn create_account(
        &self,
        email: &str,
        assertion: &FederatedAssertion,
    ) -> Result<Account, AuthError> {
        let role = self
            .store
            .get_role_by_name(ROLE_USER)
            .await?
            .ok_or_else(|| AuthError::MissingRoleConfiguration(ROLE_USER.to_string()))?;

        let new = NewFederatedAccount {
            email: email.to_string(),
            name: assertion.name.clone(),
            avatar_url: assertion.picture().map(str::to_string),
            role_id: role.id,
        };

        match self.store.create_federated_account(new).await? {
            InsertOutcome::Created(account) => {
                info!(account_id = account.id, "Provisioned account from federated login");
                Ok(account)
            }
            InsertOutcome::Conflict => {
                // Lost the race against a concurrent first login for the same email
                warn!("Concurrent federated sign-up detected; linking to existing account");
                let existing = self.store.get_account_by_email(email).await?.ok_or_else(|| {
                    AuthError::Internal(format!("Account for {email} vanished after conflict"))
                })?;
                self.backfill_avatar(existing, assertion).await
            }
        }
    }

    async fn backfill_avatar(
        &self,
        mut account: Account,
        assertion: &FederatedAssertion,
    ) -> Result<Account, AuthError> {
        if account.has_avatar() {
            return Ok(account);
        }

        if let Some(picture) = assertion.picture() {
            self.store.update_account_avatar(account.id, picture).await?;
            account.avatar_url = Some(picture.to_string());
        }

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtTokenIssuer, TokenKind};
    use crate::config::{JwtConfig, OAuthConfig, ServerConfig};
    use crate::db::testing::temp_store;
    use axum::http::{StatusCode, header::LOCATION};

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "oauth-test-secret-oauth-test-secret".to_string(),
            ..JwtConfig::default()
        }
    }

    fn handler(store: Store) -> OAuth2LinkingHandler {
        let jwt = jwt_config();
        let transport = SessionTransport::new(
            &ServerConfig::default(),
            &OAuthConfig {
                success_redirect_url: "https://app.bistro.test/ok".to_string(),
                failure_redirect_url: "https://app.bistro.test/fail".to_string(),
                ..OAuthConfig::default()
            },
            &jwt,
        )
        .unwrap();
        OAuth2LinkingHandler::new(store, Arc::new(JwtTokenIssuer::new(&jwt)), Arc::new(transport))
    }

    fn assertion(email: &str, picture: Option<&str>) -> FederatedAssertion {
        FederatedAssertion {
            email: email.to_string(),
            name: Some("Pat Diner".to_string()),
            picture: picture.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn first_login_creates_active_user_account() {
        let store = temp_store().await;
        store.ensure_role(ROLE_USER).await.unwrap();
        let handler = handler(store.clone());

        let (account, tokens) = handler
            .link(&assertion("pat@example.com", Some("https://img/pat.png")))
            .await
            .unwrap();

        assert_eq!(account.role.name, ROLE_USER);
        assert_eq!(account.status, crate::models::account::AccountStatus::Active);
        assert_eq!(account.name.as_deref(), Some("Pat Diner"));
        assert_eq!(account.avatar_url.as_deref(), Some("https://img/pat.png"));
        assert!(!account.has_local_password());

        let claims = JwtTokenIssuer::new(&jwt_config())
            .verify(&tokens.access_token, TokenKind::Access)
            .unwrap();
        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.role, ROLE_USER);
    }

    #[tokio::test]
    async fn existing_avatar_is_left_alone() {
        let store = temp_store().await;
        store.ensure_role(ROLE_USER).await.unwrap();
        let handler = handler(store.clone());

        handler
            .link(&assertion("pat@example.com", Some("https://img/original.png")))
            .await
            .unwrap();
        let (account, _) = handler
            .link(&assertion("pat@example.com", Some("https://img/new.png")))
            .await
            .unwrap();

        assert_eq!(account.avatar_url.as_deref(), Some("https://img/original.png"));
        let stored = store.get_account_by_email("pat@example.com").await.unwrap().unwrap();
        assert_eq!(stored.avatar_url.as_deref(), Some("https://img/original.png"));
    }

    #[tokio::test]
    async fn empty_avatar_is_backfilled() {
        let store = temp_store().await;
        store.ensure_role(ROLE_USER).await.unwrap();
        let handler = handler(store.clone());

        handler.link(&assertion("pat@example.com", None)).await.unwrap();
        handler
            .link(&assertion("pat@example.com", Some("https://img/later.png")))
            .await
            .unwrap();

        let stored = store.get_account_by_email("pat@example.com").await.unwrap().unwrap();
        assert_eq!(stored.avatar_url.as_deref(), Some("https://img/later.png"));
        // Name is not overwritten on an existing account
        assert_eq!(stored.name.as_deref(), Some("Pat Diner"));
    }

    #[tokio::test]
    async fn missing_default_role_is_a_configuration_error() {
        let store = temp_store().await;
        let handler = handler(store.clone());

        assert!(matches!(
            handler.link(&assertion("new@example.com", None)).await,
            Err(AuthError::MissingRoleConfiguration(role)) if role == ROLE_USER
        ));
    }

    #[tokio::test]
    async fn failures_become_redirects() {
        let store = temp_store().await;
        let handler = handler(store.clone());

        let response = handler
            .on_authentication_success(&assertion("new@example.com", None))
            .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[LOCATION].to_str().unwrap(),
            "https://app.bistro.test/fail?error=MISSING_ROLE_CONFIGURATION"
        );
    }

    #[tokio::test]
    async fn blank_email_is_rejected() {
        let store = temp_store().await;
        store.ensure_role(ROLE_USER).await.unwrap();

        assert!(matches!(
            handler(store.clone()).link(&assertion("  ", None)).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn email_case_does_not_split_accounts() {
        let store = temp_store().await;
        store.ensure_role(ROLE_USER).await.unwrap();
        let handler = handler(store.clone());

        let (first, _) = handler.link(&assertion("Pat@Example.com", None)).await.unwrap();
        let (second, _) = handler
            .link(&assertion(" pat@example.com", Some("https://img/pat.png")))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.email.as_deref(), Some("pat@example.com"));
        assert_eq!(second.avatar_url.as_deref(), Some("https://img/pat.png"));
        assert_eq!(store.count_accounts_by_email("PAT@EXAMPLE.COM").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_logins_create_one_account() {
        let store = temp_store().await;
        store.ensure_role(ROLE_USER).await.unwrap();
        let handler = Arc::new(handler(store.clone()));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler
                        .link(&assertion("rush@example.com", Some("https://img/rush.png")))
                        .await
                        .map(|(account, _)| account.id)
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.count_accounts_by_email("rush@example.com").await.unwrap(), 1);
    }
}
