use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::password::{PasswordEncoder, matches_blocking};
use crate::auth::{AuthError, IdentityResolver, Principal};
use crate::models::account::AccountStatus;

/// Turns an identifier/password pair into a [`Principal`] or a rejection reason.
///
/// Never mutates the account.
#[derive(Clone)]
pub struct CredentialAuthenticator {
    resolver: IdentityResolver,
    encoder: Arc<dyn PasswordEncoder>,
}

impl CredentialAuthenticator {
    #[must_use]
    pub fn new(resolver: IdentityResolver, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self { resolver, encoder }
    }

    pub async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        let result = self.decide(identifier, password).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.code(),
        };
        metrics::counter!("auth_attempts_total", "method" => "password", "outcome" => outcome)
            .increment(1);

        match &result {
            Ok(principal) => {
                info!(
                    event = "login_succeeded",
                    account_id = principal.account_id,
                    "Password login succeeded"
                );
            }
            Err(AuthError::Database(msg) | AuthError::Internal(msg)) => {
                warn!(event = "login_errored", error = %msg, "Password login errored");
            }
            Err(e) => {
                info!(event = "login_rejected", reason = e.code(), "Password login rejected");
            }
        }

        result
    }

    async fn decide(&self, identifier: &str, password: &str) -> Result<Principal, AuthError> {
        let account = self.resolver.resolve(identifier).await?;

        if !account.has_local_password() {
            return Err(AuthError::FederatedAccountNoPassword);
        }

        let matches = matches_blocking(
            self.encoder.clone(),
            password,
            account.password_hash.as_deref(),
        )
        .await?;
        if !matches {
            return Err(AuthError::BadCredentials);
        }

        // State is only revealed to callers who proved the password
        match account.status {
            AccountStatus::Active => Ok(Principal::from_account(&account)),
            AccountStatus::Disabled | AccountStatus::Pending => Err(AuthError::AccountDisabled),
            AccountStatus::Locked => Err(AuthError::AccountLocked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::tests::test_encoder;
    use crate::db::testing::{TempStore, temp_store};
    use crate::db::{NewFederatedAccount, NewLocalAccount};
    use crate::models::account::{ROLE_MANAGER, ROLE_USER};

    struct Fixture {
        store: TempStore,
        authenticator: CredentialAuthenticator,
        encoder: Arc<dyn PasswordEncoder>,
    }

    async fn fixture() -> Fixture {
        let store = temp_store().await;
        store.ensure_role(ROLE_MANAGER).await.unwrap();
        store.ensure_role(ROLE_USER).await.unwrap();

        let encoder: Arc<dyn PasswordEncoder> = Arc::new(test_encoder());
        let authenticator =
            CredentialAuthenticator::new(IdentityResolver::new(store.clone()), encoder.clone());

        Fixture {
            store,
            authenticator,
            encoder,
        }
    }

    async fn local_account(f: &Fixture, username: &str, password: &str, status: AccountStatus) {
        let role = f.store.get_role_by_name(ROLE_MANAGER).await.unwrap().unwrap();
        f.store
            .create_local_account(NewLocalAccount {
                username: Some(username.to_string()),
                email: Some(format!("{username}@bistro.test")),
                password_hash: f.encoder.hash(password).unwrap(),
                status,
                role_id: role.id,
            })
            .await
            .unwrap();
    }

    async fn federated_account(f: &Fixture, email: &str) {
        let role = f.store.get_role_by_name(ROLE_USER).await.unwrap().unwrap();
        f.store
            .create_federated_account(NewFederatedAccount {
                email: email.to_string(),
                name: None,
                avatar_url: None,
                role_id: role.id,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn active_account_with_correct_password_gets_role_authority() {
        let f = fixture().await;
        local_account(&f, "manager", "s3cret-pass", AccountStatus::Active).await;

        let principal = f
            .authenticator
            .authenticate("manager", "s3cret-pass")
            .await
            .unwrap();
        assert_eq!(principal.authorities, vec![ROLE_MANAGER.to_string()]);

        let by_email = f
            .authenticator
            .authenticate("manager@bistro.test", "s3cret-pass")
            .await
            .unwrap();
        assert_eq!(by_email.account_id, principal.account_id);
    }

    #[tokio::test]
    async fn unknown_identifier_is_rejected() {
        let f = fixture().await;
        assert!(matches!(
            f.authenticator.authenticate("ghost", "whatever").await,
            Err(AuthError::UnknownIdentity)
        ));
    }

    #[tokio::test]
    async fn federated_account_never_falls_through_to_bad_credentials() {
        let f = fixture().await;
        federated_account(&f, "social@bistro.test").await;

        for password in ["", "anything", "s3cret-pass"] {
            assert!(matches!(
                f.authenticator
                    .authenticate("social@bistro.test", password)
                    .await,
                Err(AuthError::FederatedAccountNoPassword)
            ));
        }
    }

    #[tokio::test]
    async fn wrong_password_is_bad_credentials() {
        let f = fixture().await;
        local_account(&f, "manager", "s3cret-pass", AccountStatus::Active).await;

        assert!(matches!(
            f.authenticator.authenticate("manager", "nope").await,
            Err(AuthError::BadCredentials)
        ));
        assert!(matches!(
            f.authenticator.authenticate("manager", "").await,
            Err(AuthError::BadCredentials)
        ));
    }

    #[tokio::test]
    async fn disabled_account_reports_disabled_only_after_password_check() {
        let f = fixture().await;
        local_account(&f, "former", "s3cret-pass", AccountStatus::Disabled).await;

        assert!(matches!(
            f.authenticator.authenticate("former", "s3cret-pass").await,
            Err(AuthError::AccountDisabled)
        ));
        // Wrong guess must not learn the account state
        assert!(matches!(
            f.authenticator.authenticate("former", "guess").await,
            Err(AuthError::BadCredentials)
        ));
    }

    #[tokio::test]
    async fn locked_and_pending_accounts_are_rejected() {
        let f = fixture().await;
        local_account(&f, "locked", "s3cret-pass", AccountStatus::Locked).await;
        local_account(&f, "pending", "s3cret-pass", AccountStatus::Pending).await;

        assert!(matches!(
            f.authenticator.authenticate("locked", "s3cret-pass").await,
            Err(AuthError::AccountLocked)
        ));
        assert!(matches!(
            f.authenticator.authenticate("pending", "s3cret-pass").await,
            Err(AuthError::AccountDisabled)
        ));
    }

    #[tokio::test]
    async fn authentication_does_not_mutate_the_account() {
        let f = fixture().await;
        local_account(&f, "manager", "s3cret-pass", AccountStatus::Active).await;
        let before = f.store.get_account_by_username("manager").await.unwrap();

        let _ = f.authenticator.authenticate("manager", "wrong").await;
        let _ = f.authenticator.authenticate("manager", "s3cret-pass").await;

        let after = f.store.get_account_by_username("manager").await.unwrap();
        assert_eq!(before, after);
    }
}
