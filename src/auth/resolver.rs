use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::AuthError;
use crate::db::Store;
use crate::models::account::Account;

/// One way of matching a login identifier to a stored account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    Username,
    Email,
}

impl LookupStrategy {
    pub const DEFAULT_ORDER: [Self; 2] = [Self::Username, Self::Email];

    async fn lookup(self, store: &Store, identifier: &str) -> anyhow::Result<Option<Account>> {
        match self {
            Self::Username => store.get_account_by_username(identifier).await,
            Self::Email => store.get_account_by_email(identifier).await,
        }
    }
}

/// Resolves a login identifier by trying each strategy in order; first hit wins.
///
/// Accounts come back with their role loaded, so authorization never needs a
/// second query.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Store,
    strategies: Vec<LookupStrategy>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self::with_strategies(store, LookupStrategy::DEFAULT_ORDER.to_vec())
    }

    #[must_use]
    pub const fn with_strategies(store: Store, strategies: Vec<LookupStrategy>) -> Self {
        Self { store, strategies }
    }

    #[must_use]
    pub fn strategies(&self) -> &[LookupStrategy] {
        &self.strategies
    }

    pub async fn resolve(&self, identifier: &str) -> Result<Account, AuthError> {
        if identifier.trim().is_empty() {
            return Err(AuthError::UnknownIdentity);
        }

        for strategy in &self.strategies {
            if let Some(account) = strategy.lookup(&self.store, identifier).await? {
                debug!(?strategy, account_id = account.id, "Resolved login identifier");
                return Ok(account);
            }
        }

        Err(AuthError::UnknownIdentity)
    }
}
