use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::models::account::{Account, AccountStatus, Role};

pub mod migrator;
pub mod repositories;

pub use repositories::account::{InsertOutcome, NewFederatedAccount, NewLocalAccount};

/// Canonical text form for stored timestamps. Fixed width so string order is time order.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Stored and queried form of an email address. Mailboxes compare case-insensitively.
#[must_use]
pub fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        if in_memory {
            // The database lives only as long as its single connection
            opt.max_connections(1).min_connections(1);
        } else {
            opt.max_connections(max_connections)
                .min_connections(min_connections)
                .idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn account_repo(&self) -> repositories::account::AccountRepository {
        repositories::account::AccountRepository::new(self.conn.clone())
    }

    fn role_repo(&self) -> repositories::role::RoleRepository {
        repositories::role::RoleRepository::new(self.conn.clone())
    }

    fn discount_repo(&self) -> repositories::discount::DiscountRepository {
        repositories::discount::DiscountRepository::new(self.conn.clone())
    }

    fn registration_repo(&self) -> repositories::registration::RegistrationRepository {
        repositories::registration::RegistrationRepository::new(self.conn.clone())
    }

    // Accounts

    pub async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.account_repo().get_by_username(username).await
    }

    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.account_repo().get_by_email(email).await
    }

    pub async fn get_account(&self, id: i32) -> Result<Option<Account>> {
        self.account_repo().get_by_id(id).await
    }

    pub async fn create_federated_account(
        &self,
        new: NewFederatedAccount,
    ) -> Result<InsertOutcome> {
        self.account_repo().create_federated(new).await
    }

    pub async fn create_local_account(&self, new: NewLocalAccount) -> Result<Account> {
        self.account_repo().create_local(new).await
    }

    pub async fn update_account_avatar(&self, id: i32, avatar_url: &str) -> Result<()> {
        self.account_repo().update_avatar(id, avatar_url).await
    }

    pub async fn update_account_status(&self, id: i32, status: AccountStatus) -> Result<()> {
        self.account_repo().update_status(id, status).await
    }

    pub async fn count_accounts_by_email(&self, email: &str) -> Result<u64> {
        self.account_repo().count_by_email(email).await
    }

    // Roles

    pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.role_repo().get_by_name(name).await
    }

    pub async fn ensure_role(&self, name: &str) -> Result<bool> {
        self.role_repo().ensure_exists(name).await
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        self.role_repo().list().await
    }

    // Discounts

    pub async fn add_discount(
        &self,
        code: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i32> {
        self.discount_repo()
            .add(code, starts_at, ends_at, now)
            .await
    }

    pub async fn get_discount_status(&self, code: &str) -> Result<Option<String>> {
        self.discount_repo().get_status(code).await
    }

    pub async fn refresh_discount_statuses(&self, now: DateTime<Utc>) -> Result<u64> {
        self.discount_repo().refresh_statuses(now).await
    }

    // Pending registrations

    pub async fn add_pending_registration(
        &self,
        email: &str,
        created_at: DateTime<Utc>,
    ) -> Result<String> {
        self.registration_repo().add(email, created_at).await
    }

    pub async fn pending_registration_exists(&self, email: &str) -> Result<bool> {
        self.registration_repo().exists(email).await
    }

    pub async fn delete_registrations_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.registration_repo().delete_created_before(cutoff).await
    }
}
