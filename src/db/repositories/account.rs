use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};

use crate::db::{canonical_email, timestamp};
use crate::entities::{accounts, roles};
use crate::models::account::{Account, AccountStatus, Role};

/// Fields for an account provisioned from a federated login.
#[derive(Debug, Clone)]
pub struct NewFederatedAccount {
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role_id: i32,
}

/// Fields for an account with a local password (registration, admin tooling).
#[derive(Debug, Clone)]
pub struct NewLocalAccount {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: String,
    pub status: AccountStatus,
    pub role_id: i32,
}

/// Outcome of an insert that may race with another writer on a unique column.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(Account),
    Conflict,
}

fn to_account(model: accounts::Model, role: Option<roles::Model>) -> Result<Account> {
    let role = role.ok_or_else(|| {
        anyhow::anyhow!(
            "Account {} references missing role {}",
            model.id,
            model.role_id
        )
    })?;

    let status = model
        .status
        .parse::<AccountStatus>()
        .map_err(|e| anyhow::anyhow!("Account {}: {e}", model.id))?;

    Ok(Account {
        id: model.id,
        username: model.username,
        email: model.email,
        password_hash: model.password_hash,
        status,
        role: Role {
            id: role.id,
            name: role.name,
        },
        name: model.name,
        avatar_url: model.avatar_url,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

pub struct AccountRepository {
    conn: DatabaseConnection,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get account by username, role included
    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        let row = accounts::Entity::find()
            .filter(accounts::Column::Username.eq(username))
            .find_also_related(roles::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query account by username")?;

        row.map(|(account, role)| to_account(account, role))
            .transpose()
    }

    /// Get account by email, role included
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(canonical_email(email)))
            .find_also_related(roles::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query account by email")?;

        row.map(|(account, role)| to_account(account, role))
            .transpose()
    }

    /// Get account by ID, role included
    pub async fn get_by_id(&self, id: i32) -> Result<Option<Account>> {
        let row = accounts::Entity::find_by_id(id)
            .find_also_related(roles::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query account by ID")?;

        row.map(|(account, role)| to_account(account, role))
            .transpose()
    }

    /// Insert an ACTIVE account without a local password.
    ///
    /// A unique violation on `email` is reported as [`InsertOutcome::Conflict`]
    /// so the caller can re-read the row the other writer created.
    pub async fn create_federated(&self, new: NewFederatedAccount) -> Result<InsertOutcome> {
        let now = timestamp(chrono::Utc::now());

        let active = accounts::ActiveModel {
            username: Set(None),
            email: Set(Some(canonical_email(&new.email))),
            password_hash: Set(None),
            status: Set(AccountStatus::Active.as_str().to_string()),
            role_id: Set(new.role_id),
            name: Set(new.name),
            avatar_url: Set(new.avatar_url),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => {
                let account = self
                    .get_by_id(model.id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("Account {} vanished after insert", model.id))?;
                Ok(InsertOutcome::Created(account))
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(InsertOutcome::Conflict)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to insert federated account")),
        }
    }

    /// Insert an account with a local password hash
    pub async fn create_local(&self, new: NewLocalAccount) -> Result<Account> {
        if new.username.is_none() && new.email.is_none() {
            anyhow::bail!("Account needs a username or an email");
        }

        let now = timestamp(chrono::Utc::now());

        let model = accounts::ActiveModel {
            username: Set(new.username),
            email: Set(new.email.as_deref().map(canonical_email)),
            password_hash: Set(Some(new.password_hash)),
            status: Set(new.status.as_str().to_string()),
            role_id: Set(new.role_id),
            name: Set(None),
            avatar_url: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert account")?;

        self.get_by_id(model.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account {} vanished after insert", model.id))
    }

    /// Set avatar URL for an account
    pub async fn update_avatar(&self, id: i32, avatar_url: &str) -> Result<()> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for avatar update")?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = account.into();
        active.avatar_url = Set(Some(avatar_url.to_string()));
        active.updated_at = Set(timestamp(chrono::Utc::now()));
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Set login status for an account
    pub async fn update_status(&self, id: i32, status: AccountStatus) -> Result<()> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for status update")?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = account.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(timestamp(chrono::Utc::now()));
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Count accounts registered under an email (0 or 1 while the unique index holds)
    pub async fn count_by_email(&self, email: &str) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        accounts::Entity::find()
            .filter(accounts::Column::Email.eq(canonical_email(email)))
            .count(&self.conn)
            .await
            .context("Failed to count accounts by email")
    }
}
