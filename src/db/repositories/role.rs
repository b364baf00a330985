use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use tracing::info;

use crate::db::timestamp;
use crate::entities::roles;
use crate::models::account::Role;

impl From<roles::Model> for Role {
    fn from(model: roles::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

pub struct RoleRepository {
    conn: DatabaseConnection,
}

impl RoleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get role by name
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = roles::Entity::find()
            .filter(roles::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query role by name")?;

        Ok(role.map(Role::from))
    }

    /// Create the role unless it already exists. Returns `true` when a row was inserted.
    pub async fn ensure_exists(&self, name: &str) -> Result<bool> {
        if self.get_by_name(name).await?.is_some() {
            return Ok(false);
        }

        let active = roles::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(timestamp(chrono::Utc::now())),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(_) => {
                info!(role = name, "Seeded role");
                Ok(true)
            }
            // Another instance seeded it between our read and write
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(false)
            }
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to insert role {name}"))),
        }
    }

    /// List all roles ordered by ID
    pub async fn list(&self) -> Result<Vec<Role>> {
        use sea_orm::QueryOrder;

        let roles = roles::Entity::find()
            .order_by_asc(roles::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list roles")?;

        Ok(roles.into_iter().map(Role::from).collect())
    }
}
