use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::db::{canonical_email, timestamp};
use crate::entities::pending_registrations;

pub struct RegistrationRepository {
    conn: DatabaseConnection,
}

impl RegistrationRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Record a registration awaiting verification. Returns the verification token.
    pub async fn add(&self, email: &str, created_at: DateTime<Utc>) -> Result<String> {
        let token = generate_verification_token();

        pending_registrations::ActiveModel {
            email: Set(canonical_email(email)),
            verification_token: Set(token.clone()),
            created_at: Set(timestamp(created_at)),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert pending registration")?;

        Ok(token)
    }

    /// Delete registrations created strictly before `cutoff`
    pub async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = pending_registrations::Entity::delete_many()
            .filter(pending_registrations::Column::CreatedAt.lt(timestamp(cutoff)))
            .exec(&self.conn)
            .await
            .context("Failed to delete stale registrations")?;

        Ok(result.rows_affected)
    }

    pub async fn exists(&self, email: &str) -> Result<bool> {
        let row = pending_registrations::Entity::find()
            .filter(pending_registrations::Column::Email.eq(canonical_email(email)))
            .one(&self.conn)
            .await
            .context("Failed to query pending registration")?;

        Ok(row.is_some())
    }
}

/// Generate a random verification token (64 character hex string)
#[must_use]
pub fn generate_verification_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}
