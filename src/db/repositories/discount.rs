use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tracing::warn;

use crate::db::timestamp;
use crate::entities::discounts;
use crate::models::discount::DiscountStatus;

pub struct DiscountRepository {
    conn: DatabaseConnection,
}

impl DiscountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a discount window; status is computed against `now`
    pub async fn add(
        &self,
        code: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i32> {
        let model = discounts::ActiveModel {
            code: Set(code.to_string()),
            starts_at: Set(timestamp(starts_at)),
            ends_at: Set(timestamp(ends_at)),
            status: Set(DiscountStatus::at(starts_at, ends_at, now)
                .as_str()
                .to_string()),
            updated_at: Set(timestamp(now)),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert discount")?;

        Ok(model.id)
    }

    /// Get the stored status for a discount code
    pub async fn get_status(&self, code: &str) -> Result<Option<String>> {
        use sea_orm::{ColumnTrait, QueryFilter};

        let discount = discounts::Entity::find()
            .filter(discounts::Column::Code.eq(code))
            .one(&self.conn)
            .await
            .context("Failed to query discount by code")?;

        Ok(discount.map(|d| d.status))
    }

    /// Recompute every discount's status at `now`. Returns the number of rows changed.
    pub async fn refresh_statuses(&self, now: DateTime<Utc>) -> Result<u64> {
        let all = discounts::Entity::find()
            .all(&self.conn)
            .await
            .context("Failed to list discounts")?;

        let mut changed = 0;
        for discount in all {
            let (Ok(starts_at), Ok(ends_at)) = (
                DateTime::parse_from_rfc3339(&discount.starts_at),
                DateTime::parse_from_rfc3339(&discount.ends_at),
            ) else {
                warn!(code = %discount.code, "Skipping discount with unparsable window");
                continue;
            };

            let status = DiscountStatus::at(starts_at.to_utc(), ends_at.to_utc(), now);
            if discount.status == status.as_str() {
                continue;
            }

            let mut active: discounts::ActiveModel = discount.into();
            active.status = Set(status.as_str().to_string());
            active.updated_at = Set(timestamp(now));
            active.update(&self.conn).await?;
            changed += 1;
        }

        Ok(changed)
    }
}
