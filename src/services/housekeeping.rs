use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::db::Store;
use crate::models::account::DEFAULT_ROLES;

/// Totals from one pass over every housekeeping task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HousekeepingReport {
    pub roles_seeded: u64,
    pub discounts_updated: u64,
    pub registrations_purged: u64,
}

/// Idempotent maintenance tasks run at bootstrap and on the scheduler.
#[derive(Clone)]
pub struct HousekeepingService {
    store: Store,
    registration_ttl: Duration,
}

impl HousekeepingService {
    #[must_use]
    pub fn new(store: Store, registration_ttl_hours: i64) -> Self {
        Self {
            store,
            registration_ttl: Duration::hours(registration_ttl_hours),
        }
    }

    /// Ensure every default role exists. Returns how many were created.
    pub async fn seed_roles(&self) -> Result<u64> {
        let mut created = 0;
        for role in DEFAULT_ROLES {
            if self.store.ensure_role(role).await? {
                created += 1;
            }
        }

        if created > 0 {
            info!(created, "Seeded default roles");
        }
        Ok(created)
    }

    pub async fn refresh_discount_statuses(&self, now: DateTime<Utc>) -> Result<u64> {
        let changed = self.store.refresh_discount_statuses(now).await?;
        if changed > 0 {
            info!(changed, "Updated discount statuses");
        }
        Ok(changed)
    }

    /// Drop registrations that were never verified within the TTL.
    pub async fn purge_stale_registrations(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - self.registration_ttl;
        let deleted = self.store.delete_registrations_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted, cutoff = %cutoff, "Purged stale registrations");
        }
        Ok(deleted)
    }

    pub async fn run_all(&self, now: DateTime<Utc>) -> Result<HousekeepingReport> {
        Ok(HousekeepingReport {
            roles_seeded: self.seed_roles().await?,
            discounts_updated: self.refresh_discount_statuses(now).await?,
            registrations_purged: self.purge_stale_registrations(now).await?,
        })
    }
}
