//! Housekeeping command handlers

use chrono::Utc;

use crate::config::Config;
use crate::db::Store;
use crate::services::HousekeepingService;

async fn housekeeping(config: &Config) -> anyhow::Result<HousekeepingService> {
    let store = Store::new(&config.general.database_path).await?;
    Ok(HousekeepingService::new(
        store,
        config.scheduler.registration_ttl_hours,
    ))
}

pub async fn cmd_seed_roles(config: &Config) -> anyhow::Result<()> {
    let created = housekeeping(config).await?.seed_roles().await?;

    if created == 0 {
        println!("All default roles already exist.");
    } else {
        println!("✓ Seeded {created} role(s).");
    }
    Ok(())
}

pub async fn cmd_housekeeping(config: &Config) -> anyhow::Result<()> {
    let report = housekeeping(config).await?.run_all(Utc::now()).await?;

    println!("Housekeeping finished");
    println!("{:-<40}", "");
    println!("  Roles seeded:          {}", report.roles_seeded);
    println!("  Discounts updated:     {}", report.discounts_updated);
    println!("  Registrations purged:  {}", report.registrations_purged);
    Ok(())
}
