use anyhow::{Context, Result};
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::services::HousekeepingService;

type TaskFuture = Pin<Box<dyn Future<Output = Result<u64>> + Send>>;
type Task = Arc<dyn Fn(HousekeepingService) -> TaskFuture + Send + Sync>;

/// Runs housekeeping tasks on their cron schedules until stopped.
pub struct Scheduler {
    housekeeping: HousekeepingService,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(housekeeping: HousekeepingService, config: SchedulerConfig) -> Self {
        Self {
            housekeeping,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        let mut sched = JobScheduler::new().await?;
        for job in self.jobs()? {
            sched.add(job).await?;
        }
        sched.start().await?;

        info!(
            role_seed = %self.config.role_seed_cron,
            discount_refresh = %self.config.discount_refresh_cron,
            registration_cleanup = %self.config.registration_cleanup_cron,
            "Housekeeping jobs scheduled"
        );

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    fn jobs(&self) -> Result<Vec<Job>> {
        let seed: Task = Arc::new(|h: HousekeepingService| {
            Box::pin(async move { h.seed_roles().await }) as TaskFuture
        });
        let discounts: Task = Arc::new(|h: HousekeepingService| {
            Box::pin(async move { h.refresh_discount_statuses(Utc::now()).await }) as TaskFuture
        });
        let registrations: Task = Arc::new(|h: HousekeepingService| {
            Box::pin(async move { h.purge_stale_registrations(Utc::now()).await }) as TaskFuture
        });

        Ok(vec![
            self.job("seed_roles", &self.config.role_seed_cron, seed)?,
            self.job(
                "refresh_discounts",
                &self.config.discount_refresh_cron,
                discounts,
            )?,
            self.job(
                "purge_registrations",
                &self.config.registration_cleanup_cron,
                registrations,
            )?,
        ])
    }

    fn job(&self, name: &'static str, cron: &str, task: Task) -> Result<Job> {
        let housekeeping = self.housekeeping.clone();
        let in_flight = Arc::new(AtomicBool::new(false));

        Job::new_async(cron, move |_uuid, _lock| {
            let future = task(housekeeping.clone());
            let in_flight = Arc::clone(&in_flight);
            Box::pin(async move {
                run_guarded(name, &in_flight, future).await;
            })
        })
        .with_context(|| format!("Invalid cron expression for {name}: {cron}"))
    }
}

/// Clears the in-flight flag even if the task panics.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Run one tick of a job unless the previous tick is still going.
/// Returns whether the task ran. Failures are logged, never propagated.
pub async fn run_guarded<F>(name: &str, in_flight: &AtomicBool, task: F) -> bool
where
    F: Future<Output = Result<u64>>,
{
    if in_flight
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        warn!(event = "job_skipped", job_name = name, "Previous run still in progress");
        return false;
    }
    let _guard = InFlight(in_flight);

    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = name, "Starting scheduled job");

    match task.await {
        Ok(affected) => info!(
            event = "job_finished",
            job_name = name,
            affected,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Scheduled job finished"
        ),
        Err(e) => error!(
            event = "job_failed",
            job_name = name,
            error = %e,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Scheduled job failed"
        ),
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::temp_store;

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let in_flight = AtomicBool::new(true);
        let mut ran = false;

        let executed = run_guarded("test", &in_flight, async {
            ran = true;
            Ok::<u64, anyhow::Error>(1)
        })
        .await;

        assert!(!executed);
        assert!(!ran);
        assert!(in_flight.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn failures_are_swallowed_and_guard_released() {
        let in_flight = AtomicBool::new(false);

        let executed = run_guarded("test", &in_flight, async {
            Err::<u64, _>(anyhow::anyhow!("database unavailable"))
        })
        .await;

        assert!(executed);
        assert!(!in_flight.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn default_cron_expressions_build_jobs() {
        let store = temp_store().await;
        let scheduler = Scheduler::new(
            HousekeepingService::new(store.clone(), 24),
            SchedulerConfig::default(),
        );

        assert_eq!(scheduler.jobs().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn malformed_cron_is_rejected() {
        let store = temp_store().await;
        let scheduler = Scheduler::new(
            HousekeepingService::new(store.clone(), 24),
            SchedulerConfig {
                discount_refresh_cron: "every five minutes".to_string(),
                ..SchedulerConfig::default()
            },
        );

        assert!(scheduler.jobs().is_err());
    }

    #[tokio::test]
    async fn disabled_scheduler_returns_immediately() {
        let store = temp_store().await;
        let scheduler = Scheduler::new(
            HousekeepingService::new(store.clone(), 24),
            SchedulerConfig {
                enabled: false,
                ..SchedulerConfig::default()
            },
        );

        scheduler.start().await.unwrap();
        assert!(!scheduler.is_running().await);
    }
}
