//! Scheduling Orchestrator: schedules a per-website monitoring job on
//! its own check interval, a system health check every 5 minutes, and
//! a daily maintenance job. The actual work of each tick is delegated
//! to an external [`WorkflowEngine`] collaborator; this module only
//! owns timing and lifecycle.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Default interval between system health checks.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default interval between daily maintenance runs.
pub const DAILY_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// The work a scheduled tick delegates to. Production implementations
/// wrap whatever runs the actual scrape/classify/cleanup workflows.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Run the monitoring workflow for one website.
    async fn run_monitoring_workflow(&self, website_id: Uuid) -> anyhow::Result<()>;

    /// Run a system-wide health check.
    async fn run_health_check(&self) -> anyhow::Result<()>;

    /// Run daily maintenance (pruning, aggregate rollups, etc.).
    async fn run_daily_maintenance(&self) -> anyhow::Result<()>;
}

/// Schedules and supervises the three recurring jobs, plus ad hoc
/// immediate workflow runs.
pub struct SchedulingOrchestrator {
    engine: Arc<dyn WorkflowEngine>,
    website_jobs: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    health_check_job: Mutex<Option<JoinHandle<()>>>,
    maintenance_job: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulingOrchestrator {
    /// Build an orchestrator around `engine`, immediately starting the
    /// system health check and daily maintenance jobs.
    #[must_use]
    pub fn start(engine: Arc<dyn WorkflowEngine>) -> Self {
        let health_check_job = spawn_periodic(engine.clone(), HEALTH_CHECK_INTERVAL, |engine| {
            Box::pin(async move {
                if let Err(e) = engine.run_health_check().await {
                    tracing::warn!(error = %e, "system health check failed");
                }
            })
        });
        let maintenance_job = spawn_periodic(engine.clone(), DAILY_MAINTENANCE_INTERVAL, |engine| {
            Box::pin(async move {
                if let Err(e) = engine.run_daily_maintenance().await {
                    tracing::error!(error = %e, "daily maintenance run failed");
                }
            })
        });

        Self {
            engine,
            website_jobs: Mutex::new(HashMap::new()),
            health_check_job: Mutex::new(Some(health_check_job)),
            maintenance_job: Mutex::new(Some(maintenance_job)),
        }
    }

    /// Start (or restart) the recurring monitoring job for `website_id`
    /// on `check_interval`.
    pub fn schedule_website_monitoring(&self, website_id: Uuid, check_interval: Duration) {
        self.unschedule_website_monitoring(website_id);
        let engine = self.engine.clone();
        let handle = spawn_periodic(engine, check_interval, move |engine| {
            Box::pin(async move {
                if let Err(e) = engine.run_monitoring_workflow(website_id).await {
                    tracing::warn!(%website_id, error = %e, "monitoring workflow failed");
                }
            })
        });
        self.website_jobs
            .lock()
            .expect("scheduling lock poisoned")
            .insert(website_id, handle);
    }

    /// Stop the recurring monitoring job for `website_id`, if one is running.
    pub fn unschedule_website_monitoring(&self, website_id: Uuid) {
        if let Some(handle) = self.website_jobs.lock().expect("scheduling lock poisoned").remove(&website_id) {
            handle.abort();
        }
    }

    /// Run one website's monitoring workflow immediately, outside its
    /// regular schedule.
    pub async fn execute_immediate_workflow(&self, website_id: Uuid) -> anyhow::Result<()> {
        self.engine.run_monitoring_workflow(website_id).await
    }

    /// Number of websites currently under active scheduling.
    #[must_use]
    pub fn scheduled_website_count(&self) -> usize {
        self.website_jobs.lock().expect("scheduling lock poisoned").len()
    }

    /// Stop every scheduled job (per-website, health check, and
    /// maintenance).
    pub fn shutdown(&self) {
        for (_, handle) in self.website_jobs.lock().expect("scheduling lock poisoned").drain() {
            handle.abort();
        }
        if let Some(handle) = self.health_check_job.lock().expect("scheduling lock poisoned").take() {
            handle.abort();
        }
        if let Some(handle) = self.maintenance_job.lock().expect("scheduling lock poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for SchedulingOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

type TickFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

fn spawn_periodic<F>(engine: Arc<dyn WorkflowEngine>, interval: Duration, tick: F) -> JoinHandle<()>
where
    F: Fn(Arc<dyn WorkflowEngine>) -> TickFuture + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tick(engine.clone()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEngine {
        monitoring_calls: AtomicUsize,
        health_calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkflowEngine for CountingEngine {
        async fn run_monitoring_workflow(&self, _website_id: Uuid) -> anyhow::Result<()> {
            self.monitoring_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn run_health_check(&self) -> anyhow::Result<()> {
            self.health_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn run_daily_maintenance(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn execute_immediate_workflow_bypasses_the_schedule() {
        let engine = Arc::new(CountingEngine {
            monitoring_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
        });
        let orchestrator = SchedulingOrchestrator::start(engine.clone());
        let website_id = Uuid::new_v4();
        orchestrator.execute_immediate_workflow(website_id).await.unwrap();
        assert_eq!(engine.monitoring_calls.load(Ordering::SeqCst), 1);
        orchestrator.shutdown();
    }

    #[tokio::test]
    async fn scheduling_and_unscheduling_tracks_active_website_count() {
        let engine = Arc::new(CountingEngine {
            monitoring_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
        });
        let orchestrator = SchedulingOrchestrator::start(engine);
        let website_id = Uuid::new_v4();
        orchestrator.schedule_website_monitoring(website_id, Duration::from_secs(60));
        assert_eq!(orchestrator.scheduled_website_count(), 1);
        orchestrator.unschedule_website_monitoring(website_id);
        assert_eq!(orchestrator.scheduled_website_count(), 0);
        orchestrator.shutdown();
    }
}
