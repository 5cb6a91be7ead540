//! Generic worker-pool machinery shared by the scraping and
//! classification orchestrators: a `get_job → process_job → record
//! stats` loop, per-worker stats, aggregate orchestrator stats, a
//! health check, and cooperative shutdown.

use crate::queue::{Job, PriorityQueue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const JOB_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// One job's worth of work, implemented by the scraping and
/// classification orchestrators.
#[async_trait]
pub trait JobProcessor<T>: Send + Sync {
    /// Process `payload`. `true` means an alert was generated (only
    /// meaningful for the classification orchestrator; scraping
    /// workers always report `false`).
    async fn process(&self, payload: T) -> anyhow::Result<bool>;
}

/// Snapshot of a single worker's lifetime counters.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Worker identifier (index within the pool).
    pub worker_id: usize,
    /// Total jobs pulled off the queue.
    pub processed: u64,
    /// Jobs that completed without error.
    pub succeeded: u64,
    /// Jobs that returned an error.
    pub failed: u64,
    /// Jobs that generated an alert (classification workers only).
    pub alerts_generated: u64,
    /// When the worker started.
    pub started_at: Option<DateTime<Utc>>,
    /// Job currently being processed, if any.
    pub current_job_id: Option<uuid::Uuid>,
}

struct WorkerCounters {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    alerts_generated: AtomicU64,
    started_at: Utc,
}

/// Aggregate stats across the whole pool.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorStats {
    /// Current queue depth.
    pub queue_size: usize,
    /// Configured maximum queue depth.
    pub queue_max: usize,
    /// Whether the queue is currently full.
    pub queue_full: bool,
    /// Per-worker stats snapshots.
    pub workers: Vec<WorkerStats>,
    /// Sum of `processed` across all workers.
    pub total_processed: u64,
    /// Sum of `succeeded` across all workers.
    pub total_succeeded: u64,
    /// Sum of `failed` across all workers.
    pub total_failed: u64,
    /// `total_succeeded / total_processed`, `0.0` if nothing processed yet.
    pub success_rate: f64,
    /// `total_processed` scaled to a per-hour rate since pool start.
    pub throughput_per_hour: f64,
    /// How long the pool has been running.
    pub uptime: chrono::Duration,
}

/// Health check result.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Whether the orchestrator's worker tasks are still running.
    pub orchestrator_running: bool,
    /// `true` unless a worker task has halted unexpectedly.
    pub workers_healthy: bool,
    /// `true` unless the queue is at capacity.
    pub queue_healthy: bool,
    /// `true` unless a collaborator reachability probe failed.
    pub components_healthy: bool,
    /// Human-readable descriptions of anything unhealthy.
    pub issues: Vec<String>,
}

/// A pool of workers pulling from a shared [`PriorityQueue`].
pub struct WorkerPool<T> {
    queue: Arc<PriorityQueue<T>>,
    handles: Vec<JoinHandle<()>>,
    counters: Vec<Arc<WorkerCounters>>,
    running: Arc<AtomicBool>,
    current_jobs: Vec<Arc<std::sync::Mutex<Option<uuid::Uuid>>>>,
    started_at: DateTime<Utc>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `worker_count` workers pulling from `queue` and driving
    /// each job through `processor`.
    pub fn setup(
        queue: Arc<PriorityQueue<T>>,
        processor: Arc<dyn JobProcessor<T>>,
        worker_count: usize,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let mut handles = Vec::with_capacity(worker_count);
        let mut counters = Vec::with_capacity(worker_count);
        let mut current_jobs = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let counter = Arc::new(WorkerCounters {
                processed: AtomicU64::new(0),
                succeeded: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                alerts_generated: AtomicU64::new(0),
                started_at: Utc::now(),
            });
            let current_job = Arc::new(std::sync::Mutex::new(None));

            let handle = tokio::spawn(worker_loop(
                worker_id,
                queue.clone(),
                processor.clone(),
                counter.clone(),
                current_job.clone(),
                running.clone(),
            ));

            handles.push(handle);
            counters.push(counter);
            current_jobs.push(current_job);
        }

        Self {
            queue,
            handles,
            counters,
            running,
            current_jobs,
            started_at: Utc::now(),
        }
    }

    /// Signal workers to stop pulling new jobs, then wait for any
    /// in-flight job to finish before the tasks exit. Safe to call
    /// when the host runtime is already shutting down: a failure to
    /// join a handle is logged and treated as already-stopped rather
    /// than propagated.
    pub async fn cleanup(self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "worker task did not join cleanly during shutdown");
            }
        }
    }

    /// Snapshot stats across the queue and every worker.
    pub async fn stats(&self) -> OrchestratorStats {
        let queue_size = self.queue.len().await;
        let queue_max = self.queue.max_len();
        let workers: Vec<WorkerStats> = self
            .counters
            .iter()
            .zip(self.current_jobs.iter())
            .enumerate()
            .map(|(worker_id, (c, job))| WorkerStats {
                worker_id,
                processed: c.processed.load(Ordering::Relaxed),
                succeeded: c.succeeded.load(Ordering::Relaxed),
                failed: c.failed.load(Ordering::Relaxed),
                alerts_generated: c.alerts_generated.load(Ordering::Relaxed),
                started_at: Some(c.started_at),
                current_job_id: *job.lock().expect("current-job lock poisoned"),
            })
            .collect();

        let total_processed: u64 = workers.iter().map(|w| w.processed).sum();
        let total_succeeded: u64 = workers.iter().map(|w| w.succeeded).sum();
        let total_failed: u64 = workers.iter().map(|w| w.failed).sum();
        let uptime = Utc::now() - self.started_at;
        let hours = (uptime.num_milliseconds() as f64 / 3_600_000.0).max(1.0 / 3600.0);

        OrchestratorStats {
            queue_size,
            queue_max,
            queue_full: queue_size >= queue_max,
            workers,
            total_processed,
            total_succeeded,
            total_failed,
            success_rate: if total_processed == 0 {
                0.0
            } else {
                total_succeeded as f64 / total_processed as f64
            },
            throughput_per_hour: total_processed as f64 / hours,
            uptime,
        }
    }

    /// Evaluate pool health. `components_healthy` is always `true`
    /// here since collaborator reachability is probed upstream by the
    /// concrete orchestrator, which has the collaborator handles.
    pub async fn health(&self) -> HealthCheck {
        let mut issues = Vec::new();
        let workers_healthy = self.handles.iter().all(|h| !h.is_finished());
        if !workers_healthy {
            issues.push("one or more worker tasks halted unexpectedly".to_string());
        }
        let queue_full = self.queue.is_full().await;
        if queue_full {
            issues.push("queue is at capacity".to_string());
        }
        let orchestrator_running = self.running.load(Ordering::SeqCst);

        HealthCheck {
            orchestrator_running,
            workers_healthy,
            queue_healthy: !queue_full,
            components_healthy: true,
            issues,
        }
    }
}

async fn worker_loop<T: Send + 'static>(
    worker_id: usize,
    queue: Arc<PriorityQueue<T>>,
    processor: Arc<dyn JobProcessor<T>>,
    counters: Arc<WorkerCounters>,
    current_job: Arc<std::sync::Mutex<Option<uuid::Uuid>>>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        let job: Option<Job<T>> = queue.get_job(JOB_POLL_TIMEOUT).await;
        let Some(job) = job else {
            continue;
        };

        *current_job.lock().expect("current-job lock poisoned") = Some(job.job_id);
        counters.processed.fetch_add(1, Ordering::Relaxed);

        match std::panic::AssertUnwindSafe(processor.process(job.payload))
            .catch_unwind()
            .await
        {
            Ok(Ok(generated_alert)) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                if generated_alert {
                    counters.alerts_generated.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(worker_id, job_id = %job.job_id, error = %e, "job processing failed");
            }
            Err(_) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(worker_id, job_id = %job.job_id, "job processing panicked");
            }
        }

        *current_job.lock().expect("current-job lock poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Job;

    struct EchoProcessor {
        fail_on: u32,
    }

    #[async_trait]
    impl JobProcessor<u32> for EchoProcessor {
        async fn process(&self, payload: u32) -> anyhow::Result<bool> {
            if payload == self.fail_on {
                anyhow::bail!("simulated failure for {payload}");
            }
            Ok(payload % 2 == 0)
        }
    }

    #[tokio::test]
    async fn pool_drains_queue_and_tracks_stats() {
        let queue = Arc::new(PriorityQueue::<u32>::new());
        for i in 0..5 {
            queue.enqueue(Job::new(1, Utc::now(), i)).await;
        }
        let processor = Arc::new(EchoProcessor { fail_on: 3 });
        let pool = WorkerPool::setup(queue, processor, 2);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let stats = pool.stats().await;
        assert_eq!(stats.total_processed, 5);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.total_succeeded, 4);

        pool.cleanup().await;
    }

    #[tokio::test]
    async fn health_reports_queue_full_when_at_capacity() {
        let queue = Arc::new(PriorityQueue::<u32>::with_max_len(1));
        queue.enqueue(Job::new(1, Utc::now(), 1)).await;
        let processor = Arc::new(EchoProcessor { fail_on: u32::MAX });
        let pool = WorkerPool::setup(queue.clone(), processor, 1);

        queue.enqueue(Job::new(1, Utc::now(), 2)).await;
        let health = pool.health().await;
        assert!(health.orchestrator_running);

        pool.cleanup().await;
    }
}
