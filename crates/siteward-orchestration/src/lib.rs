//! # siteward-orchestration
//!
//! Bounded priority queues and worker pools that drive scraping,
//! classification, and scheduling on top of `siteward-core` and
//! `siteward-alerts`.
//!
//! ## Modules
//!
//! - [`queue`] — bounded priority job queue
//! - [`worker`] — generic worker-pool loop, stats, and health check
//! - [`scraping`] — fetch-and-persist worker pool
//! - [`classification`] — pipeline-driving worker pool
//! - [`scheduling`] — cron-style per-website and system-wide jobs

pub mod classification;
pub mod error;
pub mod queue;
pub mod scheduling;
pub mod scraping;
pub mod worker;

pub use classification::{
    BaselineData, ClassificationJob, ClassificationWorker, ContentData, SnapshotStore, VectorStore,
};
pub use error::{Error, Result};
pub use queue::{Job, PriorityQueue, DEFAULT_MAX_QUEUE_LEN};
pub use scheduling::{SchedulingOrchestrator, WorkflowEngine};
pub use scraping::{ScrapeJob, ScrapeResult, ScrapeSink, Scraper, ScrapingWorker};
pub use worker::{HealthCheck, JobProcessor, OrchestratorStats, WorkerPool, WorkerStats};
