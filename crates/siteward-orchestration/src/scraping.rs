//! Scraping Orchestrator: a worker pool that fetches a website's
//! current content and hands it to a collaborator for persistence.
//!
//! Identical shape to the classification orchestrator (same queue and
//! worker-pool machinery), different work: a scrape never generates
//! an alert, so [`JobProcessor::process`] always reports `false`.

use crate::worker::JobProcessor;
use async_trait::async_trait;

/// One website to scrape.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    /// Website being scraped.
    pub website_id: uuid::Uuid,
    /// URL to fetch.
    pub url: String,
}

/// Result of one scrape, handed to the persistence collaborator.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    /// Website the scrape was for.
    pub website_id: uuid::Uuid,
    /// Raw bytes fetched.
    pub raw_bytes: Vec<u8>,
    /// HTTP status observed.
    pub http_status: u16,
    /// Wall-clock time the fetch took.
    pub response_time_ms: u64,
    /// `Content-Type` header, if present.
    pub content_type: String,
}

/// Fetches a website's current content. An external collaborator:
/// production implementations wrap an HTTP client, headless browser,
/// or vendor scraping API.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch `url` and return the raw result.
    async fn scrape(&self, url: &str) -> anyhow::Result<ScrapeResult>;
}

/// Persists a completed scrape as a new snapshot, queuing it for
/// classification.
#[async_trait]
pub trait ScrapeSink: Send + Sync {
    /// Store `result` and enqueue it for classification.
    async fn store_and_enqueue(&self, result: ScrapeResult) -> anyhow::Result<()>;
}

/// Runs one scrape per job: fetch, then hand off to the sink.
pub struct ScrapingWorker {
    scraper: std::sync::Arc<dyn Scraper>,
    sink: std::sync::Arc<dyn ScrapeSink>,
}

impl ScrapingWorker {
    /// Build a worker from its collaborators.
    #[must_use]
    pub fn new(scraper: std::sync::Arc<dyn Scraper>, sink: std::sync::Arc<dyn ScrapeSink>) -> Self {
        Self { scraper, sink }
    }
}

#[async_trait]
impl JobProcessor<ScrapeJob> for ScrapingWorker {
    async fn process(&self, job: ScrapeJob) -> anyhow::Result<bool> {
        let result = self.scraper.scrape(&job.url).await?;
        self.sink.store_and_enqueue(result).await?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeScraper;
    #[async_trait]
    impl Scraper for FakeScraper {
        async fn scrape(&self, url: &str) -> anyhow::Result<ScrapeResult> {
            Ok(ScrapeResult {
                website_id: uuid::Uuid::new_v4(),
                raw_bytes: url.as_bytes().to_vec(),
                http_status: 200,
                response_time_ms: 5,
                content_type: "text/html".to_string(),
            })
        }
    }

    struct CountingSink(AtomicUsize);
    #[async_trait]
    impl ScrapeSink for CountingSink {
        async fn store_and_enqueue(&self, _result: ScrapeResult) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn successful_scrape_is_handed_to_the_sink() {
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let worker = ScrapingWorker::new(Arc::new(FakeScraper), sink.clone());
        let job = ScrapeJob {
            website_id: uuid::Uuid::new_v4(),
            url: "https://example.com".to_string(),
        };
        let generated_alert = worker.process(job).await.unwrap();
        assert!(!generated_alert);
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }
}
