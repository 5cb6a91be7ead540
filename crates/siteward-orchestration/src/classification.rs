//! Classification Orchestrator: a worker pool that runs each queued
//! snapshot through the detection pipeline, persists vectors
//! best-effort, raises an alert best-effort, and records the verdict.

use crate::worker::JobProcessor;
use async_trait::async_trait;
use siteward_alerts::{AlertContext, AlertGenerator, NotificationRouter};
use siteward_core::{ClassificationPipeline, PipelineInput, Snapshot, StructureSummary};
use std::sync::Arc;

const MAX_TEXT_BLOCKS: usize = 5;

/// The content captured for the snapshot under classification.
#[derive(Debug, Clone)]
pub struct ContentData {
    /// Textual fragments extracted from the page. Truncated to the
    /// first [`MAX_TEXT_BLOCKS`] before the rule engine and AI
    /// classifier see them.
    pub text_blocks: Vec<String>,
    /// DOM/resource structure summary.
    pub structure: StructureSummary,
    /// Main-content embedding, if one has been computed.
    pub vector: Option<Vec<f32>>,
}

/// The historical baseline a snapshot is compared against.
#[derive(Debug, Clone, Default)]
pub struct BaselineData {
    /// Prior textual fragments, for parity with `ContentData` (not
    /// currently consumed by the pipeline, which only diffs vectors).
    pub text_blocks: Vec<String>,
    /// Prior main-content embedding, if one exists.
    pub vector: Option<Vec<f32>>,
}

/// Persists embeddings produced during classification. A failure here
/// is logged and does not fail the job.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist `vector` for `snapshot_id`.
    async fn store(&self, snapshot_id: uuid::Uuid, vector: &[f32]) -> anyhow::Result<()>;
}

/// Persists the snapshot verdict produced at the end of a job.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot to classify.
    async fn load(&self, snapshot_id: uuid::Uuid) -> anyhow::Result<Snapshot>;
    /// Persist the snapshot after its verdict has been applied.
    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// One unit of classification work: a snapshot plus the content and
/// baseline needed to classify it.
pub struct ClassificationJob {
    /// Snapshot being classified.
    pub snapshot_id: uuid::Uuid,
    /// Website the snapshot belongs to.
    pub website_id: String,
    /// Page URL, passed through to the pipeline and AI prompts.
    pub url: String,
    /// Freshly captured content.
    pub content_data: ContentData,
    /// Historical comparison point.
    pub baseline_data: BaselineData,
    /// Rolling historical accuracy fed into the confidence model.
    pub historical_accuracy: f64,
}

/// Runs the five-step classification procedure for each job.
pub struct ClassificationWorker {
    pipeline: ClassificationPipeline,
    alert_generator: AlertGenerator,
    router: NotificationRouter,
    vector_store: Arc<dyn VectorStore>,
    snapshot_store: Arc<dyn SnapshotStore>,
}

impl ClassificationWorker {
    /// Build a worker from its collaborators.
    #[must_use]
    pub fn new(
        pipeline: ClassificationPipeline,
        alert_generator: AlertGenerator,
        router: NotificationRouter,
        vector_store: Arc<dyn VectorStore>,
        snapshot_store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            pipeline,
            alert_generator,
            router,
            vector_store,
            snapshot_store,
        }
    }
}

#[async_trait]
impl JobProcessor<ClassificationJob> for ClassificationWorker {
    async fn process(&self, job: ClassificationJob) -> anyhow::Result<bool> {
        // Step 1: build the request, capping text blocks on both sides.
        let mut fragments = job.content_data.text_blocks;
        fragments.truncate(MAX_TEXT_BLOCKS);
        let mut baseline_fragments = job.baseline_data.text_blocks;
        baseline_fragments.truncate(MAX_TEXT_BLOCKS);

        let input = PipelineInput {
            url: &job.url,
            fragments: &fragments,
            structure: &job.content_data.structure,
            current_vector: job.content_data.vector.as_deref(),
            baseline_vector: job.baseline_data.vector.as_deref(),
            historical_accuracy: job.historical_accuracy,
        };

        // Step 2: run the pipeline.
        let result = self.pipeline.classify(&input).await;

        // Step 3: persist vectors, best-effort.
        if let Some(vector) = job.content_data.vector.as_deref() {
            if let Err(e) = self.vector_store.store(job.snapshot_id, vector).await {
                tracing::warn!(snapshot_id = %job.snapshot_id, error = %e, "vector persistence failed");
            }
        }

        // Step 4: generate and deliver an alert, best-effort.
        let context = AlertContext {
            website_id: job.website_id.clone(),
            ..Default::default()
        };
        let mut alert_generated = false;
        match self.alert_generator.generate(&result, &context) {
            Ok(Some(alert)) => {
                alert_generated = true;
                if let Err(e) = self.router.route(&alert).await {
                    tracing::warn!(alert_id = %alert.alert_id, error = %e, "alert routing failed");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(snapshot_id = %job.snapshot_id, error = %e, "alert generation failed"),
        }

        // Step 5: update the snapshot verdict.
        let mut snapshot = self.snapshot_store.load(job.snapshot_id).await?;
        let is_defaced = result.final_label == siteward_core::Classification::Defacement;
        snapshot.apply_verdict(is_defaced, result.confidence_score, result.timestamp);
        self.snapshot_store.save(&snapshot).await?;

        Ok(alert_generated)
    }
}
