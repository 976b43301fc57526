//! Per-image ingestion: decode, upload, embed, describe, score, commit,
//! label, then persist every merged object.
//!
//! The ImageRecord is the commit point. If it cannot be written the object
//! stages do not run, so an ObjectRecord never references a missing image.
//! Vectors and objects dropped after the commit are counted in the
//! [`ImageOutcome`] so a later run can reconcile them.

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use recall_core::config::{LabelerSettings, PipelineSettings};
use recall_core::folder::file_access_date;
use recall_core::traits::{ImageEmbedder, Labeler, ObjectStore, RecordStore, VectorStore};
use recall_core::types::{
    CanonicalObject, Collection, Detection, ImageMetadata, ImageRecord, ObjectRecord, PointPayload, QualityReport,
    VectorPoint,
};
use recall_core::{Error, Result};
use recall_ensemble::{filter_by_keywords, EnsembleMerger, KeywordMatch};
use tokio::sync::OnceCell;

use crate::cancel::CancelSignal;
use crate::outcome::{ImageOutcome, OutcomeStatus};
use crate::retry::{with_retry, RetryPolicy};

/// Description stored when no captioning labeler is configured.
pub const PLACEHOLDER_DESCRIPTION: &str = "Description: ";

/// Collaborators, constructed once and shared read-only by every worker.
#[derive(Clone)]
pub struct PipelinePorts {
    pub object_store: Arc<dyn ObjectStore>,
    pub vector_store: Arc<dyn VectorStore>,
    pub record_store: Arc<dyn RecordStore>,
    pub embedder: Arc<dyn ImageEmbedder>,
    /// Detection labelers, in fusion priority order.
    pub labelers: Vec<Arc<dyn Labeler>>,
    pub describer: Option<Arc<dyn Labeler>>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub retry: RetryPolicy,
    /// Overrides the labeler-count based merge threshold.
    pub merge_threshold: Option<f32>,
    pub keywords: Option<Vec<String>>,
    pub keyword_match: KeywordMatch,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { retry: RetryPolicy::default(), merge_threshold: None, keywords: None, keyword_match: KeywordMatch::Exact }
    }
}

impl PipelineOptions {
    pub fn from_settings(pipeline: &PipelineSettings, labelers: &LabelerSettings) -> Self {
        Self {
            retry: RetryPolicy::new(pipeline.retry_attempts),
            merge_threshold: pipeline.merge_threshold,
            keywords: labelers.keywords.clone(),
            keyword_match: KeywordMatch::Exact,
        }
    }
}

pub struct IngestionPipeline {
    ports: PipelinePorts,
    merger: EnsembleMerger,
    options: PipelineOptions,
    collections: OnceCell<()>,
}

/// Result of stage 1.
struct Decoded {
    bytes: Vec<u8>,
    image: Arc<DynamicImage>,
}

async fn embed_blocking(embedder: Arc<dyn ImageEmbedder>, image: Arc<DynamicImage>) -> Result<Vec<f32>> {
    tokio::task::spawn_blocking(move || embedder.embed_image(&image))
        .await
        .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))?
}

fn new_id() -> String { uuid::Uuid::new_v4().simple().to_string() }

impl IngestionPipeline {
    /// Fails with [`Error::InvalidConfig`] when no detection labeler is given.
    pub fn new(ports: PipelinePorts, options: PipelineOptions) -> Result<Self> {
        if ports.labelers.is_empty() {
            return Err(Error::InvalidConfig("at least one labeler is required".into()));
        }
        if ports.embedder.dim() == 0 {
            return Err(Error::InvalidConfig("embedder reports a zero dimension".into()));
        }
        let merger = match options.merge_threshold {
            Some(t) => EnsembleMerger::new(t),
            None => EnsembleMerger::for_labeler_count(ports.labelers.len()),
        };
        tracing::info!(labelers = ports.labelers.len(), threshold = merger.threshold(), dim = ports.embedder.dim(), "pipeline ready");
        Ok(Self { ports, merger, options, collections: OnceCell::new() })
    }

    pub fn merger(&self) -> &EnsembleMerger { &self.merger }

    /// Creates the fixed vector collections once per pipeline; concurrent
    /// callers wait for the first initialization.
    pub async fn ensure_collections(&self) -> Result<()> {
        self.collections
            .get_or_try_init(|| async {
                let dim = self.ports.embedder.dim();
                for c in Collection::ALL {
                    with_retry(self.options.retry, "ensure_collection", c.name(), || self.ports.vector_store.ensure_collection(c.name(), dim)).await?;
                }
                tracing::info!(dim, "vector collections ready");
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }

    /// Runs every stage for one file. Never returns an error: failures are
    /// logged and described in the outcome.
    pub async fn process_image(&self, path: &Path, task: &str, cancel: &CancelSignal) -> ImageOutcome {
        let mut outcome = ImageOutcome::new(path.to_path_buf());
        let label = path.display().to_string();
        if cancel.is_cancelled() { return outcome; }
        if let Err(e) = self.ensure_collections().await {
            return outcome.with_status(OutcomeStatus::Failed { stage: "ensure_collection", reason: e.to_string() });
        }

        let decoded = match decode(path).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(stage = "decode", image = %label, error = %e, "skipping image");
                return outcome.with_status(OutcomeStatus::Skipped { reason: e.to_string() });
            }
        };
        let image = decoded.image.clone();
        let (width, height) = (image.width(), image.height());
        if cancel.is_cancelled() { return outcome; }

        outcome.url = self.upload(path, task, &decoded.bytes, &label).await;
        if outcome.url.is_some() {
            outcome.policy_applied = self.apply_policy(task, &label).await;
        }

        let image_id = new_id();
        if !self.upsert_vector(Collection::Image, image.clone(), PointPayload { image_id: image_id.clone(), object_id: None }, image_id.clone(), &label).await {
            outcome.vectors_dropped += 1;
        }

        let description = self.describe(&image, &label).await;
        let metrics = match score_blocking(image.clone()).await {
            Ok(m) => m,
            Err(reason) => return outcome.with_status(OutcomeStatus::Failed { stage: "quality", reason }),
        };
        let metadata = ImageMetadata {
            date_time: file_access_date(path).unwrap_or_else(|_| chrono::Local::now().to_rfc3339()),
            local_path: path.display().to_string(),
            task: task.to_string(),
            size: format!("{width}x{height}"),
            content_hash: blake3::hash(&decoded.bytes).to_hex().to_string(),
        };
        let record = ImageRecord { id: image_id.clone(), url: outcome.url.clone(), description, metadata, metrics };
        if cancel.is_cancelled() { return outcome; }

        let store = &self.ports.record_store;
        if let Err(e) = with_retry(self.options.retry, "record_image", &label, || store.insert_image(&record)).await {
            return outcome.with_status(OutcomeStatus::Failed { stage: "record_image", reason: e.to_string() });
        }
        outcome.image_id = Some(image_id.clone());
        tracing::debug!(image = %label, image_id = %image_id, "image record committed");
        if cancel.is_cancelled() { return outcome; }

        let objects = self.run_labelers(&image, &label).await;
        let mut batch = Vec::with_capacity(objects.len());
        let mut interrupted = false;
        for obj in objects {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            let Some(rect) = obj.source_crop(width, height) else {
                tracing::warn!(stage = "crop", image = %label, object = %obj.label, bbox = ?obj.bbox, "box lies outside the image, dropping object");
                outcome.objects_dropped += 1;
                continue;
            };
            let crop = Arc::new(image.crop_imm(rect.x, rect.y, rect.width, rect.height));
            let object_id = new_id();
            let payload = PointPayload { image_id: image_id.clone(), object_id: Some(object_id.clone()) };
            if !self.upsert_vector(Collection::Object, crop, payload, object_id.clone(), &label).await {
                outcome.vectors_dropped += 1;
            }
            batch.push(ObjectRecord { id: object_id, image_id: image_id.clone(), class_name: obj.label, bbox: obj.bbox });
        }

        match with_retry(self.options.retry, "record_objects", &label, || store.insert_objects(&batch)).await {
            Ok(()) => outcome.objects_committed = batch.len(),
            Err(_) => outcome.objects_dropped += batch.len(),
        }
        tracing::info!(
            image = %label,
            image_id = %image_id,
            objects = outcome.objects_committed,
            vectors_dropped = outcome.vectors_dropped,
            objects_dropped = outcome.objects_dropped,
            "image ingested"
        );
        if interrupted {
            tracing::warn!(image = %label, image_id = %image_id, "cancelled during object stages");
            return outcome;
        }
        outcome.with_status(OutcomeStatus::Committed)
    }

    /// Uploads the raw bytes and returns the path-only URL; `None` when the
    /// upload was dropped.
    async fn upload(&self, path: &Path, bucket: &str, bytes: &[u8], label: &str) -> Option<String> {
        let store = &self.ports.object_store;
        let key = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(new_id);
        with_retry(self.options.retry, "upload", label, || store.put(bucket, &key, bytes)).await.ok()?;
        with_retry(self.options.retry, "public_url", label, || store.public_url(bucket, &key)).await.ok()
    }

    /// The object stays stored when this fails; only anonymous reads are affected.
    async fn apply_policy(&self, bucket: &str, label: &str) -> bool {
        let store = &self.ports.object_store;
        match with_retry(self.options.retry, "bucket_policy", label, || store.ensure_public_read_policy(bucket)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(stage = "bucket_policy", image = %label, bucket, error = %e, "object stored without public-read policy");
                false
            }
        }
    }

    /// Embeds `image` and upserts it; `false` when the vector was dropped.
    async fn upsert_vector(&self, collection: Collection, image: Arc<DynamicImage>, payload: PointPayload, id: String, label: &str) -> bool {
        let embedder = &self.ports.embedder;
        let vector = match with_retry(self.options.retry, "embed", label, || embed_blocking(embedder.clone(), image.clone())).await {
            Ok(v) => v,
            Err(_) => return false,
        };
        let point = VectorPoint { id, vector, payload };
        let store = &self.ports.vector_store;
        with_retry(self.options.retry, "upsert_vector", label, || store.upsert(collection.name(), &point)).await.is_ok()
    }

    async fn describe(&self, image: &DynamicImage, label: &str) -> String {
        let Some(describer) = &self.ports.describer else { return PLACEHOLDER_DESCRIPTION.to_string() };
        match with_retry(self.options.retry, "describe", label, || describer.describe(image)).await {
            Ok(Some(text)) => text,
            Ok(None) | Err(_) => PLACEHOLDER_DESCRIPTION.to_string(),
        }
    }

    /// Runs every labeler over the full image and merges their detections.
    /// A labeler that keeps failing contributes nothing.
    async fn run_labelers(&self, image: &DynamicImage, label: &str) -> Vec<CanonicalObject> {
        let mut sets: Vec<Vec<Detection>> = Vec::with_capacity(self.ports.labelers.len());
        for labeler in &self.ports.labelers {
            let detections = match with_retry(self.options.retry, "detect", label, || labeler.detect(image)).await {
                Ok(d) => d,
                Err(_) => continue,
            };
            let detections = match &self.options.keywords {
                Some(k) => filter_by_keywords(detections, k, self.options.keyword_match),
                None => detections,
            };
            tracing::debug!(image = %label, labeler = labeler.name(), detections = detections.len(), "labeler finished");
            sets.push(detections);
        }
        self.merger.merge(sets)
    }
}

async fn decode(path: &Path) -> Result<Decoded> {
    let bytes = tokio::fs::read(path).await.map_err(|e| Error::Decode { path: path.to_path_buf(), reason: e.to_string() })?;
    let owned = bytes.clone();
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&owned))
        .await
        .map_err(|e| Error::Decode { path: path.to_path_buf(), reason: e.to_string() })?
        .map_err(|e| Error::Decode { path: path.to_path_buf(), reason: e.to_string() })?;
    Ok(Decoded { bytes, image: Arc::new(image) })
}

async fn score_blocking(image: Arc<DynamicImage>) -> std::result::Result<QualityReport, String> {
    tokio::task::spawn_blocking(move || recall_quality::score(&image)).await.map_err(|e| format!("quality task failed: {e}"))
}
