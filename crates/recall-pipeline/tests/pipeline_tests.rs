use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use recall_core::traits::{ImageEmbedder, Labeler, ObjectStore, RecordStore, VectorStore};
use recall_core::types::{Detection, ImageRecord, ObjectRecord, VectorPoint};
use recall_core::{Error, Result};
use recall_pipeline::{
    CancelSignal, IngestionPipeline, OutcomeStatus, PipelineOptions, PipelinePorts, RetryPolicy, PLACEHOLDER_DESCRIPTION,
};

const DIM: usize = 8;

/// Fails the first `n` calls with a retryable error.
#[derive(Default)]
struct Faults(AtomicUsize);

impl Faults {
    fn new(n: usize) -> Self { Self(AtomicUsize::new(n)) }
    fn check(&self) -> Result<()> {
        let left = self.0.load(Ordering::SeqCst);
        if left > 0 {
            self.0.store(left - 1, Ordering::SeqCst);
            return Err(Error::Store("injected".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemObjects { objects: Mutex<HashMap<(String, String), Vec<u8>>>, policies: AtomicUsize, policy_faults: Faults }

#[async_trait]
impl ObjectStore for MemObjects {
    async fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        self.objects.lock().unwrap().insert((bucket.into(), key.into()), bytes.to_vec());
        Ok(())
    }
    async fn ensure_public_read_policy(&self, _bucket: &str) -> Result<()> {
        self.policy_faults.check()?;
        self.policies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn public_url(&self, bucket: &str, key: &str) -> Result<String> { Ok(format!("/{bucket}/{key}")) }
}

#[derive(Default)]
struct MemVectors {
    dims: Mutex<HashMap<String, usize>>,
    points: Mutex<HashMap<String, HashMap<String, VectorPoint>>>,
    ensure_calls: AtomicUsize,
    faults: Faults,
    /// Cancelled right after the first object vector is stored.
    cancel_on_object: Mutex<Option<CancelSignal>>,
}

impl MemVectors {
    fn points(&self, collection: &str) -> Vec<VectorPoint> {
        self.points.lock().unwrap().get(collection).map(|m| m.values().cloned().collect()).unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for MemVectors {
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.dims.lock().unwrap().entry(name.into()).or_insert(dim);
        Ok(())
    }
    async fn upsert(&self, collection: &str, point: &VectorPoint) -> Result<()> {
        self.faults.check()?;
        let dim = self.dims.lock().unwrap().get(collection).copied().ok_or_else(|| Error::NotFound(collection.into()))?;
        assert_eq!(point.vector.len(), dim);
        self.points.lock().unwrap().entry(collection.into()).or_default().insert(point.id.clone(), point.clone());
        if collection == "object" {
            if let Some(cancel) = self.cancel_on_object.lock().unwrap().take() {
                cancel.cancel();
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemRecords { images: Mutex<Vec<ImageRecord>>, objects: Mutex<Vec<ObjectRecord>>, image_faults: Faults }

#[async_trait]
impl RecordStore for MemRecords {
    async fn insert_image(&self, record: &ImageRecord) -> Result<()> {
        self.image_faults.check()?;
        self.images.lock().unwrap().push(record.clone());
        Ok(())
    }
    async fn insert_objects(&self, batch: &[ObjectRecord]) -> Result<()> {
        let images = self.images.lock().unwrap();
        for o in batch {
            if !images.iter().any(|i| i.id == o.image_id) {
                return Err(Error::Validation(format!("dangling image id {}", o.image_id)));
            }
        }
        self.objects.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }
}

struct UnitEmbedder;

impl ImageEmbedder for UnitEmbedder {
    fn dim(&self) -> usize { DIM }
    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let mut v = vec![0.0; DIM];
        v[(image.width() as usize) % DIM] = 1.0;
        Ok(v)
    }
}

struct StubLabeler { name: &'static str, detections: Vec<Detection>, caption: Option<&'static str>, calls: AtomicUsize }

impl StubLabeler {
    fn new(name: &'static str, detections: Vec<Detection>) -> Self { Self { name, detections, caption: None, calls: AtomicUsize::new(0) } }
}

#[async_trait]
impl Labeler for StubLabeler {
    fn name(&self) -> &str { self.name }
    async fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }
    async fn describe(&self, _image: &DynamicImage) -> Result<Option<String>> { Ok(self.caption.map(String::from)) }
}

struct Harness {
    objects: Arc<MemObjects>,
    vectors: Arc<MemVectors>,
    records: Arc<MemRecords>,
}

impl Harness {
    fn new() -> Self { Self::with(MemVectors::default(), MemRecords::default()) }

    fn with(vectors: MemVectors, records: MemRecords) -> Self {
        Self::with_objects(MemObjects::default(), vectors, records)
    }

    fn with_objects(objects: MemObjects, vectors: MemVectors, records: MemRecords) -> Self {
        Self { objects: Arc::new(objects), vectors: Arc::new(vectors), records: Arc::new(records) }
    }

    fn ports(&self, labelers: Vec<Arc<dyn Labeler>>) -> PipelinePorts {
        PipelinePorts {
            object_store: self.objects.clone(),
            vector_store: self.vectors.clone(),
            record_store: self.records.clone(),
            embedder: Arc::new(UnitEmbedder),
            labelers,
            describer: None,
        }
    }

    fn pipeline(&self, labelers: Vec<Arc<dyn Labeler>>) -> IngestionPipeline {
        IngestionPipeline::new(self.ports(labelers), PipelineOptions::default()).unwrap()
    }
}

fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> std::path::PathBuf {
    let path = dir.join(name);
    RgbImage::from_fn(w, h, |x, y| Rgb([(x * 2) as u8, (y * 2) as u8, 128])).save(&path).unwrap();
    path
}

fn two_cats() -> Vec<Detection> {
    vec![Detection::new("cat", [10.0, 10.0, 60.0, 60.0]), Detection::new("cat", [12.0, 11.0, 61.0, 60.0])]
}

#[tokio::test]
async fn overlapping_cats_commit_one_object() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_png(tmp.path(), "img.png", 100, 100);
    let h = Harness::new();
    let pipeline = h.pipeline(vec![Arc::new(StubLabeler::new("stub", two_cats()))]);

    let outcome = pipeline.process_image(&path, "task", &CancelSignal::new()).await;
    assert_eq!(outcome.status, OutcomeStatus::Committed);
    assert_eq!(outcome.objects_committed, 1);
    assert!(outcome.policy_applied);

    let images = h.records.images.lock().unwrap().clone();
    assert_eq!(images.len(), 1);
    let image = &images[0];
    assert_eq!(outcome.image_id.as_deref(), Some(image.id.as_str()));
    assert_eq!(image.url.as_deref(), Some("/task/img.png"));
    assert_eq!(image.description, PLACEHOLDER_DESCRIPTION);
    assert_eq!(image.metadata.size, "100x100");
    assert_eq!(image.metadata.task, "task");
    assert!(image.metrics.scores().iter().all(|s| (0.0..=1.0).contains(s)));

    let objects = h.records.objects.lock().unwrap().clone();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].image_id, image.id);
    assert_eq!(objects[0].class_name, "cat");

    let object_points = h.vectors.points("object");
    assert_eq!(object_points.len(), 1);
    assert_eq!(object_points[0].payload.image_id, image.id);
    assert_eq!(object_points[0].payload.object_id.as_deref(), Some(objects[0].id.as_str()));

    let image_points = h.vectors.points("image");
    assert_eq!(image_points.len(), 1);
    assert_eq!(image_points[0].id, image.id);
    assert_eq!(image_points[0].payload.object_id, None);

    let dims = h.vectors.dims.lock().unwrap().clone();
    assert_eq!(dims, HashMap::from([("object".into(), DIM), ("image".into(), DIM), ("object_description".into(), DIM)]));
    assert_eq!(h.objects.policies.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_vector_failures_are_retried() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_png(tmp.path(), "img.png", 64, 48);
    let h = Harness::with(MemVectors { faults: Faults::new(2), ..Default::default() }, MemRecords::default());
    let pipeline = h.pipeline(vec![Arc::new(StubLabeler::new("stub", vec![]))]);

    let outcome = pipeline.process_image(&path, "task", &CancelSignal::new()).await;
    assert_eq!(outcome.vectors_dropped, 0);
    assert_eq!(h.vectors.points("image").len(), 1);
}

#[tokio::test]
async fn exhausted_retries_drop_only_that_vector() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_png(tmp.path(), "img.png", 100, 100);
    // three failures exhaust the image-vector upsert; the object upsert then succeeds
    let h = Harness::with(MemVectors { faults: Faults::new(3), ..Default::default() }, MemRecords::default());
    let pipeline = h.pipeline(vec![Arc::new(StubLabeler::new("stub", two_cats()))]);

    let outcome = pipeline.process_image(&path, "task", &CancelSignal::new()).await;
    assert_eq!(outcome.status, OutcomeStatus::Committed);
    assert_eq!(outcome.vectors_dropped, 1);
    assert!(outcome.is_partial());
    assert!(h.vectors.points("image").is_empty());
    assert_eq!(h.vectors.points("object").len(), 1);
    assert_eq!(h.records.objects.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_image_commit_skips_object_stages() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_png(tmp.path(), "img.png", 100, 100);
    let h = Harness::with(MemVectors::default(), MemRecords { image_faults: Faults::new(usize::MAX), ..Default::default() });
    let labeler = Arc::new(StubLabeler::new("stub", two_cats()));
    let pipeline = IngestionPipeline::new(
        h.ports(vec![labeler.clone()]),
        PipelineOptions { retry: RetryPolicy::new(2), ..Default::default() },
    )
    .unwrap();

    let outcome = pipeline.process_image(&path, "task", &CancelSignal::new()).await;
    assert!(matches!(outcome.status, OutcomeStatus::Failed { stage: "record_image", .. }));
    assert_eq!(outcome.image_id, None);
    assert_eq!(labeler.calls.load(Ordering::SeqCst), 0);
    assert!(h.records.objects.lock().unwrap().is_empty());
    assert!(h.vectors.points("object").is_empty());
}

#[tokio::test]
async fn cancel_between_objects_still_records_stored_vectors() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_png(tmp.path(), "img.png", 100, 100);
    let cancel = CancelSignal::new();
    let vectors = MemVectors { cancel_on_object: Mutex::new(Some(cancel.clone())), ..Default::default() };
    let h = Harness::with(vectors, MemRecords::default());
    let detections = vec![Detection::new("cat", [0.0, 0.0, 30.0, 30.0]), Detection::new("dog", [50.0, 50.0, 90.0, 90.0])];
    let pipeline = h.pipeline(vec![Arc::new(StubLabeler::new("stub", detections))]);

    let outcome = pipeline.process_image(&path, "task", &cancel).await;
    assert_eq!(outcome.status, OutcomeStatus::Cancelled);
    assert!(outcome.image_id.is_some());
    assert_eq!(h.vectors.points("object").len(), 1);
    let objects = h.records.objects.lock().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(outcome.objects_committed, 1);
    assert_eq!(h.vectors.points("object")[0].payload.object_id.as_deref(), Some(objects[0].id.as_str()));
}

#[tokio::test]
async fn failed_bucket_policy_keeps_the_upload() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_png(tmp.path(), "img.png", 64, 64);
    let objects = MemObjects { policy_faults: Faults::new(usize::MAX), ..Default::default() };
    let h = Harness::with_objects(objects, MemVectors::default(), MemRecords::default());
    let pipeline = h.pipeline(vec![Arc::new(StubLabeler::new("stub", vec![]))]);

    let outcome = pipeline.process_image(&path, "task", &CancelSignal::new()).await;
    assert_eq!(outcome.status, OutcomeStatus::Committed);
    assert!(!outcome.policy_applied);
    assert_eq!(outcome.url.as_deref(), Some("/task/img.png"));
    assert_eq!(h.objects.objects.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn folder_run_skips_undecodable_files_and_subdirectories() {
    let tmp = tempfile::tempdir().unwrap();
    write_png(tmp.path(), "a.png", 40, 30);
    write_png(tmp.path(), "b.png", 30, 40);
    std::fs::write(tmp.path().join("notes.txt"), b"not an image").unwrap();
    std::fs::create_dir(tmp.path().join("nested")).unwrap();
    write_png(&tmp.path().join("nested"), "c.png", 10, 10);

    let h = Harness::new();
    let pipeline = h.pipeline(vec![Arc::new(StubLabeler::new("stub", vec![Detection::new("dog", [0.0, 0.0, 9.0, 9.0])]))]);
    let report = pipeline.ingest_folder(tmp.path(), "task", 4, &CancelSignal::new()).await.unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.committed(), 2);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.objects(), 2);
    assert!(matches!(report.outcomes[2].status, OutcomeStatus::Skipped { .. }));
    assert_eq!(h.records.images.lock().unwrap().len(), 2);
    // collections were initialized once for the whole run
    assert_eq!(h.vectors.ensure_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cancelled_run_commits_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    write_png(tmp.path(), "a.png", 20, 20);
    let h = Harness::new();
    let pipeline = h.pipeline(vec![Arc::new(StubLabeler::new("stub", two_cats()))]);
    let cancel = CancelSignal::new();
    cancel.cancel();
    cancel.cancelled().await;

    let report = pipeline.ingest_folder(tmp.path(), "task", 1, &cancel).await.unwrap();
    assert_eq!(report.cancelled(), 1);
    assert!(h.records.images.lock().unwrap().is_empty());
}

#[tokio::test]
async fn describer_and_keyword_filter_are_applied() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_png(tmp.path(), "img.png", 100, 100);
    let h = Harness::new();
    let detections = vec![Detection::new("Cat", [0.0, 0.0, 20.0, 20.0]), Detection::new("dog", [50.0, 50.0, 90.0, 90.0])];
    let mut ports = h.ports(vec![Arc::new(StubLabeler::new("stub", detections))]);
    ports.describer = Some(Arc::new(StubLabeler { caption: Some("a cat on a mat"), ..StubLabeler::new("captioner", vec![]) }));
    let options = PipelineOptions { keywords: Some(vec!["cat".into()]), ..Default::default() };
    let pipeline = IngestionPipeline::new(ports, options).unwrap();

    pipeline.process_image(&path, "task", &CancelSignal::new()).await;
    assert_eq!(h.records.images.lock().unwrap()[0].description, "a cat on a mat");
    let objects = h.records.objects.lock().unwrap().clone();
    assert_eq!(objects.iter().map(|o| o.class_name.as_str()).collect::<Vec<_>>(), vec!["Cat"]);
}

#[test]
fn no_labelers_is_a_configuration_error() {
    let h = Harness::new();
    let err = IngestionPipeline::new(h.ports(vec![]), PipelineOptions::default()).err().unwrap();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn merge_threshold_follows_labeler_count() {
    let h = Harness::new();
    let one = h.pipeline(vec![Arc::new(StubLabeler::new("a", vec![]))]);
    let two = h.pipeline(vec![Arc::new(StubLabeler::new("a", vec![])), Arc::new(StubLabeler::new("b", vec![]))]);
    assert_eq!(one.merger().threshold(), 0.5);
    assert_eq!(two.merger().threshold(), 0.7);
}
