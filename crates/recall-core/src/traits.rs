use async_trait::async_trait;
use image::DynamicImage;

use crate::types::{Detection, ImageRecord, ObjectRecord, ReviewCandidate, VectorPoint};
use crate::Result;

/// A detector or captioner. Implementations are constructed once and shared
/// read-only between image workers.
#[async_trait]
pub trait Labeler: Send + Sync {
    fn name(&self) -> &str;

    async fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;

    /// Text caption for the whole image; `None` when the labeler cannot describe.
    async fn describe(&self, _image: &DynamicImage) -> Result<Option<String>> { Ok(None) }
}

/// Produces fixed-length, L2-normalized feature vectors.
pub trait ImageEmbedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()>;
    /// Must be safe to call concurrently and repeatedly for the same bucket.
    async fn ensure_public_read_policy(&self, bucket: &str) -> Result<()>;
    /// URL with scheme, host and query stripped: `/bucket/key`.
    async fn public_url(&self, bucket: &str, key: &str) -> Result<String>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection with cosine distance if it does not exist yet.
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<()>;
    async fn upsert(&self, collection: &str, point: &VectorPoint) -> Result<()>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_image(&self, record: &ImageRecord) -> Result<()>;
    /// Writes the whole batch in one transaction.
    async fn insert_objects(&self, batch: &[ObjectRecord]) -> Result<()>;
}

#[async_trait]
pub trait ReviewPublisher: Send + Sync {
    async fn publish(&self, topic: &str, candidate: &ReviewCandidate) -> Result<()>;
}
