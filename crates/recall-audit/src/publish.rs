//! Review channels for flagged images.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use recall_core::traits::ReviewPublisher;
use recall_core::types::ReviewCandidate;
use recall_core::{Error, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON object per line to `<dir>/<topic>.jsonl`.
pub struct JsonlPublisher { dir: PathBuf, lock: Mutex<()> }

impl JsonlPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into(), lock: Mutex::new(()) } }

    pub fn topic_path(&self, topic: &str) -> PathBuf { self.dir.join(format!("{topic}.jsonl")) }
}

#[async_trait]
impl ReviewPublisher for JsonlPublisher {
    async fn publish(&self, topic: &str, candidate: &ReviewCandidate) -> Result<()> {
        let mut line = serde_json::to_vec(candidate).map_err(Error::store)?;
        line.push(b'\n');
        let _guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut f = tokio::fs::OpenOptions::new().create(true).append(true).open(self.topic_path(topic)).await?;
        f.write_all(&line).await?;
        f.flush().await?;
        Ok(())
    }
}

/// POSTs each candidate as JSON to `<url>/<topic>`.
pub struct WebhookPublisher { client: reqwest::Client, url: String }

impl WebhookPublisher {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl ReviewPublisher for WebhookPublisher {
    async fn publish(&self, topic: &str, candidate: &ReviewCandidate) -> Result<()> {
        self.client
            .post(format!("{}/{topic}", self.url))
            .json(candidate)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Error::store)?;
        Ok(())
    }
}

/// Publishes each candidate once per image path. Delivery failures are
/// logged and do not stop the run; returns how many were delivered.
pub async fn publish_candidates(publisher: &dyn ReviewPublisher, topic: &str, candidates: &[ReviewCandidate]) -> usize {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut delivered = 0;
    for c in candidates {
        if !seen.insert(c.image_path.as_str()) { continue; }
        match publisher.publish(topic, c).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::warn!(topic, image = %c.image_path, error = %e, "failed to publish review candidate"),
        }
    }
    delivered
}
