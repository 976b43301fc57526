#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Object storage on the local filesystem.
//!
//! Buckets are directories under a root; each bucket's access policy is a
//! JSON document in `<root>/.policies/<bucket>.json`. URLs are built against
//! a configured public endpoint and reduced to their path.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use recall_core::traits::ObjectStore;
use recall_core::{Error, Result};

const POLICY_DIR: &str = ".policies";

pub struct LocalObjectStore { root: PathBuf, endpoint: String }

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, endpoint: impl Into<String>) -> Self {
        Self { root: root.into(), endpoint: endpoint.into().trim_end_matches('/').to_string() }
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    pub fn policy_path(&self, bucket: &str) -> Result<PathBuf> {
        validate_bucket(bucket)?;
        Ok(self.root.join(POLICY_DIR).join(format!("{bucket}.json")))
    }
}

/// Anonymous read access to every object in `bucket`.
pub fn public_read_policy(bucket: &str) -> serde_json::Value {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": "*",
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{bucket}/*")],
        }]
    })
}

/// Percent-encodes every segment of `bucket/key` under the endpoint's path,
/// so `#`, `?`, `%` and spaces in a key stay part of the object name.
pub fn object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    let mut url = endpoint.trim_end_matches('/').to_string();
    for segment in std::iter::once(bucket).chain(key.split('/')) {
        url.push('/');
        url.push_str(&urlencoding::encode(segment));
    }
    url
}

/// Strips scheme, host and query: `http://h:9000/b/k.png?X=1` -> `/b/k.png`.
pub fn path_only_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
        None => without_query,
    };
    if path.starts_with('/') { path.to_string() } else { format!("/{path}") }
}

fn validate_bucket(bucket: &str) -> Result<()> {
    let ok = !bucket.is_empty() && bucket != POLICY_DIR && !bucket.starts_with('.') && !bucket.contains(['/', '\\']);
    if ok { Ok(()) } else { Err(Error::Validation(format!("invalid bucket name '{bucket}'"))) }
}

fn validate_key(key: &str) -> Result<()> {
    let ok = !key.is_empty() && Path::new(key).components().all(|c| matches!(c, Component::Normal(_)));
    if ok { Ok(()) } else { Err(Error::Validation(format!("invalid object key '{key}'"))) }
}

/// Writes through a uniquely named sibling and renames, so readers never see
/// a partial file and concurrent writers of the same content both succeed.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("object");
    let tmp = path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        write_atomic(&path, bytes).await?;
        tracing::debug!(bucket, key, size = bytes.len(), "stored object");
        Ok(())
    }

    async fn ensure_public_read_policy(&self, bucket: &str) -> Result<()> {
        let path = self.policy_path(bucket)?;
        let body = serde_json::to_vec_pretty(&public_read_policy(bucket)).map_err(Error::store)?;
        if tokio::fs::read(&path).await.ok().as_deref() == Some(body.as_slice()) {
            return Ok(());
        }
        write_atomic(&path, &body).await?;
        tracing::info!(bucket, "applied public-read policy");
        Ok(())
    }

    async fn public_url(&self, bucket: &str, key: &str) -> Result<String> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(path_only_url(&object_url(&self.endpoint, bucket, key)))
    }
}
