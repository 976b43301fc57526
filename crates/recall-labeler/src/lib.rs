#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Labeler that delegates to a remote inference function over HTTP.
//!
//! `POST {base}/detect` and `POST {base}/describe` both take the image as a
//! PNG body. A 404 from `/describe` means the function cannot caption.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use recall_core::traits::Labeler;
use recall_core::types::{BBox, Detection};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDetection {
    pub label: String,
    pub bbox: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<WireDetection>,
}

impl DetectResponse {
    /// Drops boxes with non-finite or inverted coordinates.
    pub fn into_detections(self) -> Vec<Detection> {
        self.detections
            .into_iter()
            .filter_map(|d| {
                let [x1, y1, x2, y2] = d.bbox;
                if !d.bbox.iter().all(|v| v.is_finite()) || x2 < x1 || y2 < y1 {
                    tracing::warn!(label = %d.label, bbox = ?d.bbox, "dropping malformed detection");
                    return None;
                }
                let det = Detection { label: d.label, bbox: BBox::new(x1, y1, x2, y2), confidence: d.confidence };
                Some(det)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DescribeResponse { description: String }

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).context("Failed to encode image as PNG")?;
    Ok(buf)
}

pub struct HttpLabeler { name: String, client: reqwest::Client, base_url: String }

impl HttpLabeler {
    pub fn new(name: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build().context("Failed to create HTTP client")?;
        Ok(Self { name: name.into(), client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, route: &str) -> String { format!("{}/{route}", self.base_url) }

    async fn post_image(&self, route: &str, image: &DynamicImage) -> Result<reqwest::Response> {
        let body = encode_png(image)?;
        self.client
            .post(self.endpoint(route))
            .header(CONTENT_TYPE, "image/png")
            .body(body)
            .send()
            .await
            .with_context(|| format!("{} request failed", route))
    }

    async fn request_detections(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let resp = self.post_image("detect", image).await?.error_for_status()?;
        let parsed: DetectResponse = resp.json().await.context("Failed to parse detect response")?;
        Ok(parsed.into_detections())
    }

    async fn request_description(&self, image: &DynamicImage) -> Result<Option<String>> {
        let resp = self.post_image("describe", image).await?;
        if resp.status() == StatusCode::NOT_FOUND { return Ok(None); }
        let parsed: DescribeResponse = resp.error_for_status()?.json().await.context("Failed to parse describe response")?;
        Ok(Some(parsed.description))
    }
}

#[async_trait]
impl Labeler for HttpLabeler {
    fn name(&self) -> &str { &self.name }

    async fn detect(&self, image: &DynamicImage) -> recall_core::Result<Vec<Detection>> {
        self.request_detections(image).await.map_err(|e| recall_core::Error::labeler(&self.name, format!("{e:#}")))
    }

    async fn describe(&self, image: &DynamicImage) -> recall_core::Result<Option<String>> {
        self.request_description(image).await.map_err(|e| recall_core::Error::labeler(&self.name, format!("{e:#}")))
    }
}
