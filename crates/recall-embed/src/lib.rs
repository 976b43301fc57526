#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use image::DynamicImage;
use recall_core::config::{expand_path, EmbeddingSettings};
use recall_core::traits::ImageEmbedder;
use recall_core::types::EMBEDDING_DIM;

mod histogram;
mod normalize;
mod preprocess;

pub use histogram::HistogramEmbedder;
pub use normalize::l2_normalize_twice;
pub use preprocess::{to_pixel_tensor, CLIP_IMAGE_SIZE};

/// CLIP ViT-B/32 image tower; produces 512-d vectors.
pub struct ClipImageEmbedder { model: ClipModel, device: Device }

impl ClipImageEmbedder {
    pub fn new(model_dir: &Path) -> Result<Self> {
        let device = select_device()?;
        let weights_path = model_dir.join("model.safetensors");
        tracing::info!(path = %weights_path.display(), "loading CLIP weights");
        let weights = candle_core::safetensors::load(&weights_path, &device)
            .map_err(|e| anyhow!("Failed to load weights from {}: {}", weights_path.display(), e))?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let config = ClipConfig::vit_base_patch32();
        let model = ClipModel::new(vb, &config)?;
        tracing::info!("CLIP image encoder ready");
        Ok(Self { model, device })
    }

    pub fn embed(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let start = Instant::now();
        let pixels = to_pixel_tensor(image, CLIP_IMAGE_SIZE, &self.device)?;
        let features = self.model.get_image_features(&pixels)?;
        let v = l2_normalize_twice(&features)?;
        if v.len() != EMBEDDING_DIM { return Err(anyhow!("dim mismatch: got {} expected {}", v.len(), EMBEDDING_DIM)); }
        if start.elapsed().as_millis() > 500 { tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(v)
    }
}

impl ImageEmbedder for ClipImageEmbedder {
    fn dim(&self) -> usize { EMBEDDING_DIM }
    fn embed_image(&self, image: &DynamicImage) -> recall_core::Result<Vec<f32>> {
        self.embed(image).map_err(|e| recall_core::Error::Embedding(format!("{e:#}")))
    }
}

#[cfg(feature = "metal")]
fn select_device() -> Result<Device> {
    Device::new_metal(0).map_err(|e| anyhow!("Failed to initialize Metal device: {}", e))
}

#[cfg(not(feature = "metal"))]
fn select_device() -> Result<Device> { Ok(Device::Cpu) }

/// Picks the embedder from settings. `embedding.use_fake` or
/// `APP_USE_FAKE_EMBEDDINGS=1` selects the deterministic histogram embedder.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> recall_core::Result<Arc<dyn ImageEmbedder>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if settings.use_fake || env_fake {
        tracing::info!("using histogram embedder");
        return Ok(Arc::new(HistogramEmbedder::new()));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref())
        .ok_or_else(|| recall_core::Error::InvalidConfig("could not locate CLIP model directory".into()))?;
    let model = ClipImageEmbedder::new(&dir).map_err(|e| recall_core::Error::InvalidConfig(format!("{e:#}")))?;
    Ok(Arc::new(model))
}

fn resolve_model_dir(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() { return Some(p); }
        tracing::warn!(path = %p.display(), "configured model dir does not exist");
    }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { return Some(p); } }
    let local = Path::new("models/clip-vit-base-patch32");
    if local.exists() { return Some(local.to_path_buf()); }
    None
}
