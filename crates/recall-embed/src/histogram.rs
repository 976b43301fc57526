use candle_core::{Device, Tensor};
use image::DynamicImage;
use recall_core::traits::ImageEmbedder;
use recall_core::types::EMBEDDING_DIM;

use crate::normalize::l2_normalize_twice;

const BINS_PER_CHANNEL: usize = 8;

/// Deterministic 8x8x8 RGB color-histogram embedder (512-d).
///
/// Needs no model weights; used in tests and in development setups.
#[derive(Debug, Default, Clone)]
pub struct HistogramEmbedder;

impl HistogramEmbedder {
    pub fn new() -> Self { Self }

    fn histogram(image: &DynamicImage) -> Vec<f32> {
        let mut hist = vec![0f32; EMBEDDING_DIM];
        let shift = 8 - BINS_PER_CHANNEL.trailing_zeros();
        for p in image.to_rgb8().pixels() {
            let [r, g, b] = p.0.map(|c| usize::from(c >> shift));
            hist[(r * BINS_PER_CHANNEL + g) * BINS_PER_CHANNEL + b] += 1.0;
        }
        hist
    }
}

impl ImageEmbedder for HistogramEmbedder {
    fn dim(&self) -> usize { EMBEDDING_DIM }

    fn embed_image(&self, image: &DynamicImage) -> recall_core::Result<Vec<f32>> {
        let hist = Self::histogram(image);
        let embed_err = |e: &dyn std::fmt::Display| recall_core::Error::Embedding(e.to_string());
        let t = Tensor::from_vec(hist, (1, EMBEDDING_DIM), &Device::Cpu).map_err(|e| embed_err(&e))?;
        l2_normalize_twice(&t).map_err(|e| embed_err(&e))
    }
}
