//! Image quality scores.
//!
//! Every scorer is a pure function over a decoded image; [`score`] bundles
//! them into the [`QualityReport`] persisted with each image record.

use image::{DynamicImage, GenericImageView};
use recall_core::types::QualityReport;

mod blur;
mod brightness;
mod entropy;

pub use blur::{blurriness, grayscale_601, MAX_RESOLUTION_FOR_BLUR_DETECTION};
pub use brightness::{brightness, pixel_brightness, BrightnessScore, DEFAULT_PERCENTILES};
pub use entropy::{entropy, entropy_score};

/// `min(w/h, h/w)`; 1.0 for square images.
pub fn aspect_ratio_score(image: &DynamicImage) -> f32 {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 { return 0.0; }
    let (w, h) = (w as f32, h as f32);
    (w / h).min(h / w)
}

/// Computes every score for one image.
pub fn score(image: &DynamicImage) -> QualityReport {
    let b = brightness(image, &DEFAULT_PERCENTILES);
    let p95 = b.at(95).unwrap_or(b.brightness);
    let p5 = b.at(5).unwrap_or(b.brightness);
    QualityReport {
        dark_score: unit(p95),
        light_score: unit(1.0 - p5),
        blur_score: unit(blurriness(image)),
        low_information_score: unit(entropy_score(image)),
        aspect_ratio_score: unit(aspect_ratio_score(image)),
    }
}

fn unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}
