use image::DynamicImage;

/// Percentiles reported by [`brightness`] unless the caller asks for others.
pub const DEFAULT_PERCENTILES: [u8; 7] = [1, 5, 10, 15, 90, 95, 99];

/// Perceptual brightness of one pixel (or of channel means), in `[0, 1]`.
///
/// Weighted root of squared channels; the weights are not a colorimetric
/// standard and must stay as they are so scores match stored records.
pub fn pixel_brightness(red: f32, green: f32, blue: f32) -> f32 {
    (0.241 * red * red + 0.691 * green * green + 0.068 * blue * blue).sqrt() / 255.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrightnessScore {
    /// `(percentile, brightness at that percentile)` in request order.
    pub percentiles: Vec<(u8, f32)>,
    /// Brightness of the per-channel means.
    pub brightness: f32,
}

impl BrightnessScore {
    pub fn at(&self, percentile: u8) -> Option<f32> {
        self.percentiles.iter().find(|(p, _)| *p == percentile).map(|(_, v)| *v)
    }
}

/// Average and percentile brightness. Grayscale images use the single channel
/// for all three weights, which reduces to `value / 255`.
pub fn brightness(image: &DynamicImage, percentiles: &[u8]) -> BrightnessScore {
    let mut per_pixel: Vec<f32>;
    let (mut sum_r, mut sum_g, mut sum_b) = (0f64, 0f64, 0f64);

    if image.color().has_color() {
        let rgb = image.to_rgb8();
        per_pixel = Vec::with_capacity(rgb.len() / 3);
        for p in rgb.pixels() {
            let [r, g, b] = p.0;
            sum_r += f64::from(r);
            sum_g += f64::from(g);
            sum_b += f64::from(b);
            per_pixel.push(pixel_brightness(f32::from(r), f32::from(g), f32::from(b)));
        }
    } else {
        let gray = image.to_luma8();
        per_pixel = Vec::with_capacity(gray.len());
        for p in gray.pixels() {
            let v = p.0[0];
            sum_r += f64::from(v);
            per_pixel.push(f32::from(v) / 255.0);
        }
        sum_g = sum_r;
        sum_b = sum_r;
    }

    if per_pixel.is_empty() {
        return BrightnessScore { percentiles: percentiles.iter().map(|&p| (p, 0.0)).collect(), brightness: 0.0 };
    }

    let n = per_pixel.len() as f64;
    let avg = pixel_brightness((sum_r / n) as f32, (sum_g / n) as f32, (sum_b / n) as f32);

    per_pixel.sort_by(|a, b| a.total_cmp(b));
    let percentiles = percentiles.iter().map(|&p| (p, percentile_linear(&per_pixel, f32::from(p)))).collect();
    BrightnessScore { percentiles, brightness: avg }
}

/// Linear interpolation between closest ranks over sorted data.
fn percentile_linear(sorted: &[f32], p: f32) -> f32 {
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
