use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma};
use imageproc::filter::filter3x3;

/// Images are downscaled so their longest side is at most this many pixels.
pub const MAX_RESOLUTION_FOR_BLUR_DETECTION: u32 = 64;

/// 3x3 Laplacian-style edge kernel.
const FIND_EDGES: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];

/// Sharpness in `[0, 1]`; higher means less blurry.
///
/// Two saturating components are added and capped at 1: the standard
/// deviation of the edge response and the standard deviation of grayscale
/// intensities. Either strong edges or a wide tonal spread counts as
/// evidence of a sharp image; a flat image scores 0.
pub fn blurriness(image: &DynamicImage) -> f32 {
    let gray = grayscale_601(&downscale(image));
    if gray.is_empty() { return 0.0; }
    let edge_component = saturate(edge_std(&gray));
    let spread_component = saturate(intensity_std(&gray));
    (edge_component + spread_component).min(1.0)
}

fn downscale(image: &DynamicImage) -> DynamicImage {
    let (w, h) = image.dimensions();
    let ratio = w.max(h) as f32 / MAX_RESOLUTION_FOR_BLUR_DETECTION as f32;
    if ratio <= 1.0 { return image.clone(); }
    let nw = ((w as f32 / ratio).floor() as u32).max(1);
    let nh = ((h as f32 / ratio).floor() as u32).max(1);
    image.resize_exact(nw, nh, FilterType::CatmullRom)
}

/// ITU-R 601-2 luma with the fixed-point rounding used by common imaging
/// libraries: `(19595 R + 38470 G + 7471 B + 0x8000) >> 16`.
pub fn grayscale_601(image: &DynamicImage) -> GrayImage {
    if !image.color().has_color() { return image.to_luma8(); }
    let rgb = image.to_rgb8();
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16;
        Luma([l.min(255) as u8])
    })
}

/// Standard deviation of the 8-bit edge response.
fn edge_std(gray: &GrayImage) -> f32 {
    let gray_f: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| Luma([f32::from(gray.get_pixel(x, y).0[0])]));
    let edges: Vec<f32> = filter3x3(&gray_f, &FIND_EDGES).into_raw();
    let clamped: Vec<f32> = edges.into_iter().map(|v| v.clamp(0.0, 255.0).round()).collect();
    variance(&clamped).sqrt()
}

fn intensity_std(gray: &GrayImage) -> f32 {
    let values: Vec<f32> = gray.pixels().map(|p| f32::from(p.0[0])).collect();
    variance(&values).sqrt()
}

/// Population variance.
fn variance(values: &[f32]) -> f32 {
    if values.is_empty() { return 0.0; }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let var = values.iter().map(|&v| (f64::from(v) - mean).powi(2)).sum::<f64>() / n;
    var as f32
}

/// `1 - e^(-x/100)`
fn saturate(x: f32) -> f32 { 1.0 - (-x / 100.0).exp() }
