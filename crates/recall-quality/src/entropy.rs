use image::DynamicImage;

/// Shannon entropy (bits) of the image histogram. Color images use the
/// concatenated per-channel RGB histogram (768 bins), grayscale images 256 bins.
pub fn entropy(image: &DynamicImage) -> f32 {
    let (hist, total) = if image.color().has_color() {
        let rgb = image.to_rgb8();
        let mut hist = vec![0u64; 768];
        for p in rgb.pixels() {
            for (c, &v) in p.0.iter().enumerate() { hist[c * 256 + usize::from(v)] += 1; }
        }
        let total = rgb.len() as u64;
        (hist, total)
    } else {
        let gray = image.to_luma8();
        let mut hist = vec![0u64; 256];
        for p in gray.pixels() { hist[usize::from(p.0[0])] += 1; }
        let total = gray.len() as u64;
        (hist, total)
    };
    if total == 0 { return 0.0; }
    let total = total as f64;
    let h: f64 = hist
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| { let p = c as f64 / total; -p * p.log2() })
        .sum();
    h as f32
}

/// Entropy divided by 10, which maps real images to roughly `[0, 1]`.
pub fn entropy_score(image: &DynamicImage) -> f32 { entropy(image) / 10.0 }
