use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;

pub const CLIP_IMAGE_SIZE: u32 = 224;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Resizes to `size` x `size`, scales to `[0, 1]` and applies CLIP channel
/// normalization. Output shape `[1, 3, size, size]`.
pub fn to_pixel_tensor(image: &DynamicImage, size: u32, device: &Device) -> Result<Tensor> {
    let rgb = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
    let side = size as usize;
    let pixels = Tensor::from_vec(rgb.into_raw(), (side, side, 3), device)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(1.0 / 255.0, 0.0)?;
    let mean = Tensor::new(&CLIP_MEAN, device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&CLIP_STD, device)?.reshape((3, 1, 1))?;
    Ok(pixels.broadcast_sub(&mean)?.broadcast_div(&std)?.unsqueeze(0)?)
}
