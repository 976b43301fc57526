use anyhow::Result;
use candle_core::{DType, Device, Tensor};

const EPS: f64 = 1e-12;

/// L2-normalizes each row over its last dimension, flattens, then
/// L2-normalizes the flattened vector again. For a single `[1, D]` row the
/// second pass is a no-op up to rounding; for batches it yields one unit
/// vector over all rows.
pub fn l2_normalize_twice(features: &Tensor) -> Result<Vec<f32>> {
    let features = features.to_dtype(DType::F32)?;
    let last = features.rank().saturating_sub(1);
    let norm = features.sqr()?.sum_keepdim(last)?.sqrt()?.affine(1.0, EPS)?;
    let once = features.broadcast_div(&norm)?;
    let flat = once.flatten_all()?;
    let total = flat.sqr()?.sum_all()?.sqrt()?.to_scalar::<f32>()?;
    let twice = flat.affine(1.0 / (f64::from(total) + EPS), 0.0)?;
    Ok(twice.to_device(&Device::Cpu)?.to_vec1::<f32>()?)
}
