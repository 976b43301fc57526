use candle_core::{Device, Tensor};
use recall_embed::l2_normalize_twice;

#[test]
fn single_row_is_unit_norm() {
    let dev = Device::Cpu;
    let t = Tensor::from_slice(&[3.0f32, 4.0, 0.0, 0.0], (1, 4), &dev).unwrap();
    let v = l2_normalize_twice(&t).unwrap();
    let expected = [0.6f32, 0.8, 0.0, 0.0];
    for (a, b) in v.iter().cloned().zip(expected) {
        assert!((a - b).abs() < 1e-6, "a={} b={}", a, b);
    }
}

#[test]
fn batch_flattens_into_one_unit_vector() {
    let dev = Device::Cpu;
    // Each row normalizes to [1, 0] / [0, 1]; the flattened pair then has norm sqrt(2).
    let t = Tensor::from_slice(&[5.0f32, 0.0, 0.0, 2.0], (2, 2), &dev).unwrap();
    let v = l2_normalize_twice(&t).unwrap();
    assert_eq!(v.len(), 4);
    let s = 1.0 / 2f32.sqrt();
    for (a, b) in v.iter().cloned().zip([s, 0.0, 0.0, s]) {
        assert!((a - b).abs() < 1e-6, "a={} b={}", a, b);
    }
}

#[test]
fn zero_vector_stays_finite() {
    let t = Tensor::zeros((1, 8), candle_core::DType::F32, &Device::Cpu).unwrap();
    let v = l2_normalize_twice(&t).unwrap();
    assert!(v.iter().all(|x| x.is_finite() && *x == 0.0));
}
