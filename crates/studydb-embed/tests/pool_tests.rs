use candle_core::{DType, Device, Tensor};
use studydb_embed::masked_mean_l2;

#[test]
fn masked_mean_l2_ignores_padding() {
    let dev = Device::Cpu;
    // Batch of two, two tokens each, hidden dim 4. Row 0 masks its second token.
    let h = Tensor::from_slice(
        &[
            1.0f32, 2.0, 3.0, 4.0, // row 0 token 0
            5.0, 6.0, 7.0, 8.0, // row 0 token 1 (padding)
            1.0, 0.0, 0.0, 0.0, // row 1 token 0
            0.0, 1.0, 0.0, 0.0, // row 1 token 1
        ],
        (2, 2, 4),
        &dev,
    )
    .unwrap();
    let mask = Tensor::from_slice(&[1i64, 0, 1, 1], (2, 2), &dev).unwrap().to_dtype(DType::F32).unwrap();
    let out: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();

    let norm: f32 = 30.0f32.sqrt();
    let expected0 = [1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm];
    for (a, b) in out[0].iter().cloned().zip(expected0) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
    let half = 0.5f32.sqrt();
    for (a, b) in out[1].iter().cloned().zip([half, half, 0.0, 0.0]) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn masked_mean_l2_rejects_wrong_rank() {
    let dev = Device::Cpu;
    let h = Tensor::zeros((2, 4), DType::F32, &dev).unwrap();
    let mask = Tensor::ones((2, 4), DType::F32, &dev).unwrap();
    assert!(masked_mean_l2(&h, &mask).is_err());
}
