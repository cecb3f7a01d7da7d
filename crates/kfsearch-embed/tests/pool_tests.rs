use candle_core::{Device, Tensor};
use kfsearch_embed::l2_normalize;

#[test]
fn l2_normalize_rows() {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0,
                                 0.0, 0.0, 0.0, 5.0],
                               (2, 4), &dev).unwrap();
    let out = l2_normalize(&h).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    let norm: f32 = (1.0f32 + 4.0 + 9.0 + 16.0).sqrt();
    let expected = [1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm];
    for (a, b) in v[0].iter().cloned().zip(expected) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
    assert!((v[1][3] - 1.0).abs() < 1e-5);
}
