use candle_core::{DType, Result, Tensor};

/// Row-wise L2 normalisation of a `[B, D]` feature matrix.
pub fn l2_normalize(features: &Tensor) -> Result<Tensor> {
    let eps_val = match features.dtype() { DType::F16 | DType::BF16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], features.device())?.to_dtype(features.dtype())?.unsqueeze(0)?;
    let norm = features.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norm = norm.broadcast_add(&eps)?;
    features.broadcast_div(&norm)
}
