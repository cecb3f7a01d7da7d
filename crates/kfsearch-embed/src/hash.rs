use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use kfsearch_core::traits::EmbeddingModel;
use kfsearch_core::types::{normalize, EmbeddingVector, ImageInput};
use kfsearch_core::{Error, Result};

/// Deterministic, weight-free encoder for tests and development.
///
/// Text is bucketed per whitespace token, images per 64-byte block of the
/// raw file, so identical inputs always map to identical unit vectors.
pub struct HashEncoder {
    model_id: String,
    dim: usize,
}

impl HashEncoder {
    pub fn new(model_id: impl Into<String>, dim: usize) -> Self {
        Self { model_id: model_id.into(), dim: dim.max(1) }
    }

    fn bucket(&self, v: &mut [f32], item: impl Hash, position: usize) {
        let mut hasher = XxHash64::with_seed(0);
        item.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h as usize) % self.dim;
        let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        v[idx] += val + (position as f32 % 3.0) * 0.01;
    }

    fn finish(mut v: Vec<f32>) -> EmbeddingVector {
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        normalize(&mut v);
        v
    }
}

impl EmbeddingModel for HashEncoder {
    fn model_id(&self) -> &str { &self.model_id }

    fn dim(&self) -> usize { self.dim }

    fn encode_text(&self, text: &str) -> Result<EmbeddingVector> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            self.bucket(&mut v, token.to_lowercase(), i);
        }
        Ok(Self::finish(v))
    }

    fn encode_image(&self, image: &ImageInput) -> Result<EmbeddingVector> {
        let bytes = match image {
            ImageInput::Path(path) => std::fs::read(path)
                .map_err(|e| Error::Encode(format!("cannot read image {}: {}", path.display(), e)))?,
            ImageInput::Bytes(bytes) => bytes.clone(),
        };
        if bytes.is_empty() {
            return Err(Error::Encode("empty image".into()));
        }
        let mut v = vec![0f32; self.dim];
        for (i, block) in bytes.chunks(64).enumerate() {
            self.bucket(&mut v, block, i);
        }
        Ok(Self::finish(v))
    }
}
