//! kfsearch-embed
//!
//! Query and keyframe encoders. [`ClipEncoder`] runs a CLIP checkpoint on
//! candle; [`HashEncoder`] is a deterministic stand-in selected with
//! `APP_USE_FAKE_EMBEDDINGS=1` so pipelines can run without model weights.

use std::sync::Arc;

use tracing::info;

use kfsearch_core::config::ModelSpec;
use kfsearch_core::traits::{EmbeddingModel, EncoderLoader};
use kfsearch_core::Result;

pub mod clip;
pub mod device;
pub mod hash;
pub mod pool;
pub mod preprocess;
pub mod tokenize;

pub use clip::ClipEncoder;
pub use hash::HashEncoder;
pub use pool::l2_normalize;

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Loads [`ClipEncoder`]s, or [`HashEncoder`]s when fakes are requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandleEncoderLoader {
    use_fake: bool,
}

impl CandleEncoderLoader {
    pub fn new(use_fake: bool) -> Self { Self { use_fake } }

    pub fn from_env() -> Self { Self::new(use_fake_embeddings()) }
}

impl EncoderLoader for CandleEncoderLoader {
    fn load(&self, model_id: &str, spec: &ModelSpec) -> Result<Arc<dyn EmbeddingModel>> {
        if self.use_fake {
            info!(model = model_id, dim = spec.dimension, "using HashEncoder");
            return Ok(Arc::new(HashEncoder::new(model_id, spec.dimension)));
        }
        Ok(Arc::new(ClipEncoder::load(model_id, spec)?))
    }
}

pub fn get_default_encoder(model_id: &str, spec: &ModelSpec) -> Result<Arc<dyn EmbeddingModel>> {
    CandleEncoderLoader::from_env().load(model_id, spec)
}
