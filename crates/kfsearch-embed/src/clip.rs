use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use kfsearch_core::config::ModelSpec;
use kfsearch_core::traits::EmbeddingModel;
use kfsearch_core::types::{EmbeddingVector, ImageInput};
use kfsearch_core::{Error, Result};

use crate::device::select_device;
use crate::pool::l2_normalize;
use crate::preprocess::{image_to_tensor, load_image};
use crate::tokenize::{clip_token_ids, CLIP_MAX_LEN};

fn candle_err(e: candle_core::Error) -> Error {
    Error::Encode(e.to_string())
}

/// CLIP text and image towers loaded from a local safetensors checkpoint.
///
/// The model directory holds `model.safetensors` and `tokenizer.json` in the
/// Hugging Face layout.
pub struct ClipEncoder {
    model_id: String,
    model: ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    image_size: usize,
}

impl ClipEncoder {
    pub fn load(model_id: &str, spec: &ModelSpec) -> Result<Self> {
        let config = clip_config(spec.backbone.as_deref())?;
        let model_dir = resolve_model_dir(model_id, spec)?;
        let device = select_device();
        info!(model = model_id, dir = %model_dir.display(), "loading CLIP encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            Error::InvalidConfig(format!("failed to load tokenizer from {}: {}", tokenizer_path.display(), e))
        })?;

        let weights_path = model_dir.join("model.safetensors");
        if !weights_path.exists() {
            return Err(Error::NotFound(format!("CLIP weights {}", weights_path.display())));
        }
        // SAFETY: the weights file is memory-mapped read-only and not modified while loaded.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device) }
            .map_err(candle_err)?;
        let model = ClipModel::new(vb, &config).map_err(candle_err)?;
        info!(model = model_id, dim = spec.dimension, "CLIP encoder ready");

        Ok(Self {
            model_id: model_id.to_string(),
            model,
            tokenizer,
            device,
            dim: spec.dimension,
            image_size: spec.image_size,
        })
    }

    fn to_vector(&self, features: &Tensor) -> Result<EmbeddingVector> {
        let v: Vec<f32> = l2_normalize(features)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_device(&Device::Cpu))
            .and_then(|t| t.to_vec1())
            .map_err(candle_err)?;
        if v.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: v.len() });
        }
        Ok(v)
    }
}

impl EmbeddingModel for ClipEncoder {
    fn model_id(&self) -> &str { &self.model_id }

    fn dim(&self) -> usize { self.dim }

    fn encode_text(&self, text: &str) -> Result<EmbeddingVector> {
        let start = Instant::now();
        let ids = clip_token_ids(&self.tokenizer, text, CLIP_MAX_LEN)?;
        let input_ids = Tensor::new(ids.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err)?;
        let features = self.model.get_text_features(&input_ids).map_err(candle_err)?;
        let v = self.to_vector(&features)?;
        debug!(model = %self.model_id, elapsed_ms = start.elapsed().as_millis() as u64, "encoded text");
        Ok(v)
    }

    fn encode_image(&self, image: &ImageInput) -> Result<EmbeddingVector> {
        let start = Instant::now();
        let img = load_image(image)?;
        let pixels = image_to_tensor(&img, self.image_size, &self.device).map_err(candle_err)?;
        let features = self.model.get_image_features(&pixels).map_err(candle_err)?;
        let v = self.to_vector(&features)?;
        debug!(model = %self.model_id, elapsed_ms = start.elapsed().as_millis() as u64, "encoded image");
        Ok(v)
    }
}

fn clip_config(backbone: Option<&str>) -> Result<ClipConfig> {
    match backbone.unwrap_or("ViT-B/32") {
        "ViT-B/32" | "ViT-B-32" | "vit-base-patch32" => Ok(ClipConfig::vit_base_patch32()),
        other => Err(Error::InvalidConfig(format!("unsupported CLIP backbone '{}'", other))),
    }
}

fn resolve_model_dir(model_id: &str, spec: &ModelSpec) -> Result<PathBuf> {
    if let Some(dir) = spec.model_dir.as_ref().filter(|d| d.exists()) {
        return Ok(dir.clone());
    }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") {
        let p = PathBuf::from(dir).join(model_id);
        if p.exists() { debug!(dir = %p.display(), "using APP_MODEL_DIR"); return Ok(p); }
    }
    let local = Path::new("models").join(model_id);
    if local.exists() { return Ok(local); }
    Err(Error::NotFound(format!("model directory for '{}'", model_id)))
}
