use std::path::Path;
use std::sync::Arc;

use crate::config::ModelSpec;
use crate::error::Result;
use crate::types::{EmbeddingVector, ImageInput, IndexStats, RankedList, ScoredEntry, SearchQuery};

/// Vision-language encoder mapping text and images into one space.
///
/// Both encoders return L2-normalised vectors of length [`dim`](Self::dim).
pub trait EmbeddingModel: Send + Sync {
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn encode_text(&self, text: &str) -> Result<EmbeddingVector>;
    fn encode_image(&self, image: &ImageInput) -> Result<EmbeddingVector>;
}

/// Exact inner-product index plus its id→path mapping.
///
/// The matrix and the mapping are one unit: they are built, saved and loaded
/// together, and a snapshot is never mutated row by row.
pub trait VectorIndex: Send + Sync {
    /// Replace the current contents by encoding `paths` in order.
    fn build(
        &mut self,
        paths: &[String],
        encode: &mut dyn FnMut(&str) -> Result<EmbeddingVector>,
    ) -> Result<()>;
    fn save(&self, vector_path: &Path, mapping_path: &Path) -> Result<()>;
    fn load(&mut self, vector_path: &Path, mapping_path: &Path) -> Result<()>;
    /// Top `top_k` rows by descending inner product, ties by ascending id.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>>;
    fn stats(&self) -> IndexStats;
}

/// Anything that can turn a query into a best-first list of keyframe paths.
pub trait RetrievalSource: Send + Sync {
    fn name(&self) -> &str;
    /// Whether `query` carries the input this source reacts to.
    fn accepts(&self, query: &SearchQuery) -> bool {
        !query.is_empty()
    }
    /// Returns an empty list when the input this source reacts to is absent.
    fn search(&self, query: &SearchQuery, top_k: usize) -> Result<RankedList>;
}

/// Detected-object metadata used to narrow fused results.
pub trait ObjectLookup: Send + Sync {
    /// Lower-cased object labels detected in the keyframe at `path`.
    fn objects_for(&self, path: &str) -> Option<&[String]>;

    fn matches_any(&self, path: &str, filters: &[String]) -> bool {
        self.objects_for(path).is_some_and(|labels| {
            filters
                .iter()
                .any(|f| labels.iter().any(|l| l.eq_ignore_ascii_case(f.trim())))
        })
    }
}

/// Constructs the encoder for a configured model.
pub trait EncoderLoader: Send + Sync {
    fn load(&self, model_id: &str, spec: &ModelSpec) -> Result<Arc<dyn EmbeddingModel>>;
}
