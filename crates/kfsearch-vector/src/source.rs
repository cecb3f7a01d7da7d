use std::sync::Arc;

use kfsearch_core::traits::{EmbeddingModel, RetrievalSource, VectorIndex};
use kfsearch_core::types::{RankedList, SearchQuery};
use kfsearch_core::Result;

/// Text query → model text tower → vector index. Labelled `{model}_text`.
pub struct TextVectorSource {
    name: String,
    encoder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
}

impl TextVectorSource {
    pub fn new(model_id: &str, encoder: Arc<dyn EmbeddingModel>, index: Arc<dyn VectorIndex>) -> Self {
        Self { name: format!("{}_text", model_id), encoder, index }
    }
}

impl RetrievalSource for TextVectorSource {
    fn name(&self) -> &str { &self.name }

    fn accepts(&self, query: &SearchQuery) -> bool { query.text_input().is_some() }

    fn search(&self, query: &SearchQuery, top_k: usize) -> Result<RankedList> {
        let Some(text) = query.text_input() else { return Ok(Vec::new()) };
        let v = self.encoder.encode_text(text)?;
        Ok(self.index.search(&v, top_k)?.into_iter().map(|e| e.path).collect())
    }
}

/// Query image → model image tower → vector index. Labelled `{model}_image`.
pub struct ImageVectorSource {
    name: String,
    encoder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
}

impl ImageVectorSource {
    pub fn new(model_id: &str, encoder: Arc<dyn EmbeddingModel>, index: Arc<dyn VectorIndex>) -> Self {
        Self { name: format!("{}_image", model_id), encoder, index }
    }
}

impl RetrievalSource for ImageVectorSource {
    fn name(&self) -> &str { &self.name }

    fn accepts(&self, query: &SearchQuery) -> bool { query.image_input().is_some() }

    fn search(&self, query: &SearchQuery, top_k: usize) -> Result<RankedList> {
        let Some(image) = query.image_input() else { return Ok(Vec::new()) };
        let v = self.encoder.encode_image(image)?;
        Ok(self.index.search(&v, top_k)?.into_iter().map(|e| e.path).collect())
    }
}
