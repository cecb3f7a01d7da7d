//! Process-wide registry of loaded models, indexes and auxiliary sources.
//!
//! Everything a search reads lives in one immutable [`Snapshot`]. `reload`
//! builds a complete new snapshot off to the side and swaps the shared
//! reference under a lock; searches already holding the old `Arc` finish
//! against it.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{info, warn};

use kfsearch_core::config::{ModelSpec, Settings};
use kfsearch_core::traits::{EmbeddingModel, EncoderLoader, ObjectLookup, RetrievalSource, VectorIndex};
use kfsearch_core::{Error, Result};
use kfsearch_text::{AnnotationSearchEngine, AnnotationSource, DetectionCatalog};
use kfsearch_vector::{FlatIpIndex, ImageVectorSource, TextVectorSource};

/// One servable model: its encoder, its index, and the two sources over them.
pub struct LoadedModel {
    pub id: String,
    pub encoder: Arc<dyn EmbeddingModel>,
    pub index: Arc<dyn VectorIndex>,
    pub text_source: Arc<dyn RetrievalSource>,
    pub image_source: Arc<dyn RetrievalSource>,
}

impl LoadedModel {
    pub fn new(id: &str, encoder: Arc<dyn EmbeddingModel>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            id: id.to_string(),
            text_source: Arc::new(TextVectorSource::new(id, encoder.clone(), index.clone())),
            image_source: Arc::new(ImageVectorSource::new(id, encoder.clone(), index.clone())),
            encoder,
            index,
        }
    }

    fn load(id: &str, spec: &ModelSpec, loader: &dyn EncoderLoader) -> Result<Self> {
        let encoder = loader.load(id, spec)?;
        if encoder.dim() != spec.dimension {
            return Err(Error::DimensionMismatch { expected: spec.dimension, actual: encoder.dim() });
        }
        let index = FlatIpIndex::open(&spec.vector_path, &spec.mapping_path)?;
        if index.dim() != spec.dimension {
            return Err(Error::index_load(
                &spec.vector_path,
                format!("stored dimension {} but models.{}.dimension is {}", index.dim(), id, spec.dimension),
            ));
        }
        Ok(Self::new(id, encoder, Arc::new(index)))
    }
}

/// Immutable view of everything a search needs.
pub struct Snapshot {
    settings: Settings,
    models: BTreeMap<String, LoadedModel>,
    unavailable: BTreeMap<String, String>,
    auxiliary: Vec<Arc<dyn RetrievalSource>>,
    catalog: Option<Arc<dyn ObjectLookup>>,
}

impl Snapshot {
    pub fn new(settings: Settings) -> Self {
        Self { settings, models: BTreeMap::new(), unavailable: BTreeMap::new(), auxiliary: Vec::new(), catalog: None }
    }

    pub fn with_model(mut self, model: LoadedModel) -> Self {
        self.unavailable.remove(&model.id);
        self.models.insert(model.id.clone(), model);
        self
    }

    pub fn with_unavailable(mut self, id: &str, reason: impl ToString) -> Self {
        self.models.remove(id);
        self.unavailable.insert(id.to_string(), reason.to_string());
        self
    }

    pub fn with_auxiliary(mut self, source: Arc<dyn RetrievalSource>) -> Self {
        self.auxiliary.push(source);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ObjectLookup>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Load every configured model and auxiliary backend.
    ///
    /// Failures are scoped: a model that cannot be loaded is recorded as
    /// unavailable and the rest keep serving.
    pub fn load(settings: Settings, loader: &dyn EncoderLoader) -> Self {
        let start = Instant::now();
        let mut snapshot = Self::new(settings.clone());

        for (id, spec) in &settings.models {
            snapshot = match LoadedModel::load(id, spec, loader) {
                Ok(model) => {
                    info!(model = %id, rows = model.index.stats().num_vectors, dim = spec.dimension, "model loaded");
                    snapshot.with_model(model)
                }
                Err(e) => {
                    warn!(model = %id, error = %e, "model not loaded");
                    snapshot.with_unavailable(id, e)
                }
            };
        }

        if let Some(dir) = settings.annotations.text_index_dir.as_deref() {
            match AnnotationSearchEngine::open(dir) {
                Ok(engine) => {
                    info!(dir = %dir.display(), docs = engine.num_docs(), "annotation index loaded");
                    for source in AnnotationSource::all(Arc::new(engine)) {
                        snapshot = snapshot.with_auxiliary(Arc::new(source));
                    }
                }
                Err(e) => warn!(error = %e, "annotation index not loaded; caption/OCR/object sources disabled"),
            }
        }

        if let Some(path) = settings.annotations.detections_path.as_deref() {
            match DetectionCatalog::load(path) {
                Ok(catalog) => snapshot = snapshot.with_catalog(Arc::new(catalog)),
                Err(e) => warn!(error = %e, "detection catalog not loaded; object filters disabled"),
            }
        }

        info!(
            available = snapshot.models.len(),
            unavailable = snapshot.unavailable.len(),
            auxiliary = snapshot.auxiliary.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "registry snapshot ready"
        );
        snapshot
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn model(&self, id: &str) -> Option<&LoadedModel> { self.models.get(id) }

    pub fn available_models(&self) -> Vec<String> { self.models.keys().cloned().collect() }

    /// Configured models that failed to load, with the reason.
    pub fn unavailable_models(&self) -> &BTreeMap<String, String> { &self.unavailable }

    pub fn auxiliary_sources(&self) -> &[Arc<dyn RetrievalSource>] { &self.auxiliary }

    pub fn catalog(&self) -> Option<&Arc<dyn ObjectLookup>> { self.catalog.as_ref() }

    /// Look up an explicitly requested model.
    pub fn require_model(&self, id: &str) -> Result<&LoadedModel> {
        self.models
            .get(id)
            .ok_or_else(|| Error::ModelUnavailable { requested: id.to_string(), available: self.available_models() })
    }
}

pub struct ModelRegistry {
    loader: Arc<dyn EncoderLoader>,
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl ModelRegistry {
    pub fn init(settings: Settings, loader: Arc<dyn EncoderLoader>) -> Self {
        let snapshot = Snapshot::load(settings, loader.as_ref());
        Self::with_snapshot(loader, snapshot)
    }

    pub fn with_snapshot(loader: Arc<dyn EncoderLoader>, snapshot: Snapshot) -> Self {
        Self { loader, current: RwLock::new(Some(Arc::new(snapshot))) }
    }

    /// Current snapshot. Fails once the registry has been shut down.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        let guard = self.current.read().map_err(|_| Error::Operation("registry lock poisoned".into()))?;
        guard.clone().ok_or_else(|| Error::Operation("registry has been shut down".into()))
    }

    /// Reload with the settings of the current snapshot.
    pub fn reload(&self) -> Result<Arc<Snapshot>> {
        let settings = self.snapshot()?.settings().clone();
        self.reload_with(settings)
    }

    pub fn reload_with(&self, settings: Settings) -> Result<Arc<Snapshot>> {
        settings.validate()?;
        let fresh = Snapshot::load(settings, self.loader.as_ref());
        Ok(self.install(fresh))
    }

    /// Swap in a fully built snapshot.
    pub fn install(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(snapshot.clone());
        info!(models = ?snapshot.available_models(), "registry snapshot swapped");
        snapshot
    }

    pub fn shutdown(&self) {
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.take().is_some() {
            info!("registry shut down");
        }
    }

    pub fn available_models(&self) -> Vec<String> {
        self.snapshot().map(|s| s.available_models()).unwrap_or_default()
    }

    pub fn unavailable_models(&self) -> BTreeMap<String, String> {
        self.snapshot().map(|s| s.unavailable_models().clone()).unwrap_or_default()
    }
}
