use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, warn};

use kfsearch_core::traits::RetrievalSource;
use kfsearch_core::types::{FusedResult, RankedList, SearchQuery};
use kfsearch_core::{Error, Result};

use crate::fusion::fuse;
use crate::registry::{ModelRegistry, Snapshot};

/// One user search.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: SearchQuery,
    /// Explicitly selected model ids; each must be loaded.
    pub models: Vec<String>,
    /// Detected-object labels narrowing the fused list.
    pub object_filters: Vec<String>,
    /// Per-source depth. Defaults to `search.default_top_k`.
    pub top_k: Option<usize>,
    /// Final truncation of the fused, filtered list. `None` keeps everything.
    pub result_limit: Option<usize>,
}

impl SearchRequest {
    pub fn text(text: impl Into<String>, models: &[&str]) -> Self {
        Self {
            query: SearchQuery::text(text),
            models: models.iter().map(|m| m.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Trimmed, non-blank filters.
    pub fn active_filters(&self) -> Vec<String> {
        self.object_filters.iter().map(|f| f.trim()).filter(|f| !f.is_empty()).map(str::to_string).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedResults {
    pub results: Vec<FusedResult>,
    /// Labels of every source that was queried, in dispatch order.
    pub sources: Vec<String>,
    /// Sources that failed or timed out and contributed nothing.
    pub degraded_sources: Vec<String>,
    /// Filters were requested but no detection catalog is loaded.
    pub filters_skipped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The request carried no text, image or OCR input.
    NoQuery,
    Ranked(RankedResults),
}

impl SearchOutcome {
    pub fn results(&self) -> &[FusedResult] {
        match self {
            Self::NoQuery => &[],
            Self::Ranked(r) => &r.results,
        }
    }
}

pub struct QueryOrchestrator {
    registry: Arc<ModelRegistry>,
}

impl QueryOrchestrator {
    pub fn new(registry: Arc<ModelRegistry>) -> Self { Self { registry } }

    pub fn registry(&self) -> &Arc<ModelRegistry> { &self.registry }

    /// Dispatch every applicable source concurrently, fuse, then narrow.
    ///
    /// Request errors (unknown model, bad `top_k`, wrong dimension) fail the
    /// call. Any other per-source failure or a timeout degrades that source
    /// to an empty list.
    pub async fn handle_search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        let snapshot = self.registry.snapshot()?;
        let settings = snapshot.settings();
        let top_k = request.top_k.unwrap_or(settings.search.default_top_k);
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be a positive integer".into()));
        }
        if request.result_limit == Some(0) {
            return Err(Error::InvalidArgument("result_limit must be a positive integer".into()));
        }

        let sources = select_sources(&snapshot, request)?;
        if request.query.is_empty() {
            debug!(models = ?request.models, "no query input; skipping fusion");
            return Ok(SearchOutcome::NoQuery);
        }

        let start = Instant::now();
        let deadline = Duration::from_millis(settings.search.source_timeout_ms);
        let query = Arc::new(request.query.clone());
        let labels: Vec<String> = sources.iter().map(|s| s.name().to_string()).collect();
        let calls = sources.into_iter().map(|source| run_source(source, query.clone(), top_k, deadline));
        let outputs = join_all(calls).await;

        let mut named: Vec<(String, RankedList)> = Vec::with_capacity(outputs.len());
        let mut degraded = Vec::new();
        for (label, output) in labels.iter().zip(outputs) {
            match output {
                Ok(list) => named.push((label.clone(), list)),
                Err(e) if e.is_request_error() => return Err(e),
                Err(e) => {
                    warn!(source = %label, error = %e, "source degraded to an empty list");
                    degraded.push(label.clone());
                }
            }
        }

        let mut results = fuse(named.iter().map(|(n, l)| (n, l)), settings.search.k_rrf)?;
        let fused_len = results.len();

        let filters = request.active_filters();
        let mut filters_skipped = false;
        if !filters.is_empty() {
            match snapshot.catalog() {
                Some(catalog) => results.retain(|r| catalog.matches_any(&r.path, &filters)),
                None => {
                    warn!(filters = ?filters, "object filters requested but no detection catalog is loaded; skipping");
                    filters_skipped = true;
                }
            }
        }
        if let Some(limit) = request.result_limit {
            results.truncate(limit);
        }

        info!(
            sources = labels.len(),
            degraded = degraded.len(),
            fused = fused_len,
            returned = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search finished"
        );
        Ok(SearchOutcome::Ranked(RankedResults { results, sources: labels, degraded_sources: degraded, filters_skipped }))
    }
}

/// Sources for this request: each selected model's text/image source when
/// that input is present, then every auxiliary source that accepts the query.
fn select_sources(snapshot: &Snapshot, request: &SearchRequest) -> Result<Vec<Arc<dyn RetrievalSource>>> {
    let mut sources: Vec<Arc<dyn RetrievalSource>> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for id in &request.models {
        let model = snapshot.require_model(id)?;
        if seen.contains(&id.as_str()) {
            continue;
        }
        seen.push(id);
        for source in [&model.text_source, &model.image_source] {
            if source.accepts(&request.query) {
                sources.push(source.clone());
            }
        }
    }
    for source in snapshot.auxiliary_sources() {
        if source.accepts(&request.query) {
            sources.push(source.clone());
        }
    }
    Ok(sources)
}

async fn run_source(
    source: Arc<dyn RetrievalSource>,
    query: Arc<SearchQuery>,
    top_k: usize,
    deadline: Duration,
) -> Result<RankedList> {
    let name = source.name().to_string();
    let task = tokio::task::spawn_blocking(move || source.search(&query, top_k));
    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(Error::source_unavailable(&name, join_err)),
        Err(_) => Err(Error::source_unavailable(&name, format!("no answer within {} ms", deadline.as_millis()))),
    }
}
