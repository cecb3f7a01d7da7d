use std::path::Path;

use serde::{Deserialize, Serialize};

use kfsearch_core::types::{basename, to_posix_path};

use crate::orchestrator::{SearchOutcome, SearchRequest};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchInfo {
    pub text_query: bool,
    pub image_query: bool,
    pub ocr_query: bool,
    pub object_filters: usize,
    pub models_used: Vec<String>,
    pub sources: Vec<String>,
    pub degraded_sources: Vec<String>,
    pub filters_skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Wire shape returned to the web layer; the three lists are parallel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub paths: Vec<String>,
    pub scores: Vec<f64>,
    pub filenames: Vec<String>,
    pub search_info: SearchInfo,
}

impl SearchResponse {
    pub fn from_outcome(request: &SearchRequest, outcome: &SearchOutcome, database_dir: Option<&Path>) -> Self {
        let prefix = database_dir.map(to_posix_path);
        let mut response = Self {
            search_info: SearchInfo {
                text_query: request.query.text_input().is_some(),
                image_query: request.query.image_input().is_some(),
                ocr_query: request.query.ocr_input().is_some(),
                object_filters: request.active_filters().len(),
                models_used: request.models.clone(),
                ..SearchInfo::default()
            },
            ..Self::default()
        };

        match outcome {
            SearchOutcome::NoQuery => {
                response.search_info.message = Some("no query: provide text, an image or OCR text".into());
            }
            SearchOutcome::Ranked(ranked) => {
                for r in &ranked.results {
                    response.paths.push(strip_prefix(&r.path, prefix.as_deref()).to_string());
                    response.scores.push(r.score);
                    response.filenames.push(basename(&r.path).to_string());
                }
                response.search_info.sources = ranked.sources.clone();
                response.search_info.degraded_sources = ranked.degraded_sources.clone();
                response.search_info.filters_skipped = ranked.filters_skipped;
            }
        }
        response
    }
}

/// `path` relative to the database directory, or unchanged when it lies
/// elsewhere.
pub fn strip_prefix<'p>(path: &'p str, prefix: Option<&str>) -> &'p str {
    let Some(prefix) = prefix.map(|p| p.trim_end_matches('/')).filter(|p| !p.is_empty()) else {
        return path;
    };
    match path.strip_prefix(prefix) {
        Some(rest) if rest.starts_with('/') => rest,
        Some("") => "",
        _ => path,
    }
}
