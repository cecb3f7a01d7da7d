use std::sync::Arc;

use kfsearch_core::traits::RetrievalSource;
use kfsearch_core::types::{RankedList, SearchQuery};
use kfsearch_core::{Error, Result};

use crate::search::AnnotationSearchEngine;
use crate::tantivy_utils::AnnotationField;

/// Auxiliary source over one annotation field.
///
/// Captions and detected objects react to the text query; the OCR source
/// reacts only to the dedicated OCR text.
pub struct AnnotationSource {
	field: AnnotationField,
	engine: Arc<AnnotationSearchEngine>,
}

impl AnnotationSource {
	pub fn new(field: AnnotationField, engine: Arc<AnnotationSearchEngine>) -> Self {
		Self { field, engine }
	}

	pub fn caption(engine: Arc<AnnotationSearchEngine>) -> Self { Self::new(AnnotationField::Caption, engine) }

	pub fn ocr(engine: Arc<AnnotationSearchEngine>) -> Self { Self::new(AnnotationField::Ocr, engine) }

	pub fn objects(engine: Arc<AnnotationSearchEngine>) -> Self { Self::new(AnnotationField::Objects, engine) }

	/// One source per annotation field, sharing `engine`.
	pub fn all(engine: Arc<AnnotationSearchEngine>) -> Vec<Self> {
		AnnotationField::ALL.into_iter().map(|f| Self::new(f, engine.clone())).collect()
	}

	fn input<'q>(&self, query: &'q SearchQuery) -> Option<&'q str> {
		match self.field {
			AnnotationField::Caption | AnnotationField::Objects => query.text_input(),
			AnnotationField::Ocr => query.ocr_input(),
		}
	}
}

impl RetrievalSource for AnnotationSource {
	fn name(&self) -> &str { self.field.source_label() }

	fn accepts(&self, query: &SearchQuery) -> bool { self.input(query).is_some() }

	fn search(&self, query: &SearchQuery, top_k: usize) -> Result<RankedList> {
		let Some(text) = self.input(query) else { return Ok(Vec::new()) };
		let hits = self.engine.search_field(self.field, text, top_k).map_err(|e| match e {
			Error::InvalidArgument(_) => e,
			other => Error::source_unavailable(self.name(), other),
		})?;
		let mut paths: RankedList = Vec::with_capacity(hits.len());
		for hit in hits {
			if !paths.contains(&hit.path) {
				paths.push(hit.path);
			}
		}
		Ok(paths)
	}
}
