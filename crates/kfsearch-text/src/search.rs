use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{Index, IndexReader, TantivyDocument};
use tracing::debug;

use kfsearch_core::{Error, Result};

use crate::tantivy_utils::{register_tokenizer, AnnotationField, PATH_FIELD};

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationHit {
	pub score: f32,
	pub path: String,
}

/// Read side of the annotation index.
pub struct AnnotationSearchEngine {
	index: Index,
	reader: IndexReader,
	path_field: Field,
}

impl AnnotationSearchEngine {
	pub fn open(index_dir: &Path) -> Result<Self> {
		let load_err = |e: tantivy::TantivyError| Error::index_load(index_dir, e);
		let index = Index::open_in_dir(index_dir).map_err(load_err)?;
		register_tokenizer(&index);
		let reader = index.reader().map_err(load_err)?;
		let path_field = index.schema().get_field(PATH_FIELD).map_err(load_err)?;
		Ok(Self { index, reader, path_field })
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}

	/// Best-first hits for `query_text` against one field.
	///
	/// Query syntax errors are tolerated; the parser keeps whatever terms it
	/// could make sense of. Equal scores are ordered by path.
	pub fn search_field(&self, field: AnnotationField, query_text: &str, limit: usize) -> Result<Vec<AnnotationHit>> {
		if limit == 0 {
			return Err(Error::InvalidArgument("top_k must be a positive integer".into()));
		}
		let query_err = |e: tantivy::TantivyError| Error::Operation(format!("annotation search failed: {}", e));
		let target = self.index.schema().get_field(field.field_name()).map_err(query_err)?;
		let query_parser = QueryParser::for_index(&self.index, vec![target]);
		let (query, errors) = query_parser.parse_query_lenient(query_text);
		if !errors.is_empty() {
			debug!(field = field.field_name(), query = query_text, errors = errors.len(), "lenient query parse");
		}

		let searcher = self.reader.searcher();
		// TopDocs preallocates `limit` slots, so never ask for more than the index holds.
		let limit = limit.min(usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX)).max(1);
		let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit)).map_err(query_err)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(query_err)?;
			if let Some(path) = doc.get_first(self.path_field).and_then(|v| v.as_str()) {
				hits.push(AnnotationHit { score, path: path.to_string() });
			}
		}
		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
		Ok(hits)
	}
}
