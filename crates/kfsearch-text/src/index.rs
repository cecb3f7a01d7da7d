use std::path::{Path, PathBuf};

use tantivy::schema::Field;
use tantivy::{Index, IndexWriter, TantivyDocument};
use tracing::info;

use kfsearch_core::{Error, Result};

use crate::annotations::KeyframeAnnotation;
use crate::tantivy_utils::{build_schema, register_tokenizer, AnnotationField, PATH_FIELD};

const WRITER_HEAP_BYTES: usize = 50_000_000;

fn tantivy_err(e: tantivy::TantivyError) -> Error {
	Error::Build(format!("tantivy: {}", e))
}

pub struct AnnotationIndexer {
	index: Index,
	index_dir: PathBuf,
	path_field: Field,
	text_fields: Vec<(AnnotationField, Field)>,
}

impl AnnotationIndexer {
	/// Create an empty index in `index_dir`, replacing whatever was there.
	pub fn create_in_dir(index_dir: &Path) -> Result<Self> {
		let schema = build_schema();
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		let index = Index::create_in_dir(index_dir, schema.clone()).map_err(tantivy_err)?;
		register_tokenizer(&index);
		let path_field = schema.get_field(PATH_FIELD).map_err(tantivy_err)?;
		let mut text_fields = Vec::with_capacity(AnnotationField::ALL.len());
		for f in AnnotationField::ALL {
			text_fields.push((f, schema.get_field(f.field_name()).map_err(tantivy_err)?));
		}
		Ok(Self { index, index_dir: index_dir.to_path_buf(), path_field, text_fields })
	}

	/// Add one document per annotation and commit. Returns the number indexed.
	pub fn index(&self, annotations: &[KeyframeAnnotation]) -> Result<usize> {
		let mut writer: IndexWriter<TantivyDocument> = self.index.writer(WRITER_HEAP_BYTES).map_err(tantivy_err)?;
		for a in annotations {
			let mut doc = TantivyDocument::default();
			doc.add_text(self.path_field, &a.path);
			for (kind, field) in &self.text_fields {
				let text = match kind {
					AnnotationField::Caption => a.caption.clone().unwrap_or_default(),
					AnnotationField::Ocr => a.ocr.clone().unwrap_or_default(),
					AnnotationField::Objects => a.objects_text(),
				};
				if !text.trim().is_empty() {
					doc.add_text(*field, text);
				}
			}
			writer.add_document(doc).map_err(tantivy_err)?;
		}
		writer.commit().map_err(tantivy_err)?;
		info!(documents = annotations.len(), dir = %self.index_dir.display(), "committed annotation index");
		Ok(annotations.len())
	}
}
