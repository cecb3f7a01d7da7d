use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const PATH_FIELD: &str = "path";
const TOKENIZER: &str = "annotation_text";

/// Searchable annotation fields, each backing one auxiliary source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationField {
	Caption,
	Ocr,
	Objects,
}

impl AnnotationField {
	pub const ALL: [AnnotationField; 3] = [Self::Caption, Self::Ocr, Self::Objects];

	pub fn field_name(self) -> &'static str {
		match self {
			Self::Caption => "caption",
			Self::Ocr => "ocr",
			Self::Objects => "objects",
		}
	}

	/// Label the source contributes under in fusion.
	pub fn source_label(self) -> &'static str {
		match self {
			Self::Caption => "caption",
			Self::Ocr => "ocr",
			Self::Objects => "grounding_dino",
		}
	}
}

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(PATH_FIELD, STRING | STORED);
	let indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(indexing);
	for field in AnnotationField::ALL {
		schema_builder.add_text_field(field.field_name(), text_options.clone());
	}
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","in","is","it","its","of","on","that","the","to","was","with","or","this","these","there","then","than",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER, tokenizer);
}
