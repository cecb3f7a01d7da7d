//! kfsearch-text
//!
//! Tantivy index over keyframe annotations (captions, OCR text, detected
//! objects) and the auxiliary retrieval sources that query it.

pub mod annotations;
pub mod index;
pub mod search;
pub mod source;
pub mod tantivy_utils;

pub use annotations::{load_annotations, DetectedObject, DetectionCatalog, KeyframeAnnotation};
pub use index::AnnotationIndexer;
pub use search::{AnnotationHit, AnnotationSearchEngine};
pub use source::AnnotationSource;
pub use tantivy_utils::AnnotationField;
