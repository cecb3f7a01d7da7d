use std::sync::Arc;

use kfsearch_core::traits::{ObjectLookup, RetrievalSource};
use kfsearch_core::types::SearchQuery;
use kfsearch_core::Error;
use kfsearch_text::{
    load_annotations, AnnotationField, AnnotationIndexer, AnnotationSearchEngine, AnnotationSource, DetectionCatalog,
};
use tempfile::TempDir;

const ANNOTATIONS: &str = r#"[
  {"path": "keyframes/L01_V001/0001.jpg", "caption": "a red fire truck parked on a city street",
   "ocr": "HTV9 BREAKING NEWS", "objects": [{"label": "truck", "score": 0.93}, {"label": "person", "score": 0.71}]},
  {"path": "keyframes/L01_V001/0002.jpg", "caption": "a news anchor sitting at a desk",
   "ocr": "60 GIAY", "objects": [{"label": "person", "score": 0.88}, {"label": "microphone", "prompt": "mic"}]},
  {"path": "keyframes/L01_V002/0001.jpg", "caption": "boats floating on a river at sunset",
   "objects": [{"label": "boat"}]},
  {"path": "keyframes/L01_V002/0002.jpg"}
]"#;

fn setup() -> (TempDir, Arc<AnnotationSearchEngine>) {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("annotations.json");
    std::fs::write(&file, ANNOTATIONS).unwrap();
    let annotations = load_annotations(&file).unwrap();

    let index_dir = tmp.path().join("indexes/annotations");
    let indexer = AnnotationIndexer::create_in_dir(&index_dir).unwrap();
    assert_eq!(indexer.index(&annotations).unwrap(), 4);
    let engine = AnnotationSearchEngine::open(&index_dir).unwrap();
    (tmp, Arc::new(engine))
}

#[test]
fn caption_source_ranks_matching_keyframe_first() {
    let (_tmp, engine) = setup();
    assert_eq!(engine.num_docs(), 4);
    let source = AnnotationSource::caption(engine);
    assert_eq!(source.name(), "caption");
    let paths = source.search(&SearchQuery::text("red truck on the street"), 10).unwrap();
    assert_eq!(paths.first().map(String::as_str), Some("keyframes/L01_V001/0001.jpg"));
    assert!(!paths.contains(&"keyframes/L01_V002/0002.jpg".to_string()));
}

#[test]
fn ocr_source_only_reacts_to_ocr_text() {
    let (_tmp, engine) = setup();
    let source = AnnotationSource::ocr(engine);
    assert_eq!(source.name(), "ocr");
    assert!(source.search(&SearchQuery::text("breaking news"), 10).unwrap().is_empty());

    let query = SearchQuery { ocr_text: Some("breaking news".into()), ..SearchQuery::default() };
    assert_eq!(source.search(&query, 10).unwrap(), vec!["keyframes/L01_V001/0001.jpg".to_string()]);
}

#[test]
fn object_source_matches_labels_and_prompts() {
    let (_tmp, engine) = setup();
    let source = AnnotationSource::objects(engine);
    assert_eq!(source.name(), "grounding_dino");
    let persons = source.search(&SearchQuery::text("person"), 10).unwrap();
    assert_eq!(persons.len(), 2);
    let mic = source.search(&SearchQuery::text("mic"), 10).unwrap();
    assert_eq!(mic, vec!["keyframes/L01_V001/0002.jpg".to_string()]);
}

#[test]
fn top_k_caps_results() {
    let (_tmp, engine) = setup();
    let hits = engine.search_field(AnnotationField::Objects, "person", 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(matches!(engine.search_field(AnnotationField::Caption, "truck", 0), Err(Error::InvalidArgument(_))));
}

#[test]
fn huge_top_k_is_capped_at_index_size() {
    let (_tmp, engine) = setup();
    let num_docs = usize::try_from(engine.num_docs()).unwrap();
    let hits = engine.search_field(AnnotationField::Caption, "car", 1_000_000_000).unwrap();
    assert!(hits.len() <= num_docs);
    let source = AnnotationSource::objects(engine);
    let persons = source.search(&SearchQuery::text("person"), usize::MAX).unwrap();
    assert_eq!(persons.len(), 2);
}

#[test]
fn malformed_query_syntax_is_tolerated() {
    let (_tmp, engine) = setup();
    let source = AnnotationSource::caption(engine);
    let paths = source.search(&SearchQuery::text("boats AND (river"), 5).unwrap();
    assert_eq!(paths.first().map(String::as_str), Some("keyframes/L01_V002/0001.jpg"));
}

#[test]
fn absent_inputs_yield_empty_lists() {
    let (_tmp, engine) = setup();
    for source in AnnotationSource::all(engine) {
        assert!(source.search(&SearchQuery::default(), 10).unwrap().is_empty(), "{}", source.name());
        assert!(source.search(&SearchQuery::text("  "), 10).unwrap().is_empty(), "{}", source.name());
    }
}

#[test]
fn detection_catalog_filters_case_insensitively() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("annotations.json");
    std::fs::write(&file, ANNOTATIONS).unwrap();
    let catalog = DetectionCatalog::load(&file).unwrap();
    assert_eq!(catalog.len(), 4);
    assert!(catalog.matches_any("keyframes/L01_V002/0001.jpg", &["Boat".into()]));
    assert!(catalog.matches_any("keyframes/L01_V001/0002.jpg", &["car".into(), "MICROPHONE".into()]));
    assert!(!catalog.matches_any("keyframes/L01_V002/0002.jpg", &["boat".into()]));
}

#[test]
fn bad_annotation_files_fail_to_load() {
    let tmp = TempDir::new().unwrap();
    assert!(matches!(load_annotations(&tmp.path().join("missing.json")), Err(Error::IndexLoad { .. })));

    let file = tmp.path().join("bad.json");
    std::fs::write(&file, r#"[{"caption": "no path"}]"#).unwrap();
    assert!(matches!(load_annotations(&file), Err(Error::IndexLoad { .. })));

    std::fs::write(&file, r#"[{"path": "  "}]"#).unwrap();
    assert!(matches!(load_annotations(&file), Err(Error::IndexLoad { .. })));
}

#[test]
fn opening_a_missing_index_is_a_load_error() {
    let tmp = TempDir::new().unwrap();
    assert!(matches!(AnnotationSearchEngine::open(&tmp.path().join("nope")), Err(Error::IndexLoad { .. })));
}
