use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kfsearch_core::config::{AnnotationSettings, ModelSpec, Settings};
use kfsearch_core::traits::{EncoderLoader, RetrievalSource};
use kfsearch_core::types::{ImageInput, RankedList, SearchQuery};
use kfsearch_core::{Error, Result};
use kfsearch_embed::CandleEncoderLoader;
use kfsearch_hybrid::{ModelRegistry, QueryOrchestrator, SearchOutcome, SearchRequest, SearchResponse, Snapshot};
use kfsearch_text::{load_annotations, AnnotationIndexer, DetectionCatalog};
use kfsearch_vector::index_build::{build_from_mapping, build_mapping_json, collect_keyframes};
use tempfile::TempDir;

struct StaticSource {
    name: &'static str,
    paths: Vec<&'static str>,
}

impl RetrievalSource for StaticSource {
    fn name(&self) -> &str { self.name }

    fn accepts(&self, query: &SearchQuery) -> bool { query.text_input().is_some() }

    fn search(&self, _query: &SearchQuery, top_k: usize) -> Result<RankedList> {
        Ok(self.paths.iter().take(top_k).map(|p| p.to_string()).collect())
    }
}

struct FailingSource;

impl RetrievalSource for FailingSource {
    fn name(&self) -> &str { "caption" }

    fn search(&self, _query: &SearchQuery, _top_k: usize) -> Result<RankedList> {
        Err(Error::source_unavailable("caption", "connection refused"))
    }
}

struct SlowSource;

impl RetrievalSource for SlowSource {
    fn name(&self) -> &str { "grounding_dino" }

    fn search(&self, _query: &SearchQuery, _top_k: usize) -> Result<RankedList> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(vec!["late.jpg".to_string()])
    }
}

fn loader() -> Arc<dyn EncoderLoader> {
    Arc::new(CandleEncoderLoader::new(true))
}

fn static_source(name: &'static str, paths: &[&'static str]) -> Arc<dyn RetrievalSource> {
    Arc::new(StaticSource { name, paths: paths.to_vec() })
}

fn orchestrator(snapshot: Snapshot) -> QueryOrchestrator {
    QueryOrchestrator::new(Arc::new(ModelRegistry::with_snapshot(loader(), snapshot)))
}

fn ranked(outcome: SearchOutcome) -> kfsearch_hybrid::RankedResults {
    match outcome {
        SearchOutcome::Ranked(r) => r,
        SearchOutcome::NoQuery => panic!("expected ranked results"),
    }
}

#[tokio::test]
async fn two_sources_fuse_with_rrf() {
    let snapshot = Snapshot::new(Settings::default())
        .with_auxiliary(static_source("A_text", &["x", "y", "z"]))
        .with_auxiliary(static_source("B_text", &["y", "x", "w"]));
    let outcome = orchestrator(snapshot).handle_search(&SearchRequest::text("a dog", &[])).await.unwrap();
    let ranked = ranked(outcome);

    let paths: Vec<&str> = ranked.results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["x", "y", "w", "z"]);
    assert!((ranked.results[0].score - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-12);
    assert!((ranked.results[3].score - 1.0 / 63.0).abs() < 1e-12);
    assert_eq!(ranked.sources, vec!["A_text", "B_text"]);
    assert!(ranked.degraded_sources.is_empty());
}

#[tokio::test]
async fn empty_request_returns_no_query() {
    let snapshot = Snapshot::new(Settings::default()).with_auxiliary(static_source("caption", &["x"]));
    let request = SearchRequest::default();
    let outcome = orchestrator(snapshot).handle_search(&request).await.unwrap();
    assert_eq!(outcome, SearchOutcome::NoQuery);
    assert!(outcome.results().is_empty());

    let response = SearchResponse::from_outcome(&request, &outcome, None);
    assert!(response.paths.is_empty());
    assert!(response.search_info.message.is_some());
}

#[tokio::test]
async fn failing_and_slow_sources_degrade() {
    let mut settings = Settings::default();
    settings.search.source_timeout_ms = 50;
    let snapshot = Snapshot::new(settings)
        .with_auxiliary(static_source("A_text", &["x", "y"]))
        .with_auxiliary(Arc::new(FailingSource))
        .with_auxiliary(Arc::new(SlowSource));
    let ranked = ranked(orchestrator(snapshot).handle_search(&SearchRequest::text("boat", &[])).await.unwrap());

    assert_eq!(ranked.results.iter().map(|r| r.path.as_str()).collect::<Vec<_>>(), vec!["x", "y"]);
    assert_eq!(ranked.degraded_sources, vec!["caption", "grounding_dino"]);
    assert_eq!(ranked.sources.len(), 3);
}

#[tokio::test]
async fn k_rrf_comes_from_settings() {
    let mut settings = Settings::default();
    settings.search.k_rrf = 0.0;
    let snapshot = Snapshot::new(settings).with_auxiliary(static_source("A_text", &["x", "y"]));
    let ranked = ranked(orchestrator(snapshot).handle_search(&SearchRequest::text("q", &[])).await.unwrap());
    assert_eq!(ranked.results[0].score, 1.0);
    assert_eq!(ranked.results[1].score, 0.5);
}

#[tokio::test]
async fn top_k_bounds_every_source_and_limit_truncates() {
    let snapshot = Snapshot::new(Settings::default())
        .with_auxiliary(static_source("A_text", &["a", "b", "c", "d"]))
        .with_auxiliary(static_source("B_text", &["e", "f", "g"]));
    let orch = orchestrator(snapshot);

    let request = SearchRequest { top_k: Some(2), ..SearchRequest::text("q", &[]) };
    let ranked_two = ranked(orch.handle_search(&request).await.unwrap());
    let mut paths: Vec<_> = ranked_two.results.iter().map(|r| r.path.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec!["a", "b", "e", "f"]);

    let request = SearchRequest { result_limit: Some(3), ..SearchRequest::text("q", &[]) };
    assert_eq!(ranked(orch.handle_search(&request).await.unwrap()).results.len(), 3);

    for bad in [SearchRequest { top_k: Some(0), ..SearchRequest::text("q", &[]) }, SearchRequest {
        result_limit: Some(0),
        ..SearchRequest::text("q", &[])
    }] {
        assert!(matches!(orch.handle_search(&bad).await, Err(Error::InvalidArgument(_))));
    }
}

#[tokio::test]
async fn object_filters_narrow_after_fusion() {
    let catalog = DetectionCatalog::from_annotations(
        &serde_json::from_str::<Vec<kfsearch_text::KeyframeAnnotation>>(
            r#"[{"path": "x", "objects": [{"label": "car"}]}, {"path": "z", "objects": [{"label": "Car"}, {"label": "person"}]}]"#,
        )
        .unwrap(),
    );
    let base = || {
        Snapshot::new(Settings::default())
            .with_auxiliary(static_source("A_text", &["y", "x", "z"]))
            .with_auxiliary(static_source("B_text", &["z", "y"]))
    };
    let request = SearchRequest { object_filters: vec!["CAR".into()], ..SearchRequest::text("street", &[]) };

    let filtered = ranked(orchestrator(base().with_catalog(Arc::new(catalog))).handle_search(&request).await.unwrap());
    assert_eq!(filtered.results.iter().map(|r| r.path.as_str()).collect::<Vec<_>>(), vec!["z", "x"]);
    assert!(!filtered.filters_skipped);

    let unfiltered = ranked(orchestrator(base()).handle_search(&request).await.unwrap());
    assert_eq!(unfiltered.results.len(), 3);
    assert!(unfiltered.filters_skipped);
}

// On-disk fixture: two models sharing one mapping, one broken model, and an
// annotation index.
struct Fixture {
    _tmp: TempDir,
    settings: Settings,
    frames: Vec<String>,
}

fn model_spec(vector_path: PathBuf, mapping_path: PathBuf, dimension: usize) -> ModelSpec {
    ModelSpec {
        backbone: None,
        pretrained: None,
        vector_path,
        mapping_path,
        dimension,
        model_dir: None,
        image_size: 224,
    }
}

fn write_keyframes(root: &Path) {
    for (i, dir) in ["L01_V001", "L01_V001", "L01_V002", "L02_V001", "L02_V001"].iter().enumerate() {
        let d = root.join(dir);
        std::fs::create_dir_all(&d).unwrap();
        std::fs::write(d.join(format!("{:04}.jpg", i)), vec![i as u8 + 1; 256 + i * 17]).unwrap();
    }
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let keyframes = tmp.path().join("keyframes");
    write_keyframes(&keyframes);
    let frames = collect_keyframes(&keyframes);
    let mapping = tmp.path().join("db/id2path.json");
    build_mapping_json(&frames, &mapping).unwrap();

    let loader = CandleEncoderLoader::new(true);
    let clip = model_spec(tmp.path().join("db/clip.kfv"), mapping.clone(), 32);
    let openclip = model_spec(tmp.path().join("db/openclip.kfv"), mapping.clone(), 48);
    build_from_mapping(loader.load("clip", &clip).unwrap().as_ref(), &mapping, &clip.vector_path).unwrap();
    build_from_mapping(loader.load("openclip", &openclip).unwrap().as_ref(), &mapping, &openclip.vector_path).unwrap();

    let annotations_path = tmp.path().join("annotations.json");
    let annotations = serde_json::json!([
        {"path": frames[0], "caption": "a red car on the street", "objects": [{"label": "car"}]},
        {"path": frames[3], "caption": "a crowd watching fireworks", "objects": [{"label": "person"}]},
    ]);
    std::fs::write(&annotations_path, annotations.to_string()).unwrap();
    let index_dir = tmp.path().join("db/annotations");
    AnnotationIndexer::create_in_dir(&index_dir)
        .unwrap()
        .index(&load_annotations(&annotations_path).unwrap())
        .unwrap();

    let mut settings = Settings::default();
    settings.models.insert("clip".into(), clip);
    settings.models.insert("openclip".into(), openclip);
    settings
        .models
        .insert("siglip".into(), model_spec(tmp.path().join("db/siglip.kfv"), mapping.clone(), 64));
    settings.annotations = AnnotationSettings { text_index_dir: Some(index_dir), detections_path: Some(annotations_path) };
    settings.paths.database_dir = Some(tmp.path().to_path_buf());
    Fixture { _tmp: tmp, settings, frames }
}

#[tokio::test]
async fn registry_loads_what_it_can() {
    let fx = fixture();
    let registry = ModelRegistry::init(fx.settings.clone(), loader());
    assert_eq!(registry.available_models(), vec!["clip", "openclip"]);
    let unavailable = registry.unavailable_models();
    assert!(unavailable.contains_key("siglip"), "{unavailable:?}");

    let orch = QueryOrchestrator::new(Arc::new(registry));
    let err = orch.handle_search(&SearchRequest::text("car", &["clip", "siglip"])).await.unwrap_err();
    match err {
        Error::ModelUnavailable { requested, available } => {
            assert_eq!(requested, "siglip");
            assert_eq!(available, vec!["clip", "openclip"]);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn text_query_uses_models_and_annotation_sources() {
    let fx = fixture();
    let orch = QueryOrchestrator::new(Arc::new(ModelRegistry::init(fx.settings.clone(), loader())));
    let request = SearchRequest::text("red car", &["clip", "openclip"]);
    let outcome = orch.handle_search(&request).await.unwrap();
    let results = ranked(outcome.clone());

    assert_eq!(results.sources, vec!["clip_text", "openclip_text", "caption", "grounding_dino"]);
    assert!(results.degraded_sources.is_empty());
    assert_eq!(results.results.len(), fx.frames.len());
    assert!(results.results.iter().all(|r| fx.frames.contains(&r.path)));
    assert!(results.results.windows(2).all(|w| w[0].score >= w[1].score));

    let response = SearchResponse::from_outcome(&request, &outcome, fx.settings.paths.database_dir.as_deref());
    assert!(response.paths.iter().all(|p| p.starts_with("/keyframes/")));
    assert_eq!(response.search_info.models_used, vec!["clip", "openclip"]);
}

#[tokio::test]
async fn image_query_ranks_the_same_keyframe_first() {
    let fx = fixture();
    let orch = QueryOrchestrator::new(Arc::new(ModelRegistry::init(fx.settings.clone(), loader())));
    let target = fx.frames[2].clone();
    let request = SearchRequest {
        query: SearchQuery::image(ImageInput::Path(PathBuf::from(&target))),
        models: vec!["clip".into(), "openclip".into()],
        ..SearchRequest::default()
    };
    let results = ranked(orch.handle_search(&request).await.unwrap());
    assert_eq!(results.sources, vec!["clip_image", "openclip_image"]);
    assert_eq!(results.results[0].path, target);
    assert!((results.results[0].score - 2.0 / 61.0).abs() < 1e-12);
}

#[tokio::test]
async fn catalog_from_settings_filters_results() {
    let fx = fixture();
    let orch = QueryOrchestrator::new(Arc::new(ModelRegistry::init(fx.settings.clone(), loader())));
    let request = SearchRequest { object_filters: vec!["person".into()], ..SearchRequest::text("fireworks", &["clip"]) };
    let results = ranked(orch.handle_search(&request).await.unwrap());
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].path, fx.frames[3]);
}

#[tokio::test]
async fn reload_swaps_snapshot_without_disturbing_readers() {
    let fx = fixture();
    let registry = Arc::new(ModelRegistry::init(fx.settings.clone(), loader()));
    let before = registry.snapshot().unwrap();

    let mut narrowed = fx.settings.clone();
    narrowed.models.remove("openclip");
    let after = registry.reload_with(narrowed).unwrap();

    assert!(before.model("openclip").is_some());
    assert!(after.model("openclip").is_none());
    assert_eq!(registry.available_models(), vec!["clip"]);

    let mut invalid = fx.settings.clone();
    invalid.search.k_rrf = -1.0;
    assert!(matches!(registry.reload_with(invalid), Err(Error::InvalidConfig(_))));
    assert_eq!(registry.available_models(), vec!["clip"]);

    let reloaded = registry.reload().unwrap();
    assert_eq!(reloaded.available_models(), vec!["clip"]);

    registry.shutdown();
    assert!(registry.snapshot().is_err());
    assert!(registry.available_models().is_empty());
    let orch = QueryOrchestrator::new(registry);
    assert!(orch.handle_search(&SearchRequest::text("car", &["clip"])).await.is_err());
}
