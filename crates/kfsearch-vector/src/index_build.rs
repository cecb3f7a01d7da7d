//! Offline build pipeline: discover keyframes, encode them, persist the index.
//!
//! Typical flow:
//! 1) `collect_keyframes` walks the keyframe tree in sorted order
//! 2) `build_mapping_json` fixes the id→path assignment shared by all models
//! 3) `build_from_mapping` encodes every keyframe with one model and writes
//!    that model's vector store next to the shared mapping

use std::path::Path;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use walkdir::WalkDir;

use kfsearch_core::traits::{EmbeddingModel, VectorIndex};
use kfsearch_core::types::{to_posix_path, ImageInput, IndexStats};
use kfsearch_core::{Error, Result};

use crate::flat::FlatIpIndex;
use crate::mapping;

pub const KEYFRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Image files under `root`, POSIX-style, sorted.
pub fn collect_keyframes(root: &Path) -> Vec<String> {
    let mut frames: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(root = %root.display(), error = %err, "skipping unreadable entry in keyframe tree");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| KEYFRAME_EXTENSIONS.iter().any(|k| ext.eq_ignore_ascii_case(k)))
        })
        .map(|e| to_posix_path(e.path()))
        .collect();
    frames.sort();
    frames
}

pub fn build_mapping_json(paths: &[String], output: &Path) -> Result<()> {
    mapping::write_mapping(output, paths)?;
    info!(total = paths.len(), path = %output.display(), "wrote id2path mapping");
    Ok(())
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} keyframes ({percent}%) {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Encode `paths` with `encoder` into a fresh index. Unreadable images are
/// skipped and logged.
pub fn build_index(encoder: &dyn EmbeddingModel, paths: &[String]) -> Result<FlatIpIndex> {
    let start = Instant::now();
    let pb = progress_bar(paths.len());
    let mut index = FlatIpIndex::new();
    let mut encode = |path: &str| {
        pb.inc(1);
        encoder.encode_image(&ImageInput::Path(path.into()))
    };
    let built = index.build(paths, &mut encode);
    pb.finish_and_clear();
    built?;
    info!(
        model = encoder.model_id(),
        rows = index.len(),
        elapsed_s = start.elapsed().as_secs_f32(),
        "index build finished"
    );
    Ok(index)
}

/// Build one model's vector store from an existing mapping file.
///
/// Every model shares the same id→path assignment, so any keyframe that fails
/// to encode aborts the build instead of shifting ids.
pub fn build_from_mapping(encoder: &dyn EmbeddingModel, mapping_path: &Path, vector_path: &Path) -> Result<IndexStats> {
    let paths = mapping::read_mapping(mapping_path)?;
    let index = build_index(encoder, &paths)?;
    if index.len() != paths.len() {
        return Err(Error::Build(format!(
            "{} of {} keyframes could not be encoded; the shared mapping would no longer line up",
            paths.len() - index.len(),
            paths.len()
        )));
    }
    index.save(vector_path, mapping_path)?;
    Ok(index.stats())
}

/// Discover, map and encode a keyframe directory in one step.
pub fn build_from_dir(
    encoder: &dyn EmbeddingModel,
    keyframes_dir: &Path,
    vector_path: &Path,
    mapping_path: &Path,
) -> Result<IndexStats> {
    let paths = collect_keyframes(keyframes_dir);
    info!(count = paths.len(), dir = %keyframes_dir.display(), "discovered keyframes");
    let index = build_index(encoder, &paths)?;
    index.save(vector_path, mapping_path)?;
    Ok(index.stats())
}
