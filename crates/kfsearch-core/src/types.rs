//! Domain types shared by the vector, text and fusion engines.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Unit-normalised embedding produced by an [`EmbeddingModel`](crate::traits::EmbeddingModel).
pub type EmbeddingVector = Vec<f32>;

/// Paths returned by one retrieval source for one query, best first.
pub type RankedList = Vec<String>;

/// Dense, zero-based row identifier inside one index snapshot.
pub type EntryId = u32;

/// One row of the id→path mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: EntryId,
    pub path: String,
}

/// A single vector search hit. Higher `score` is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub score: f32,
    pub id: EntryId,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub num_vectors: usize,
    pub dimension: usize,
}

/// A keyframe and its fused Reciprocal Rank Fusion score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub path: String,
    pub score: f64,
}

/// Image supplied as a query or as a build input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageInput {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Path(p) => p.as_os_str().is_empty(),
            Self::Bytes(b) => b.is_empty(),
        }
    }
}

/// The inputs of one search request that sources may react to.
///
/// Every source picks the modality it understands and returns an empty list
/// when that input is absent.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub image: Option<ImageInput>,
    pub ocr_text: Option<String>,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn image(image: ImageInput) -> Self {
        Self { image: Some(image), ..Self::default() }
    }

    /// Text query trimmed, or `None` when absent or blank.
    pub fn text_input(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
    }

    pub fn ocr_input(&self) -> Option<&str> {
        non_blank(self.ocr_text.as_deref())
    }

    pub fn image_input(&self) -> Option<&ImageInput> {
        self.image.as_ref().filter(|img| !img.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.text_input().is_none() && self.image_input().is_none() && self.ocr_input().is_none()
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Render a path with forward slashes regardless of host OS.
pub fn to_posix_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Last component of a POSIX or Windows style path.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).find(|s| !s.is_empty()).unwrap_or(path)
}
