use std::cmp::Ordering;
use std::path::Path;

use tracing::{debug, info, warn};

use kfsearch_core::traits::VectorIndex;
use kfsearch_core::types::{inner_product, EmbeddingVector, EntryId, IndexStats, ScoredEntry};
use kfsearch_core::{Error, Result};

use crate::{mapping, store};

/// Exact inner-product index over an in-memory `N × D` matrix.
///
/// Row `i` of the matrix is entry id `i`; `paths[i]` is its keyframe.
#[derive(Debug, Clone, Default)]
pub struct FlatIpIndex {
    dim: usize,
    vectors: Vec<f32>,
    paths: Vec<String>,
}

impl FlatIpIndex {
    pub fn new() -> Self { Self::default() }

    pub fn from_parts(dim: usize, vectors: Vec<f32>, paths: Vec<String>) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Build("dimension must be > 0".into()));
        }
        if vectors.len() != dim * paths.len() {
            return Err(Error::Build(format!(
                "{} floats do not form {} rows of dimension {}",
                vectors.len(),
                paths.len(),
                dim
            )));
        }
        if EntryId::try_from(paths.len()).is_err() {
            return Err(Error::Build(format!("{} rows exceed the id space", paths.len())));
        }
        Ok(Self { dim, vectors, paths })
    }

    /// Load a snapshot from its two companion files.
    pub fn open(vector_path: &Path, mapping_path: &Path) -> Result<Self> {
        let mut index = Self::new();
        index.load(vector_path, mapping_path)?;
        Ok(index)
    }

    pub fn len(&self) -> usize { self.paths.len() }

    pub fn is_empty(&self) -> bool { self.paths.is_empty() }

    pub fn dim(&self) -> usize { self.dim }

    pub fn path(&self, id: EntryId) -> Option<&str> {
        self.paths.get(id as usize).map(String::as_str)
    }

    pub fn paths(&self) -> &[String] { &self.paths }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.chunks_exact(self.dim.max(1))
    }
}

fn best_first(a: &(f32, EntryId), b: &(f32, EntryId)) -> Ordering {
    b.0.total_cmp(&a.0).then(a.1.cmp(&b.1))
}

impl VectorIndex for FlatIpIndex {
    fn build(
        &mut self,
        paths: &[String],
        encode: &mut dyn FnMut(&str) -> Result<EmbeddingVector>,
    ) -> Result<()> {
        if paths.is_empty() {
            return Err(Error::Build("no keyframe paths to index".into()));
        }
        let mut dim: Option<usize> = None;
        let mut vectors = Vec::new();
        let mut kept = Vec::with_capacity(paths.len());
        let mut skipped = 0usize;

        for path in paths {
            let v = match encode(path) {
                Ok(v) => v,
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping keyframe that could not be encoded");
                    skipped += 1;
                    continue;
                }
            };
            match dim {
                None if v.is_empty() => return Err(Error::Build(format!("empty embedding for {}", path))),
                None => dim = Some(v.len()),
                Some(d) if d != v.len() => {
                    return Err(Error::Build(format!(
                        "inconsistent embedding dimension: {} has {}, expected {}",
                        path,
                        v.len(),
                        d
                    )))
                }
                Some(_) => {}
            }
            vectors.extend_from_slice(&v);
            kept.push(path.clone());
        }

        let Some(dim) = dim else {
            return Err(Error::Build(format!("none of the {} keyframes could be encoded", skipped)));
        };
        *self = Self::from_parts(dim, vectors, kept)?;
        info!(rows = self.len(), dim, skipped, "built flat inner-product index");
        Ok(())
    }

    fn save(&self, vector_path: &Path, mapping_path: &Path) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Operation("refusing to save an empty index".into()));
        }
        store::write(vector_path, self.dim, &self.vectors)?;
        mapping::write_mapping(mapping_path, &self.paths)?;
        debug!(vectors = %vector_path.display(), mapping = %mapping_path.display(), rows = self.len(), "saved index");
        Ok(())
    }

    fn load(&mut self, vector_path: &Path, mapping_path: &Path) -> Result<()> {
        for p in [vector_path, mapping_path] {
            if !p.exists() {
                return Err(Error::index_load(p, "file does not exist"));
            }
        }
        let stored = store::read(vector_path)?;
        let paths = mapping::read_mapping(mapping_path)?;
        if stored.count != paths.len() {
            return Err(Error::index_load(
                mapping_path,
                format!(
                    "mapping total {} does not match {} vectors in {}",
                    paths.len(),
                    stored.count,
                    vector_path.display()
                ),
            ));
        }
        *self = Self::from_parts(stored.dim, stored.data, paths)
            .map_err(|e| Error::index_load(vector_path, e))?;
        info!(rows = self.len(), dim = self.dim, path = %vector_path.display(), "loaded index");
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>> {
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be a positive integer".into()));
        }
        if self.dim == 0 {
            return Err(Error::Operation("index has not been built or loaded".into()));
        }
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidArgument("query vector contains non-finite values".into()));
        }

        let mut scored: Vec<(f32, EntryId)> = self
            .rows()
            .zip(0..)
            .map(|(row, id)| (inner_product(query, row), id))
            .collect();
        let k = top_k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, best_first);
            scored.truncate(k);
        }
        scored.sort_unstable_by(best_first);

        Ok(scored
            .into_iter()
            .map(|(score, id)| ScoredEntry { score, id, path: self.paths[id as usize].clone() })
            .collect())
    }

    fn stats(&self) -> IndexStats {
        IndexStats { num_vectors: self.len(), dimension: self.dim }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(rows: &[[f32; 2]]) -> FlatIpIndex {
        let vectors = rows.iter().flatten().copied().collect();
        let paths = (0..rows.len()).map(|i| format!("kf/{i:03}.jpg")).collect();
        FlatIpIndex::from_parts(2, vectors, paths).unwrap()
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let idx = index(&[[0.0, 1.0], [1.0, 0.0], [0.0, 1.0], [1.0, 0.0]]);
        let hits = idx.search(&[1.0, 0.0], 4).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 3, 0, 2]);
    }

    #[test]
    fn partial_selection_keeps_tie_order() {
        let idx = index(&[[0.5, 0.5], [0.5, 0.5], [0.5, 0.5], [0.1, 0.0]]);
        let hits = idx.search(&[1.0, 1.0], 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn unloaded_index_cannot_be_searched() {
        assert!(matches!(FlatIpIndex::new().search(&[1.0], 1), Err(Error::Operation(_))));
    }

    #[test]
    fn non_finite_query_is_rejected() {
        let idx = index(&[[1.0, 0.0]]);
        assert!(matches!(idx.search(&[f32::NAN, 0.0], 1), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn from_parts_checks_shape() {
        assert!(FlatIpIndex::from_parts(2, vec![1.0, 2.0, 3.0], vec!["a".into(), "b".into()]).is_err());
    }
}
