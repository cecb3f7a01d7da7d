//! Id→path mapping document.
//!
//! Canonical form: `{"total": N, "items": [{"id": 0, "path": "..."}, ...]}`.
//! The older integer-keyed dictionary (`{"0": "...", "1": "..."}`) is still
//! accepted on read. Items may appear in any order but ids must cover
//! `0..total` exactly once.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use kfsearch_core::types::{to_posix_path, EntryId, IndexEntry};
use kfsearch_core::{Error, Result};

use crate::store::write_atomic;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingFile {
    pub total: usize,
    pub items: Vec<IndexEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MappingDocument {
    Structured(MappingFile),
    Legacy(BTreeMap<String, String>),
}

impl MappingFile {
    pub fn from_paths(paths: &[String]) -> Result<Self> {
        let items = paths
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let id = EntryId::try_from(i)
                    .map_err(|_| Error::Operation(format!("id {} does not fit in u32", i)))?;
                Ok(IndexEntry { id, path: to_posix_path(Path::new(p)) })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { total: items.len(), items })
    }

    /// Paths ordered by id, after checking the ids are dense and unique.
    pub fn into_paths(self) -> std::result::Result<Vec<String>, String> {
        if self.items.len() != self.total {
            return Err(format!("total is {} but {} items are listed", self.total, self.items.len()));
        }
        let mut slots: Vec<Option<String>> = vec![None; self.total];
        for item in self.items {
            let slot = slots
                .get_mut(item.id as usize)
                .ok_or_else(|| format!("id {} is outside 0..{}", item.id, self.total))?;
            if slot.is_some() {
                return Err(format!("id {} is listed twice", item.id));
            }
            *slot = Some(item.path);
        }
        // items.len() == total and no duplicates, so every slot is filled
        Ok(slots.into_iter().flatten().collect())
    }
}

pub fn write_mapping(path: &Path, paths: &[String]) -> Result<()> {
    let doc = MappingFile::from_paths(paths)?;
    let json = serde_json::to_vec_pretty(&doc).map_err(|e| Error::Operation(e.to_string()))?;
    write_atomic(path, &json)
}

pub fn read_mapping(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).map_err(|e| Error::index_load(path, e))?;
    let doc: MappingDocument =
        serde_json::from_slice(&bytes).map_err(|e| Error::index_load(path, format!("malformed mapping: {}", e)))?;
    let file = match doc {
        MappingDocument::Structured(file) => file,
        MappingDocument::Legacy(map) => legacy_to_structured(map).map_err(|reason| Error::index_load(path, reason))?,
    };
    file.into_paths().map_err(|reason| Error::index_load(path, reason))
}

fn legacy_to_structured(map: BTreeMap<String, String>) -> std::result::Result<MappingFile, String> {
    let items = map
        .into_iter()
        .map(|(k, path)| {
            k.parse::<EntryId>()
                .map(|id| IndexEntry { id, path: path.replace('\\', "/") })
                .map_err(|_| format!("key '{}' is not an integer id", k))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(MappingFile { total: items.len(), items })
}
