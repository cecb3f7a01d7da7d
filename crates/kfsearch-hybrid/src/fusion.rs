// Reciprocal Rank Fusion (RRF)

use std::collections::{HashMap, HashSet};

use kfsearch_core::types::{FusedResult, RankedList};
use kfsearch_core::{Error, Result};

/// Fuse named ranked lists into one ranking.
///
/// RRF_score(p) = sum over lists l containing p of 1 / (k_rrf + rank_l(p)),
/// with 1-based ranks. A path repeated inside one list counts only at its
/// best rank. The output is the full fused list sorted by descending score,
/// ties by ascending path; truncation is left to the caller.
pub fn fuse<'a, I, S>(named_lists: I, k_rrf: f64) -> Result<Vec<FusedResult>>
where
    I: IntoIterator<Item = (S, &'a RankedList)>,
    S: AsRef<str>,
{
    if !k_rrf.is_finite() || k_rrf < 0.0 {
        return Err(Error::InvalidArgument(format!("k_rrf must be a finite number >= 0, got {}", k_rrf)));
    }

    // Per-path contributions, summed in a canonical order so the result does
    // not depend on the iteration order of `named_lists`.
    let mut contributions: HashMap<&'a str, Vec<f64>> = HashMap::new();
    for (_name, list) in named_lists {
        let mut seen: HashSet<&str> = HashSet::with_capacity(list.len());
        for (rank, path) in list.iter().enumerate() {
            if !seen.insert(path.as_str()) {
                continue;
            }
            let rank_position = (rank + 1) as f64;
            contributions.entry(path.as_str()).or_default().push(1.0 / (k_rrf + rank_position));
        }
    }

    let mut fused: Vec<FusedResult> = contributions
        .into_iter()
        .map(|(path, mut parts)| {
            parts.sort_by(|a, b| b.total_cmp(a));
            FusedResult { path: path.to_string(), score: parts.iter().sum() }
        })
        .collect();
    fused.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    Ok(fused)
}
