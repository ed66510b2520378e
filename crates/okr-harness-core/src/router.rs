//! Index routing and filtered retrieval.
//!
//! # Routing
//!
//! 1. `team` set and a team partition exists → team index.
//! 2. else `quarter` set and a quarter partition exists → quarter index.
//! 3. else → global index.
//!
//! Team wins over quarter when both partitions exist; the quarter is then
//! enforced by post-filtering.
//!
//! # Retrieval
//!
//! The chosen index is searched for `max(2k, k)` candidates. Candidates are
//! post-filtered on every filter field the partition does not already
//! guarantee, then truncated to `k`. If post-filtering removes every
//! candidate, the first `k` unfiltered candidates are returned instead: a
//! filter value with no match still shows the closest passages rather than
//! nothing.

use crate::index::{IndexSet, VectorIndex};
use crate::models::{Chunk, FilterSet, Scope};

/// Candidates fetched per requested result before post-filtering.
pub const OVERFETCH_FACTOR: usize = 2;

/// Select the most selective index for `filters`.
pub fn route<'a>(filters: &FilterSet, indexes: &'a IndexSet) -> (&'a VectorIndex, Scope) {
    if let Some(index) = filters.team.as_ref().and_then(|t| indexes.by_team.get(t)) {
        return (index, Scope::Team);
    }
    if let Some(index) = filters
        .quarter
        .as_ref()
        .and_then(|q| indexes.by_quarter.get(q))
    {
        return (index, Scope::Quarter);
    }
    (&indexes.global, Scope::Global)
}

/// Over-fetch from `index`, post-filter, and fall back to unfiltered
/// candidates when nothing survives.
pub fn search(
    query_vec: &[f32],
    index: &VectorIndex,
    scope: Scope,
    filters: &FilterSet,
    k: usize,
) -> Vec<Chunk> {
    let fetch = k.saturating_mul(OVERFETCH_FACTOR).max(k);
    let candidates = index.search(query_vec, fetch);

    let check_team = match scope {
        Scope::Team => None,
        _ => filters.team.as_deref(),
    };
    let check_quarter = match scope {
        Scope::Quarter => None,
        _ => filters.quarter.as_deref(),
    };

    let filtered: Vec<Chunk> = candidates
        .iter()
        .filter(|c| check_team.map_or(true, |t| c.chunk.metadata.team == t))
        .filter(|c| check_quarter.map_or(true, |q| c.chunk.metadata.quarter == q))
        .take(k)
        .map(|c| c.chunk.clone())
        .collect();

    tracing::debug!(
        scope = %scope,
        candidates = candidates.len(),
        kept = filtered.len(),
        "post-filtered candidates"
    );

    if filtered.is_empty() && !candidates.is_empty() {
        tracing::debug!(scope = %scope, "no candidate matched filters; using unfiltered results");
        return candidates.iter().take(k).map(|c| c.chunk.clone()).collect();
    }

    filtered
}

/// Route and search in one step.
pub fn retrieve(indexes: &IndexSet, filters: &FilterSet, query_vec: &[f32], k: usize) -> Vec<Chunk> {
    let (index, scope) = route(filters, indexes);
    search(query_vec, index, scope, filters, k)
}
