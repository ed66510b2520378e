//! Partitioned in-memory vector indexes.
//!
//! An [`IndexSet`] is one immutable build of the corpus: a global
//! [`VectorIndex`] over every chunk plus one partition per distinct team
//! and per distinct quarter. Partitions share the global entries through
//! `Arc`, so every chunk is embedded exactly once per build no matter how
//! many partitions it appears in.
//!
//! Search is exact: brute-force cosine similarity over the entries of the
//! chosen index, which is plenty for an OKR corpus of a few thousand
//! chunks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::chunk::{chunk_document, TextSplitter};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{OkrError, Result};
use crate::models::{Chunk, Document};

/// A chunk and its embedding vector.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk returned from a similarity search.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// A nearest-neighbour searchable collection of embedded chunks.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<Arc<IndexEntry>>,
}

impl VectorIndex {
    pub fn new(entries: Vec<Arc<IndexEntry>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Arc<IndexEntry>] {
        &self.entries
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Return up to `limit` chunks ordered by descending cosine similarity.
    ///
    /// Equal scores keep insertion order, so results are deterministic for
    /// a given build.
    pub fn search(&self, query: &[f32], limit: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: &e.chunk,
                score: cosine_similarity(query, &e.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        scored
    }
}

/// All indexes produced by one build.
#[derive(Debug, Clone, Default)]
pub struct IndexSet {
    pub global: VectorIndex,
    pub by_team: BTreeMap<String, VectorIndex>,
    pub by_quarter: BTreeMap<String, VectorIndex>,
    /// Every non-empty team declared by a document, sorted.
    pub teams: BTreeSet<String>,
    /// Every non-empty quarter declared by a document, sorted.
    pub quarters: BTreeSet<String>,
}

impl IndexSet {
    /// Chunk and embed `documents`, then build the global and partition
    /// indexes.
    ///
    /// All chunk texts go to the provider in a single
    /// [`embed_batch`](EmbeddingProvider::embed_batch) call. If the
    /// provider fails, nothing is returned and the caller keeps whatever
    /// index it already had.
    pub async fn build(
        documents: &[Document],
        splitter: &TextSplitter,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let mut teams = BTreeSet::new();
        let mut quarters = BTreeSet::new();
        let mut chunks = Vec::new();

        for doc in documents {
            if !doc.metadata.team.is_empty() {
                teams.insert(doc.metadata.team.clone());
            }
            if !doc.metadata.quarter.is_empty() {
                quarters.insert(doc.metadata.quarter.clone());
            }
            chunks.extend(chunk_document(doc, splitter));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            provider.embed_batch(&texts).await?
        };

        if vectors.len() != chunks.len() {
            return Err(OkrError::embedding(
                provider.model_name(),
                format!(
                    "expected {} vectors, got {}",
                    chunks.len(),
                    vectors.len()
                ),
            ));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        let set = Self::from_entries(entries, teams, quarters);
        tracing::info!(
            documents = documents.len(),
            chunks = set.global.len(),
            teams = set.by_team.len(),
            quarters = set.by_quarter.len(),
            "built indexes"
        );
        Ok(set)
    }

    /// Partition already embedded entries.
    ///
    /// A team or quarter in `teams`/`quarters` that owns no entry gets no
    /// partition; it stays in the known-value sets so filter resolution
    /// still recognizes it.
    pub fn from_entries(
        entries: Vec<IndexEntry>,
        teams: BTreeSet<String>,
        quarters: BTreeSet<String>,
    ) -> Self {
        let entries: Vec<Arc<IndexEntry>> = entries.into_iter().map(Arc::new).collect();

        let mut team_groups: BTreeMap<String, Vec<Arc<IndexEntry>>> = BTreeMap::new();
        let mut quarter_groups: BTreeMap<String, Vec<Arc<IndexEntry>>> = BTreeMap::new();

        for entry in &entries {
            let meta = &entry.chunk.metadata;
            if teams.contains(&meta.team) {
                team_groups
                    .entry(meta.team.clone())
                    .or_default()
                    .push(Arc::clone(entry));
            }
            if quarters.contains(&meta.quarter) {
                quarter_groups
                    .entry(meta.quarter.clone())
                    .or_default()
                    .push(Arc::clone(entry));
            }
        }

        Self {
            global: VectorIndex::new(entries),
            by_team: into_indexes(team_groups),
            by_quarter: into_indexes(quarter_groups),
            teams,
            quarters,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.global.len()
    }
}

fn into_indexes(groups: BTreeMap<String, Vec<Arc<IndexEntry>>>) -> BTreeMap<String, VectorIndex> {
    groups
        .into_iter()
        .filter(|(_, entries)| !entries.is_empty())
        .map(|(key, entries)| (key, VectorIndex::new(entries)))
        .collect()
}
