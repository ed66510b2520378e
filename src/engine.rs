//! The OKR engine: index lifecycle plus the search, ask and download
//! operations that every surface (CLI, HTTP) calls into.
//!
//! # Index lifecycle
//!
//! The engine holds at most one [`Snapshot`] behind an async `RwLock`. A
//! build loads and embeds the whole corpus without touching the lock, then
//! swaps the new `Arc<Snapshot>` in under a short write lock. Readers clone
//! the `Arc` and never observe a half-built index. Builds are serialized by
//! a mutex; the first query on an unbuilt engine triggers a build and
//! waits for it. A failed build leaves the previous snapshot in place.

use std::collections::{BTreeSet, HashSet};
use std::io::{Cursor, Write};
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use okr_harness_core::chunk::TextSplitter;
use okr_harness_core::embedding::EmbeddingProvider;
use okr_harness_core::error::{OkrError, Result};
use okr_harness_core::filter::{normalize_quarter, normalize_team, resolve_filters};
use okr_harness_core::index::IndexSet;
use okr_harness_core::models::{snippet, AskResponse, BuildResult, Chunk, FilterSet, Hit};
use okr_harness_core::rank::{citations, extract_and_rank};
use okr_harness_core::router::retrieve;
use okr_harness_core::source::DocumentSource;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::loader::MarkdownSource;

/// Search snippet length, in characters.
pub const SEARCH_SNIPPET_CHARS: usize = 400;
/// CSV snippet length, in characters.
pub const CSV_SNIPPET_CHARS: usize = 1000;

/// One immutable build of the corpus.
#[derive(Debug)]
pub struct Snapshot {
    pub indexes: IndexSet,
    pub document_count: usize,
    /// Every `(team, quarter)` pair declared by a document.
    pub pairs: BTreeSet<(String, String)>,
}

/// Liveness report.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub documents: usize,
}

/// Archive format for [`OkrEngine::download`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFormat {
    Zip,
    Csv,
}

impl FromStr for DownloadFormat {
    type Err = OkrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zip" => Ok(Self::Zip),
            "csv" => Ok(Self::Csv),
            other => Err(OkrError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A packaged download.
#[derive(Debug, Clone)]
pub struct DownloadPayload {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: &'static str,
}

pub struct OkrEngine {
    source: Arc<dyn DocumentSource>,
    provider: Arc<dyn EmbeddingProvider>,
    splitter: TextSplitter,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    build_lock: Mutex<()>,
}

impl OkrEngine {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        provider: Arc<dyn EmbeddingProvider>,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            source,
            provider,
            splitter,
            snapshot: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    /// Wire the Markdown loader and the configured embedding provider.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = MarkdownSource::new(&config.corpus)?;
        let provider = create_provider(&config.embedding)?;
        let splitter = TextSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap);
        Ok(Self::new(Arc::new(source), provider, splitter))
    }

    /// Load, chunk and embed the corpus, then publish the new indexes.
    pub async fn build_index(&self) -> Result<BuildResult> {
        let _guard = self.build_lock.lock().await;
        let (_, result) = self.build_locked().await?;
        Ok(result)
    }

    /// Explicit rebuild. Same as [`build_index`](Self::build_index).
    pub async fn refresh(&self) -> Result<BuildResult> {
        self.build_index().await
    }

    /// Must be called with `build_lock` held.
    async fn build_locked(&self) -> Result<(Arc<Snapshot>, BuildResult)> {
        match self.build_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let result = BuildResult {
                    document_count: snapshot.document_count,
                    chunk_count: snapshot.indexes.chunk_count(),
                    teams: snapshot.indexes.teams.iter().cloned().collect(),
                    quarters: snapshot.indexes.quarters.iter().cloned().collect(),
                };
                *self.snapshot.write().await = Some(Arc::clone(&snapshot));
                Ok((snapshot, result))
            }
            Err(e) => {
                tracing::warn!(error = %e, "index build failed; keeping previous index");
                Err(e)
            }
        }
    }

    async fn build_snapshot(&self) -> Result<Snapshot> {
        let source = Arc::clone(&self.source);
        let documents = tokio::task::spawn_blocking(move || source.list_documents())
            .await
            .map_err(|e| OkrError::corpus_read("corpus", e))??;

        let pairs = documents
            .iter()
            .map(|d| (d.metadata.team.clone(), d.metadata.quarter.clone()))
            .collect();

        let indexes = IndexSet::build(&documents, &self.splitter, self.provider.as_ref()).await?;

        Ok(Snapshot {
            indexes,
            document_count: documents.len(),
            pairs,
        })
    }

    /// The current snapshot, building the first one if needed.
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let _guard = self.build_lock.lock().await;
        // Another task may have finished the build while we waited.
        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            return Ok(Arc::clone(snapshot));
        }
        let (snapshot, _) = self.build_locked().await?;
        Ok(snapshot)
    }

    pub async fn health(&self) -> Result<Health> {
        let snapshot = self.snapshot().await?;
        Ok(Health {
            status: "ok",
            documents: snapshot.document_count,
        })
    }

    /// Resolve filters, embed the query and retrieve up to `k` chunks.
    async fn retrieve_chunks(
        &self,
        query: &str,
        k: usize,
        team: Option<&str>,
        quarter: Option<&str>,
    ) -> Result<(FilterSet, Vec<Chunk>, Vec<f32>)> {
        let snapshot = self.snapshot().await?;
        let indexes = &snapshot.indexes;
        let filters = resolve_filters(query, team, quarter, &indexes.teams, &indexes.quarters);

        if indexes.global.is_empty() || k == 0 {
            return Ok((filters, Vec::new(), Vec::new()));
        }

        let query_vec = self.provider.embed(query).await?;
        let chunks = retrieve(indexes, &filters, &query_vec, k);
        tracing::debug!(
            team = filters.team.as_deref().unwrap_or(""),
            quarter = filters.quarter.as_deref().unwrap_or(""),
            results = chunks.len(),
            "retrieved chunks"
        );
        Ok((filters, chunks, query_vec))
    }

    pub async fn search(
        &self,
        query: &str,
        k: usize,
        team: Option<&str>,
        quarter: Option<&str>,
    ) -> Result<Vec<Hit>> {
        let (_, chunks, _) = self.retrieve_chunks(query, k, team, quarter).await?;
        Ok(chunks
            .iter()
            .map(|c| Hit {
                path: c.path().to_string(),
                snippet: snippet(&c.text, SEARCH_SNIPPET_CHARS),
            })
            .collect())
    }

    pub async fn ask(
        &self,
        query: &str,
        k: usize,
        team: Option<&str>,
        quarter: Option<&str>,
    ) -> Result<AskResponse> {
        let (filters, chunks, query_vec) = self.retrieve_chunks(query, k, team, quarter).await?;

        let ranked = if chunks.is_empty() {
            Vec::new()
        } else {
            extract_and_rank(query, &query_vec, &chunks, self.provider.as_ref()).await?
        };

        Ok(AskResponse {
            query: query.to_string(),
            bullets: ranked.into_iter().map(|r| r.sentence).collect(),
            citations: citations(&chunks),
            team: filters.team,
            quarter: filters.quarter,
        })
    }

    pub async fn download(
        &self,
        query: &str,
        k: usize,
        format: &str,
        team: Option<&str>,
        quarter: Option<&str>,
    ) -> Result<DownloadPayload> {
        let format = DownloadFormat::from_str(format)?;
        let (_, chunks, _) = self.retrieve_chunks(query, k, team, quarter).await?;

        match format {
            DownloadFormat::Csv => Ok(DownloadPayload {
                bytes: render_csv(&chunks).into_bytes(),
                content_type: "text/csv",
                filename: "okrs.csv",
            }),
            DownloadFormat::Zip => Ok(DownloadPayload {
                bytes: self.render_zip(&chunks).await?,
                content_type: "application/zip",
                filename: "okrs.zip",
            }),
        }
    }

    /// Reads source files, so the packaging runs on the blocking pool.
    async fn render_zip(&self, chunks: &[Chunk]) -> Result<Vec<u8>> {
        let source = Arc::clone(&self.source);
        let paths: Vec<String> = chunks.iter().map(|c| c.path().to_string()).collect();
        tokio::task::spawn_blocking(move || package_zip(source.as_ref(), &paths))
            .await
            .map_err(zip_error)?
    }

    /// Distinct teams, optionally only those with a document in `quarter`.
    pub async fn teams(&self, quarter: Option<&str>) -> Result<Vec<String>> {
        let snapshot = self.snapshot().await?;
        let Some(quarter) = normalize_quarter(quarter, &snapshot.indexes.quarters) else {
            return Ok(snapshot.indexes.teams.iter().cloned().collect());
        };
        let teams: BTreeSet<String> = snapshot
            .pairs
            .iter()
            .filter(|(t, q)| !t.is_empty() && *q == quarter)
            .map(|(t, _)| t.clone())
            .collect();
        Ok(teams.into_iter().collect())
    }

    /// Distinct quarters, optionally only those with a document from `team`.
    pub async fn quarters(&self, team: Option<&str>) -> Result<Vec<String>> {
        let snapshot = self.snapshot().await?;
        let Some(team) = normalize_team(team, &snapshot.indexes.teams) else {
            return Ok(snapshot.indexes.quarters.iter().cloned().collect());
        };
        let quarters: BTreeSet<String> = snapshot
            .pairs
            .iter()
            .filter(|(t, q)| !q.is_empty() && *t == team)
            .map(|(_, q)| q.clone())
            .collect();
        Ok(quarters.into_iter().collect())
    }
}

/// Package the distinct files behind `paths`, skipping any that are gone.
fn package_zip(source: &dyn DocumentSource, paths: &[String]) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    let mut added = HashSet::new();

    for path in paths {
        if !added.insert(path.as_str()) {
            continue;
        }
        let Some(bytes) = source.read_raw(path) else {
            tracing::warn!(path = %path, "source file missing; skipped in zip");
            continue;
        };
        writer.start_file(path.as_str(), options).map_err(zip_error)?;
        writer.write_all(&bytes).map_err(zip_error)?;
    }

    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn zip_error(e: impl std::fmt::Display) -> OkrError {
    OkrError::corpus_read("okrs.zip", e)
}

/// `path,team,quarter,snippet` rows with RFC 4180 quoting and CRLF line ends.
pub fn render_csv(chunks: &[Chunk]) -> String {
    let mut out = String::from("path,team,quarter,snippet\r\n");
    for chunk in chunks {
        let flattened = chunk.text.trim().replace("\r\n", " ").replace('\n', " ");
        let snippet: String = flattened.chars().take(CSV_SNIPPET_CHARS).collect();
        let fields = [
            chunk.path(),
            chunk.metadata.team.as_str(),
            chunk.metadata.quarter.as_str(),
            snippet.as_str(),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
