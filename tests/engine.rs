use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use okr_harness::config::Config;
use okr_harness::embedding::HashProvider;
use okr_harness::engine::OkrEngine;
use okr_harness_core::chunk::TextSplitter;
use okr_harness_core::embedding::EmbeddingProvider;
use okr_harness_core::error::{OkrError, Result};
use okr_harness_core::models::{Document, Metadata};
use okr_harness_core::source::DocumentSource;

const PLATFORM: &str = "---
team: Platform
quarter: 2025-Q3
---
# Objective: Improve reliability

Our platform must stay available for every customer during peak traffic.

- KR1: Reduce P99 latency by 30%
- KR2: Cut paging incidents in half

## Risks

- Vendor migration may slip into Q4
";

const SALES: &str = "---
team: Sales
quarter: 2025-Q4
---
# Objective: Grow enterprise revenue

- KR1: Close 20 enterprise deals
- KR2: Expand into two new regions
";

fn setup_corpus() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let okrs = tmp.path().join("okrs");
    fs::create_dir_all(okrs.join("teams")).unwrap();
    fs::write(okrs.join("teams/platform.md"), PLATFORM).unwrap();
    fs::write(okrs.join("teams/sales.md"), SALES).unwrap();

    let mut config = Config::default();
    config.corpus.dir = okrs;
    config.embedding.provider = "hash".to_string();
    (tmp, config)
}

fn engine_for(config: &Config) -> OkrEngine {
    OkrEngine::from_config(config).unwrap()
}

#[tokio::test]
async fn test_objectives_for_platform_scenario() {
    let (_tmp, config) = setup_corpus();
    let engine = engine_for(&config);

    let answer = engine
        .ask("objectives for Platform", 5, None, None)
        .await
        .unwrap();

    assert_eq!(answer.team.as_deref(), Some("Platform"));
    assert!(
        answer
            .bullets
            .contains(&"Objective: Improve reliability".to_string()),
        "bullets: {:?}",
        answer.bullets
    );
    assert!(!answer.citations.is_empty());
    assert!(answer
        .citations
        .iter()
        .all(|c| c.path == "teams/platform.md"));
}

#[tokio::test]
async fn test_key_results_for_quarter() {
    let (_tmp, config) = setup_corpus();
    let engine = engine_for(&config);

    let answer = engine
        .ask("key results", 5, None, Some("2025-q4"))
        .await
        .unwrap();

    assert_eq!(answer.quarter.as_deref(), Some("2025-Q4"));
    assert_eq!(answer.team, None);
    assert!(answer.bullets.iter().all(|b| b.starts_with("KR")));
    assert!(answer
        .bullets
        .contains(&"KR1: Close 20 enterprise deals".to_string()));
}

#[tokio::test]
async fn test_risk_question() {
    let (_tmp, config) = setup_corpus();
    let engine = engine_for(&config);

    let answer = engine.ask("what are the risks?", 5, None, None).await.unwrap();
    assert_eq!(answer.bullets, vec!["Vendor migration may slip into Q4"]);
}

#[tokio::test]
async fn test_ask_is_deterministic() {
    let (_tmp, config) = setup_corpus();
    let engine = engine_for(&config);

    let first = engine.ask("reliability goals", 6, None, None).await.unwrap();
    let second = engine.ask("reliability goals", 6, None, None).await.unwrap();
    assert_eq!(first.bullets, second.bullets);
    assert_eq!(first.citations, second.citations);

    // A fresh engine over the same corpus agrees too.
    let third = engine_for(&config)
        .ask("reliability goals", 6, None, None)
        .await
        .unwrap();
    assert_eq!(first.bullets, third.bullets);
}

#[tokio::test]
async fn test_bullets_have_distinct_prefixes() {
    let (tmp, config) = setup_corpus();
    let repeated =
        "Keep the shared platform reliable for every product team across all regions and time zones";
    assert!(repeated.len() > 80);
    let body = format!(
        "---\nteam: Notes\nquarter: 2025-Q3\n---\n{} one.\n\n{} two.\n\n{} three.\n",
        repeated, repeated, repeated
    );
    fs::write(tmp.path().join("okrs/teams/notes.md"), body).unwrap();

    let engine = engine_for(&config);
    let answer = engine
        .ask("shared platform reliable", 6, Some("Notes"), None)
        .await
        .unwrap();

    // No structural lines in this file, so generic sentences answer; the
    // three share their first 80 characters and collapse to one.
    assert_eq!(answer.bullets.len(), 1);
    assert!(answer.bullets[0].starts_with(repeated));
}

#[tokio::test]
async fn test_search_snippets_and_paths() {
    let (_tmp, config) = setup_corpus();
    let engine = engine_for(&config);

    let hits = engine.search("enterprise deals", 5, None, None).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].path, "teams/sales.md");
    assert!(hits.iter().all(|h| h.snippet.chars().count() <= 401));
}

#[tokio::test]
async fn test_unknown_team_falls_back_to_global() {
    let (_tmp, config) = setup_corpus();
    let engine = engine_for(&config);

    let unfiltered = engine.search("reliability", 1, None, None).await.unwrap();
    let fallback = engine
        .search("reliability", 1, Some("Nonexistent"), None)
        .await
        .unwrap();
    assert_eq!(fallback.len(), 1);
    assert_eq!(fallback, unfiltered);
}

#[tokio::test]
async fn test_download_csv_scenario() {
    let (_tmp, config) = setup_corpus();
    let engine = engine_for(&config);

    let payload = engine
        .download("reliability", 8, "csv", None, None)
        .await
        .unwrap();
    assert_eq!(payload.filename, "okrs.csv");
    assert_eq!(payload.content_type, "text/csv");

    let csv = String::from_utf8(payload.bytes).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("path,team,quarter,snippet"));
    assert!(lines.any(|l| l.starts_with("teams/platform.md,Platform,2025-Q3,")));
}

#[tokio::test]
async fn test_download_zip_skips_deleted_files() {
    let (tmp, config) = setup_corpus();
    let engine = engine_for(&config);
    engine.build_index().await.unwrap();

    fs::remove_file(tmp.path().join("okrs/teams/sales.md")).unwrap();

    let payload = engine
        .download("objective", 8, "zip", None, None)
        .await
        .unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(payload.bytes)).unwrap();
    assert_eq!(archive.len(), 1);
    let mut file = archive.by_name("teams/platform.md").unwrap();
    let mut content = String::new();
    std::io::Read::read_to_string(&mut file, &mut content).unwrap();
    assert_eq!(content, PLATFORM);
}

#[tokio::test]
async fn test_download_rejects_unknown_format() {
    let (_tmp, config) = setup_corpus();
    let engine = engine_for(&config);
    let err = engine
        .download("objective", 8, "xlsx", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OkrError::UnsupportedFormat(ref f) if f == "xlsx"));
}

#[tokio::test]
async fn test_missing_corpus_is_corpus_read() {
    let mut config = Config::default();
    config.corpus.dir = PathBuf::from("/definitely/not/here");
    config.embedding.provider = "hash".to_string();

    let err = engine_for(&config).build_index().await.unwrap_err();
    assert!(matches!(err, OkrError::CorpusRead { .. }));
}

#[tokio::test]
async fn test_refresh_picks_up_new_files() {
    let (tmp, config) = setup_corpus();
    let engine = engine_for(&config);
    assert_eq!(engine.health().await.unwrap().documents, 2);

    fs::write(
        tmp.path().join("okrs/teams/design.md"),
        "---\nteam: Design\nquarter: 2025-Q3\n---\n# Objective: Ship the new design system\n",
    )
    .unwrap();

    // Until refreshed, queries see the old snapshot.
    assert_eq!(engine.teams(None).await.unwrap(), vec!["Platform", "Sales"]);

    let result = engine.refresh().await.unwrap();
    assert_eq!(result.document_count, 3);
    assert_eq!(
        engine.teams(Some("2025-Q3")).await.unwrap(),
        vec!["Design", "Platform"]
    );
}

// ============ Snapshot lifecycle ============

/// In-memory corpus that can be swapped between builds and counts loads.
struct SwappableSource {
    documents: Mutex<Vec<Document>>,
    loads: AtomicUsize,
}

impl SwappableSource {
    fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: Mutex::new(documents),
            loads: AtomicUsize::new(0),
        }
    }

    fn replace(&self, documents: Vec<Document>) {
        *self.documents.lock().unwrap() = documents;
    }
}

impl DocumentSource for SwappableSource {
    fn list_documents(&self) -> Result<Vec<Document>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.lock().unwrap().clone())
    }

    fn read_raw(&self, _path: &str) -> Option<Vec<u8>> {
        None
    }
}

/// Hash embeddings that can be switched to fail.
struct FlakyProvider {
    inner: HashProvider,
    failing: AtomicBool,
}

#[async_trait]
impl EmbeddingProvider for FlakyProvider {
    fn model_name(&self) -> &str {
        "flaky"
    }
    fn dims(&self) -> usize {
        self.inner.dims()
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(OkrError::embedding("flaky", "backend unavailable"));
        }
        self.inner.embed_batch(texts).await
    }
}

fn doc(path: &str, team: &str, text: &str) -> Document {
    Document {
        path: path.to_string(),
        metadata: Metadata::new(team, "2025-Q3"),
        text: text.to_string(),
        plain_text: text.to_string(),
    }
}

fn lifecycle_engine(
    documents: Vec<Document>,
) -> (Arc<OkrEngine>, Arc<SwappableSource>, Arc<FlakyProvider>) {
    let source = Arc::new(SwappableSource::new(documents));
    let provider = Arc::new(FlakyProvider {
        inner: HashProvider::new(64),
        failing: AtomicBool::new(false),
    });
    let engine = Arc::new(OkrEngine::new(
        source.clone(),
        provider.clone(),
        TextSplitter::default(),
    ));
    (engine, source, provider)
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() {
    let (engine, source, provider) =
        lifecycle_engine(vec![doc("old.md", "Platform", "- KR1: Old key result")]);
    engine.build_index().await.unwrap();

    source.replace(vec![doc("new.md", "Platform", "- KR1: New key result")]);
    provider.failing.store(true, Ordering::SeqCst);

    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(err, OkrError::Embedding { .. }));

    // Queries need the provider for the query vector; restore it and check
    // the old snapshot is still served.
    provider.failing.store(false, Ordering::SeqCst);
    let hits = engine.search("key result", 5, None, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "old.md");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_queries_build_once() {
    let (engine, source, _) =
        lifecycle_engine(vec![doc("a.md", "Platform", "- KR1: Reduce latency")]);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move { engine.health().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().documents, 1);
    }
    assert_eq!(source.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_index() {
    let old: Vec<Document> = (0..3)
        .map(|i| doc(&format!("old-{}.md", i), "Platform", "- KR1: Old key result"))
        .collect();
    let new: Vec<Document> = (0..3)
        .map(|i| doc(&format!("new-{}.md", i), "Platform", "- KR1: New key result"))
        .collect();

    let (engine, source, _) = lifecycle_engine(old);
    engine.build_index().await.unwrap();
    source.replace(new);

    let refresher = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.refresh().await })
    };

    let mut readers = Vec::new();
    for _ in 0..16 {
        let engine = Arc::clone(&engine);
        readers.push(tokio::spawn(async move {
            engine.search("key result", 10, None, None).await
        }));
    }

    for reader in readers {
        let hits = reader.await.unwrap().unwrap();
        assert_eq!(hits.len(), 3);
        let all_old = hits.iter().all(|h| h.path.starts_with("old-"));
        let all_new = hits.iter().all(|h| h.path.starts_with("new-"));
        assert!(all_old || all_new, "mixed snapshot: {:?}", hits);
    }

    refresher.await.unwrap().unwrap();
    let hits = engine.search("key result", 10, None, None).await.unwrap();
    assert!(hits.iter().all(|h| h.path.starts_with("new-")));
}
