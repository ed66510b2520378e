//! Sentence ranking and citation building for extractive answers.
//!
//! Candidates come from [`crate::extract`]. They are embedded in a single
//! batch and scored against the query vector that retrieval already
//! computed, so answering a question costs exactly two embedding calls.

use std::collections::HashSet;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{OkrError, Result};
use crate::extract::{extract_sentences, select_candidates};
use crate::models::{snippet, Chunk, Hit, RankedSentence, Sentence};

/// Maximum number of bullets in an answer.
pub const MAX_BULLETS: usize = 6;
/// Bullets sharing this many leading characters are duplicates.
pub const DEDUP_PREFIX_CHARS: usize = 80;
/// Maximum number of citations in an answer.
pub const MAX_CITATIONS: usize = 5;
/// Citation snippet length, in characters.
pub const CITATION_SNIPPET_CHARS: usize = 300;

/// Extract candidate sentences from `chunks` and rank them against the query.
pub async fn extract_and_rank(
    query: &str,
    query_vec: &[f32],
    chunks: &[Chunk],
    provider: &dyn EmbeddingProvider,
) -> Result<Vec<RankedSentence>> {
    let sentences: Vec<Sentence> = chunks.iter().flat_map(extract_sentences).collect();
    let candidates = select_candidates(query, sentences);
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = candidates.iter().map(|s| s.text.clone()).collect();
    let vectors = provider.embed_batch(&texts).await?;
    if vectors.len() != candidates.len() {
        return Err(OkrError::embedding(
            provider.model_name(),
            format!(
                "expected {} sentence vectors, got {}",
                candidates.len(),
                vectors.len()
            ),
        ));
    }

    tracing::debug!(candidates = candidates.len(), "ranking sentences");
    Ok(rank_sentences(query_vec, candidates, &vectors))
}

/// Score, sort, deduplicate and truncate already-embedded sentences.
pub fn rank_sentences(
    query_vec: &[f32],
    candidates: Vec<Sentence>,
    vectors: &[Vec<f32>],
) -> Vec<RankedSentence> {
    let mut scored: Vec<RankedSentence> = candidates
        .into_iter()
        .zip(vectors)
        .map(|(s, v)| RankedSentence {
            score: cosine_similarity(query_vec, v),
            sentence: s.text,
            path: s.path,
        })
        .collect();

    // sort_by is stable: equal scores keep extraction order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen = HashSet::new();
    scored
        .into_iter()
        .filter(|r| seen.insert(dedup_key(&r.sentence)))
        .take(MAX_BULLETS)
        .collect()
}

fn dedup_key(sentence: &str) -> String {
    sentence.chars().take(DEDUP_PREFIX_CHARS).collect()
}

/// Citations for an answer: the leading retrieved chunks, trimmed and cut
/// to [`CITATION_SNIPPET_CHARS`].
pub fn citations(chunks: &[Chunk]) -> Vec<Hit> {
    chunks
        .iter()
        .take(MAX_CITATIONS)
        .map(|c| Hit {
            path: c.path().to_string(),
            snippet: snippet(&c.text, CITATION_SNIPPET_CHARS),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Document, Metadata};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text by counting a few marker words.
    struct KeywordProvider {
        calls: AtomicUsize,
    }

    impl KeywordProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordProvider {
        fn model_name(&self) -> &str {
            "keyword"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("latency").count() as f32,
                        t.matches("revenue").count() as f32,
                        1.0,
                    ]
                })
                .collect())
        }
    }

    fn chunk(path: &str, text: &str) -> Chunk {
        let doc = Document {
            path: path.to_string(),
            metadata: Metadata::new("Platform", "2025-Q3"),
            text: text.to_string(),
            plain_text: text.to_string(),
        };
        Chunk::from_document(&doc, text.to_string())
    }

    fn sentence(text: &str) -> Sentence {
        Sentence {
            text: text.to_string(),
            path: "a.md".to_string(),
            category: Category::Generic,
        }
    }

    #[tokio::test]
    async fn test_ranks_by_similarity_with_one_batch() {
        let provider = KeywordProvider::new();
        let chunks = vec![chunk(
            "platform.md",
            "- KR1: Grow revenue by 10%\n- KR2: Cut latency in half\n",
        )];
        let ranked = extract_and_rank("key results", &[1.0, 0.0, 0.0], &chunks, &provider)
            .await
            .unwrap();
        assert_eq!(ranked[0].sentence, "KR2: Cut latency in half");
        assert_eq!(ranked[0].path, "platform.md");
        assert_eq!(ranked.len(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_candidates_skips_embedding() {
        let provider = KeywordProvider::new();
        let chunks = vec![chunk("x.md", "tiny")];
        let ranked = extract_and_rank("objectives", &[1.0, 0.0, 0.0], &chunks, &provider)
            .await
            .unwrap();
        assert!(ranked.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dedup_on_prefix() {
        let prefix = "x".repeat(DEDUP_PREFIX_CHARS);
        let a = sentence(&format!("{} first tail", prefix));
        let b = sentence(&format!("{} second tail", prefix));
        let c = sentence("something else entirely different");
        let ranked = rank_sentences(
            &[1.0],
            vec![a, b, c],
            &[vec![1.0], vec![1.0], vec![0.5]],
        );
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].sentence.ends_with("first tail"));
    }

    #[test]
    fn test_dedup_is_case_sensitive() {
        let ranked = rank_sentences(
            &[1.0],
            vec![sentence("Reduce latency"), sentence("reduce latency")],
            &[vec![1.0], vec![1.0]],
        );
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_ties_keep_extraction_order() {
        let ranked = rank_sentences(
            &[1.0, 0.0],
            vec![sentence("first"), sentence("second"), sentence("third")],
            &[vec![1.0, 0.0], vec![2.0, 0.0], vec![3.0, 0.0]],
        );
        let order: Vec<&str> = ranked.iter().map(|r| r.sentence.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_truncates_to_max_bullets() {
        let candidates: Vec<Sentence> = (0..10).map(|i| sentence(&format!("bullet {}", i))).collect();
        let vectors = vec![vec![1.0]; 10];
        assert_eq!(rank_sentences(&[1.0], candidates, &vectors).len(), MAX_BULLETS);
    }

    #[test]
    fn test_citations_first_five() {
        let chunks: Vec<Chunk> = (0..7)
            .map(|i| chunk(&format!("{}.md", i), &"c".repeat(350)))
            .collect();
        let cites = citations(&chunks);
        assert_eq!(cites.len(), MAX_CITATIONS);
        assert_eq!(cites[0].path, "0.md");
        assert_eq!(cites[4].path, "4.md");
        assert!(cites[0].snippet.ends_with('…'));
        assert_eq!(cites[0].snippet.chars().count(), CITATION_SNIPPET_CHARS + 1);
    }
}
