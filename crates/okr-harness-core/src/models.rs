//! Core data models used throughout OKR Harness.
//!
//! These types represent the documents, chunks, filters, and answers that
//! flow through the indexing and retrieval pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Front-matter metadata of a document.
///
/// `team` and `quarter` are the two recognized keys. They are trimmed at
/// load time and are the empty string when the document does not declare
/// them. Every other front-matter key is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub team: String,
    pub quarter: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(team: impl AsRef<str>, quarter: impl AsRef<str>) -> Self {
        Self {
            team: team.as_ref().trim().to_string(),
            quarter: quarter.as_ref().trim().to_string(),
            extra: BTreeMap::new(),
        }
    }
}

/// A loaded corpus document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the corpus root, always using `/` separators.
    pub path: String,
    pub metadata: Metadata,
    /// Canonical rendering of the body, used for chunking and extraction.
    pub text: String,
    /// The body exactly as it appeared in the source file.
    pub plain_text: String,
}

/// Metadata carried by every chunk: the owning path plus a copy of the
/// document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    pub path: String,
    pub team: String,
    pub quarter: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// A window of a document's text; the unit of semantic indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn from_document(doc: &Document, text: String) -> Self {
        Self {
            text,
            metadata: ChunkMetadata {
                path: doc.path.clone(),
                team: doc.metadata.team.clone(),
                quarter: doc.metadata.quarter.clone(),
                extra: doc.metadata.extra.clone(),
            },
        }
    }

    pub fn path(&self) -> &str {
        &self.metadata.path
    }
}

/// The resolved `{team, quarter}` constraint pair applied to one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet {
    pub team: Option<String>,
    pub quarter: Option<String>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.team.is_none() && self.quarter.is_none()
    }
}

/// Which index a query was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Team,
    Quarter,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Team => write!(f, "team"),
            Scope::Quarter => write!(f, "quarter"),
        }
    }
}

/// Structural role of an extracted sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Objective,
    KeyResult,
    Risk,
    Generic,
}

/// A sentence extracted from a chunk, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    pub path: String,
    pub category: Category,
}

/// A sentence with its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct RankedSentence {
    pub sentence: String,
    pub path: String,
    pub score: f32,
}

/// A retrieved passage, as returned by `search` and used for citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hit {
    pub path: String,
    pub snippet: String,
}

/// Extractive answer to a question.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub query: String,
    pub bullets: Vec<String>,
    pub citations: Vec<Hit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<String>,
}

/// Summary of a completed index build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub document_count: usize,
    pub chunk_count: usize,
    pub teams: Vec<String>,
    pub quarters: Vec<String>,
}

/// Trim `text` and cut it to at most `max_chars` characters, appending `…`
/// when anything was removed.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
