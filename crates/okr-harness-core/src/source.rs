//! Document source abstraction.
//!
//! The [`DocumentSource`] trait is the seam between the engine and the
//! corpus. The app crate provides a filesystem-backed Markdown loader;
//! [`InMemorySource`] serves tests and embedders that already hold their
//! documents.

use crate::error::Result;
use crate::models::Document;

/// Enumerates the documents of a corpus.
///
/// Called once per index build. Implementations return every document
/// with a relative `/`-separated path, sorted by path, and report any
/// unreadable input as [`OkrError::CorpusRead`](crate::error::OkrError::CorpusRead).
pub trait DocumentSource: Send + Sync {
    fn list_documents(&self) -> Result<Vec<Document>>;

    /// Read the raw bytes of a source file by its relative path.
    ///
    /// Returns `None` when the file no longer exists. Used when packaging
    /// downloads.
    fn read_raw(&self, path: &str) -> Option<Vec<u8>>;
}

/// A fixed set of documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    documents: Vec<Document>,
}

impl InMemorySource {
    pub fn new(mut documents: Vec<Document>) -> Self {
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        Self { documents }
    }
}

impl DocumentSource for InMemorySource {
    fn list_documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents.clone())
    }

    fn read_raw(&self, path: &str) -> Option<Vec<u8>> {
        self.documents
            .iter()
            .find(|d| d.path == path)
            .map(|d| d.plain_text.clone().into_bytes())
    }
}
