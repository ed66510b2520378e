//! Error types shared by the core and the application layer.

use thiserror::Error;

/// Failures surfaced by index builds and engine operations.
///
/// Empty result sets are never errors: a query that matches nothing
/// returns an empty `Vec`. Filter values that match no known team or
/// quarter are passed through and simply fall back to unfiltered results.
#[derive(Debug, Error)]
pub enum OkrError {
    /// The corpus directory or one of its documents could not be read or parsed.
    #[error("Corpus read error ({path}): {message}")]
    CorpusRead {
        /// Path of the directory or file that failed.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding backend failed or returned a malformed response.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A download was requested in a format other than `zip` or `csv`.
    #[error("Unsupported format '{0}'. Use 'zip' or 'csv'.")]
    UnsupportedFormat(String),
}

impl OkrError {
    pub fn corpus_read(path: impl Into<String>, message: impl ToString) -> Self {
        Self::CorpusRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn embedding(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Embedding {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

/// A convenience result type for OKR Harness operations.
pub type Result<T> = std::result::Result<T, OkrError>;
