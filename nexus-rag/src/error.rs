//! Error types for the `nexus-rag` crate.
//!
//! An empty index is not represented here. Callers observe it as
//! [`ContextWindow::NoDocuments`](crate::retrieval::ContextWindow::NoDocuments).

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in knowledge-base operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The folder to ingest is missing or unreadable.
    #[error("Loader error ({path}): {message}")]
    LoaderError {
        /// The path that could not be loaded.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding provider failed or is unreachable.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store backend could not be opened or queried.
    #[error("Vector store unavailable ({backend}): {message}")]
    StoreUnavailable {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An embedder or store call did not finish within the configured bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// A bulk insert was stopped because the index was reset underneath it.
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// The text completion service failed.
    #[error("Completion error ({provider}): {message}")]
    CompletionError {
        /// The completion backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingError { .. }
                | Self::StoreUnavailable { .. }
                | Self::Timeout { .. }
                | Self::Interrupted(_)
        )
    }
}

/// A convenience result type for knowledge-base operations.
pub type Result<T> = std::result::Result<T, RagError>;
