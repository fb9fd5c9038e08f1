//! Context assembly for question answering.
//!
//! [`ContextAssembler`] fetches the top-K chunks for a question, joins their
//! text in similarity order with a blank line between them, and hard-cuts
//! the result to the configured character budget.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::index::IndexManager;

/// Returned by [`ContextAssembler::answer_context`] when nothing is indexed.
pub const NO_DOCUMENTS_SENTINEL: &str = "No documents indexed.";

/// Separator placed between retrieved chunks.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// The outcome of a retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextWindow {
    /// The index holds no knowledge yet. This is a valid answer, not an error.
    NoDocuments,
    /// Assembled context.
    Context {
        /// Joined chunk text, at most `max_context_chars` characters.
        text: String,
        /// Whether the joined text was cut to fit the budget.
        truncated: bool,
        /// Distinct parent document ids, most relevant first.
        sources: Vec<String>,
    },
}

impl ContextWindow {
    /// The text to hand to a completion service.
    pub fn as_text(&self) -> &str {
        match self {
            Self::NoDocuments => NO_DOCUMENTS_SENTINEL,
            Self::Context { text, .. } => text,
        }
    }
}

/// Return the first `max_chars` characters of `text` and whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Builds bounded context windows from an [`IndexManager`].
///
/// # Example
///
/// ```rust,ignore
/// let assembler = ContextAssembler::new(index.clone());
/// let context = assembler.answer_context("What color is the sky?").await;
/// ```
pub struct ContextAssembler {
    index: Arc<IndexManager>,
    top_k: usize,
    max_context_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler using `top_k` and `max_context_chars` from the index config.
    pub fn new(index: Arc<IndexManager>) -> Self {
        let top_k = index.config().top_k;
        let max_context_chars = index.config().max_context_chars;
        Self { index, top_k, max_context_chars }
    }

    /// Override the number of chunks fetched per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Override the context budget in characters.
    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    /// Retrieve and assemble context for `question`.
    ///
    /// # Errors
    ///
    /// Returns the embedding, store or timeout error that stopped the search.
    pub async fn retrieve(&self, question: &str) -> Result<ContextWindow> {
        let Some(results) = self.index.search(question, self.top_k).await? else {
            return Ok(ContextWindow::NoDocuments);
        };

        let mut sources: Vec<String> = Vec::new();
        for result in &results {
            if !sources.contains(&result.chunk.document_id) {
                sources.push(result.chunk.document_id.clone());
            }
        }

        let joined = results
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        let (text, truncated) = truncate_chars(&joined, self.max_context_chars);
        if truncated {
            debug!(max_context_chars = self.max_context_chars, "context truncated");
        }

        Ok(ContextWindow::Context { text: text.to_string(), truncated, sources })
    }

    /// Retrieve context for `question` as plain text.
    ///
    /// Never fails: an empty index yields [`NO_DOCUMENTS_SENTINEL`] and a
    /// retrieval failure yields `"Error retrieving context: {error}"`.
    pub async fn answer_context(&self, question: &str) -> String {
        match self.retrieve(question).await {
            Ok(window) => window.as_text().to_string(),
            Err(e) => {
                warn!(error = %e, "retrieval failed, degrading to placeholder");
                self.placeholder(&e)
            }
        }
    }

    /// The bounded text standing in for context when retrieval failed.
    pub fn placeholder(&self, error: &RagError) -> String {
        let message = format!("Error retrieving context: {error}");
        truncate_chars(&message, self.max_context_chars).0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_a_hard_character_cut() {
        assert_eq!(truncate_chars("The sky is blue.", 7), ("The sky", true));
        assert_eq!(truncate_chars("short", 12_000), ("short", false));
        assert_eq!(truncate_chars("exact", 5), ("exact", false));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let (cut, truncated) = truncate_chars("ééééé", 3);
        assert_eq!(cut, "ééé");
        assert!(truncated);
    }

    #[test]
    fn empty_window_renders_sentinel() {
        assert_eq!(ContextWindow::NoDocuments.as_text(), "No documents indexed.");
    }
}
