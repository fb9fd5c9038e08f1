//! Continuous learning: answered questions become indexed knowledge.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::document::Document;
use crate::index::IndexManager;

/// Feeds completed question/answer exchanges back into the index.
///
/// Learning is best-effort. Failures are logged and reported as `false`,
/// never propagated.
pub struct LearningAdapter {
    index: Arc<IndexManager>,
}

impl LearningAdapter {
    /// Create an adapter writing through `index`.
    pub fn new(index: Arc<IndexManager>) -> Self {
        Self { index }
    }

    /// Index the exchange as a `chat_memory` document. Returns whether it was stored.
    ///
    /// Blank questions or answers are not learned.
    pub async fn learn(&self, question: &str, answer: &str) -> bool {
        if question.trim().is_empty() || answer.trim().is_empty() {
            debug!("skipping learning for blank exchange");
            return false;
        }

        let document = Document::learned(question, answer);
        match self.index.insert_documents(std::slice::from_ref(&document)).await {
            Ok(_) => {
                info!(document.id = %document.id, "learned from exchange");
                true
            }
            Err(e) => {
                warn!(document.id = %document.id, error = %e, "learning failed");
                false
            }
        }
    }
}
