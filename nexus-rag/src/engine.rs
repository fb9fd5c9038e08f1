//! The boundary facade: ingest, reset, ask.
//!
//! [`KnowledgeEngine`] composes the loader, index, context assembler and
//! learning adapter into the operations a request layer needs. None of its
//! methods return `Err`; failures are folded into the returned values so a
//! caller can hand them straight to a user.
//!
//! # Example
//!
//! ```rust,ignore
//! use nexus_rag::{KnowledgeEngine, IndexManager, RagConfig, SqliteVectorStore};
//!
//! let index = Arc::new(
//!     IndexManager::builder()
//!         .embedding_provider(Arc::new(embedder))
//!         .vector_store(Arc::new(SqliteVectorStore::open("chroma_data")?))
//!         .build()?,
//! );
//! let engine = KnowledgeEngine::new(index);
//! let outcome = engine.ingest("uploaded_docs").await;
//! let answer = engine.answer("What color is the sky?", &[], &completion).await;
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::completion::{ChatMessage, TextCompletion};
use crate::index::IndexManager;
use crate::learning::LearningAdapter;
use crate::loader::DirectoryLoader;
use crate::retrieval::{ContextAssembler, ContextWindow};

/// System prompt used when answering from retrieved context.
pub const ANALYST_PROMPT: &str = "You are DarkG Nexus, an elite intelligent analyst.

**INSTRUCTIONS:**
1. **Deep Analysis:** Analyze the provided Document Context (which includes Book excerpts AND past Chat Memories).
2. **Comprehensive:** If the context is from a book, cover ALL topics mentioned. Do not summarize briefly.
3. **Structure:** Use **Bold**, ### Headers, and | Tables |.
4. **Memory:** If the context contains 'User asked', this is your past memory. Use it to answer better.";

/// System prompt used when nothing is indexed.
pub const GENERAL_PROMPT: &str =
    "You are DarkG Nexus. Be detailed, structured (Tables/Bold), and precise.";

/// Number of prior turns forwarded to the model when answering without context.
pub const HISTORY_WINDOW: usize = 10;

/// Error reported when a folder exists but holds nothing readable.
pub const NOTHING_TO_INGEST: &str = "No readable documents found";

/// Result of an ingestion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Whether the folder's documents are now indexed.
    pub ok: bool,
    /// Why ingestion did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Documents read from the folder.
    pub documents: usize,
    /// Chunks written to the index.
    pub chunks: usize,
}

impl IngestOutcome {
    fn failed(error: impl Into<String>, documents: usize) -> Self {
        Self { ok: false, error: Some(error.into()), documents, chunks: 0 }
    }

    /// Whether the folder was readable but empty of documents.
    pub fn is_nothing_to_ingest(&self) -> bool {
        self.error.as_deref() == Some(NOTHING_TO_INGEST)
    }
}

/// A produced answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    /// Text to show the user. On completion failure this describes the error.
    pub text: String,
    /// Whether indexed context was supplied to the model.
    pub grounded: bool,
    /// Whether the exchange was stored as new knowledge.
    pub learned: bool,
}

/// Question answering over a continuously learning knowledge base.
pub struct KnowledgeEngine {
    index: Arc<IndexManager>,
    loader: DirectoryLoader,
    assembler: ContextAssembler,
    learner: LearningAdapter,
}

impl KnowledgeEngine {
    /// Create an engine over `index` with the default loader.
    pub fn new(index: Arc<IndexManager>) -> Self {
        Self {
            assembler: ContextAssembler::new(index.clone()),
            learner: LearningAdapter::new(index.clone()),
            loader: DirectoryLoader::default(),
            index,
        }
    }

    /// Replace the folder loader.
    pub fn with_loader(mut self, loader: DirectoryLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Replace the context assembler.
    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// The underlying index manager.
    pub fn index(&self) -> &Arc<IndexManager> {
        &self.index
    }

    /// Load every readable file under `folder` and add it to the index.
    ///
    /// Existing knowledge is kept. See [`replace_with`](Self::replace_with)
    /// to swap the knowledge base instead.
    pub async fn ingest(&self, folder: impl AsRef<Path>) -> IngestOutcome {
        let folder = folder.as_ref();
        let documents = match self.loader.load(folder) {
            Ok(documents) => documents,
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "ingestion failed to load folder");
                return IngestOutcome::failed(e.to_string(), 0);
            }
        };
        if documents.is_empty() {
            info!(folder = %folder.display(), "nothing to ingest");
            return IngestOutcome::failed(NOTHING_TO_INGEST, 0);
        }

        match self.index.insert_documents(&documents).await {
            Ok(chunks) => {
                info!(
                    folder = %folder.display(),
                    documents = documents.len(),
                    chunks,
                    "ingested folder"
                );
                IngestOutcome { ok: true, error: None, documents: documents.len(), chunks }
            }
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "ingestion failed");
                IngestOutcome::failed(e.to_string(), documents.len())
            }
        }
    }

    /// Reset the index, then ingest `folder` so it becomes the only knowledge.
    pub async fn replace_with(&self, folder: impl AsRef<Path>) -> IngestOutcome {
        if let Err(e) = self.index.reset().await {
            return IngestOutcome::failed(format!("reset failed: {e}"), 0);
        }
        self.ingest(folder).await
    }

    /// Remove all ingested and learned knowledge. Returns whether it succeeded.
    pub async fn reset(&self) -> bool {
        match self.index.reset().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "reset failed");
                false
            }
        }
    }

    /// Whether any knowledge is indexed. An unreachable store counts as empty.
    pub async fn has_content(&self) -> bool {
        match self.index.has_content().await {
            Ok(has) => has,
            Err(e) => {
                warn!(error = %e, "could not count index");
                false
            }
        }
    }

    /// Assembled context for `question`, or the empty-index sentinel.
    pub async fn answer_context(&self, question: &str) -> String {
        self.assembler.answer_context(question).await
    }

    /// Store a question/answer exchange as knowledge.
    pub async fn learn(&self, question: &str, answer: &str) -> bool {
        self.learner.learn(question, answer).await
    }

    /// [`answer`](Self::answer) without conversation history.
    pub async fn ask(&self, question: &str, completion: &dyn TextCompletion) -> Answer {
        self.answer(question, &[], completion).await
    }

    /// Answer `question` and learn from the exchange.
    ///
    /// With indexed knowledge the model receives the analyst prompt and the
    /// retrieved context. Otherwise it receives the general prompt followed by
    /// the last [`HISTORY_WINDOW`] turns of `history`. A completion failure is
    /// returned as text and is not learned.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ChatMessage],
        completion: &dyn TextCompletion,
    ) -> Answer {
        let grounded_context = if self.has_content().await {
            match self.assembler.retrieve(question).await {
                Ok(ContextWindow::Context { text, .. }) => Some(text),
                Ok(ContextWindow::NoDocuments) => None,
                Err(e) => {
                    warn!(error = %e, "retrieval failed, answering with placeholder context");
                    Some(self.assembler.placeholder(&e))
                }
            }
        } else {
            None
        };

        let grounded = grounded_context.is_some();
        let messages = match grounded_context {
            Some(context) => vec![
                ChatMessage::system(ANALYST_PROMPT),
                ChatMessage::user(format!("Context:\n{context}\n\nQuestion: {question}")),
            ],
            None => {
                let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
                let mut messages = Vec::with_capacity(recent.len() + 2);
                messages.push(ChatMessage::system(GENERAL_PROMPT));
                messages.extend_from_slice(recent);
                messages.push(ChatMessage::user(question));
                messages
            }
        };

        match completion.complete(&messages).await {
            Ok(text) => {
                let learned = self.learner.learn(question, &text).await;
                Answer { text, grounded, learned }
            }
            Err(e) => {
                warn!(error = %e, "completion failed");
                Answer { text: format!("Error generating response: {e}"), grounded, learned: false }
            }
        }
    }
}
