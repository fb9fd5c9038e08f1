//! # nexus-rag
//!
//! Retrieval-augmented question answering with a continuously learning
//! knowledge base.
//!
//! Documents loaded from a folder are chunked, embedded and stored in a
//! single named collection. Questions retrieve the most similar chunks,
//! which are joined into a bounded context window for a chat model. Every
//! answered question is fed back into the collection, so the knowledge base
//! grows until it is explicitly reset.
//!
//! ## Components
//!
//! - [`EmbeddingProvider`]: text to fixed-size vectors ([`HashEmbeddingProvider`]
//!   offline, `OllamaEmbeddingProvider` with the `ollama` feature)
//! - [`VectorStore`]: [`InMemoryVectorStore`], or `SqliteVectorStore` with the
//!   default `sqlite` feature
//! - [`DirectoryLoader`] and [`Chunker`]: files to chunks
//! - [`IndexManager`]: collection lifecycle and reset exclusion
//! - [`ContextAssembler`]: top-K retrieval and context truncation
//! - [`LearningAdapter`]: question/answer pairs back into the index
//! - [`KnowledgeEngine`]: the facade a request layer calls
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nexus_rag::{HashEmbeddingProvider, IndexManager, InMemoryVectorStore, KnowledgeEngine};
//!
//! let index = Arc::new(
//!     IndexManager::builder()
//!         .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!         .vector_store(Arc::new(InMemoryVectorStore::new()))
//!         .build()?,
//! );
//! let engine = KnowledgeEngine::new(index);
//! engine.ingest("uploaded_docs").await;
//! println!("{}", engine.answer_context("What color is the sky?").await);
//! ```

pub mod chunking;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod index;
pub mod inmemory;
pub mod learning;
pub mod loader;
pub mod retrieval;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use completion::{ChatMessage, ChatRole, TextCompletion};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use engine::{Answer, IngestOutcome, KnowledgeEngine};
pub use error::{RagError, Result};
pub use hashing::HashEmbeddingProvider;
pub use index::{IndexHandle, IndexManager, IndexManagerBuilder, IndexState};
pub use inmemory::InMemoryVectorStore;
pub use learning::LearningAdapter;
pub use loader::DirectoryLoader;
pub use retrieval::{ContextAssembler, ContextWindow, NO_DOCUMENTS_SENTINEL};
pub use vectorstore::{CollectionInfo, VectorStore};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaCompletion, OllamaEmbeddingProvider};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorStore;
