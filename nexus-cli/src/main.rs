//! # nexus
//!
//! Command-line front end for the DarkG Nexus knowledge engine.
//!
//! Usage:
//!   nexus ingest ./uploaded_docs --replace   # swap the knowledge base
//!   nexus ask What color is the sky?         # answer and learn
//!   nexus context What color is the sky?     # show retrieved context only
//!   nexus status                             # is anything indexed?
//!   nexus reset                              # forget everything

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nexus_rag::ollama::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_OLLAMA_URL};
use nexus_rag::{
    EmbeddingProvider, HashEmbeddingProvider, IndexManager, KnowledgeEngine, OllamaCompletion,
    OllamaEmbeddingProvider, RagConfig, SqliteVectorStore,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nexus", version, about = "Retrieval-augmented answers over your own documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the persisted index (overrides `persist_dir`)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Embed locally with feature hashing instead of calling Ollama
    #[arg(long)]
    offline: bool,

    /// Ollama base URL
    #[arg(long, default_value = DEFAULT_OLLAMA_URL, env = "OLLAMA_URL")]
    ollama_url: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a folder of documents into the index
    Ingest {
        /// Folder to read (defaults to `upload_dir`)
        folder: Option<PathBuf>,
        /// Reset the index first so the folder becomes the only knowledge
        #[arg(long)]
        replace: bool,
    },
    /// Answer a question and learn from the exchange
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// Chat model served by Ollama
        #[arg(short, long, default_value = DEFAULT_CHAT_MODEL)]
        model: String,
    },
    /// Print the context that would be sent for a question
    Context {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Remove all ingested and learned knowledge
    Reset,
    /// Report whether anything is indexed
    Status,
}

fn load_config(cli: &Cli) -> Result<RagConfig> {
    let mut config = match &cli.config {
        Some(path) => RagConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RagConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.persist_dir = dir.clone();
    }
    Ok(config)
}

fn build_engine(cli: &Cli, config: RagConfig) -> Result<KnowledgeEngine> {
    std::fs::create_dir_all(&config.persist_dir)
        .with_context(|| format!("creating {}", config.persist_dir.display()))?;
    let store = SqliteVectorStore::open(&config.persist_dir)
        .with_context(|| format!("opening index in {}", config.persist_dir.display()))?;

    let embedder: Arc<dyn EmbeddingProvider> = if cli.offline {
        Arc::new(HashEmbeddingProvider::new(DEFAULT_EMBEDDING_DIMENSIONS))
    } else {
        Arc::new(
            OllamaEmbeddingProvider::new(&cli.ollama_url)
                .with_timeout(config.operation_timeout()),
        )
    };
    debug!(
        embedder = embedder.name(),
        persist_dir = %config.persist_dir.display(),
        "opening engine"
    );

    let index = IndexManager::builder()
        .config(config)
        .embedding_provider(embedder)
        .vector_store(Arc::new(store))
        .build()?;
    Ok(KnowledgeEngine::new(Arc::new(index)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        if cli.verbose { "nexus=debug,nexus_rag=debug" } else { "nexus=info,nexus_rag=warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let upload_dir = config.upload_dir.clone();
    let engine = build_engine(&cli, config)?;

    match &cli.command {
        Commands::Ingest { folder, replace } => {
            let folder = folder.clone().unwrap_or(upload_dir);
            info!(folder = %folder.display(), replace, "ingesting");
            let outcome = if *replace {
                engine.replace_with(&folder).await
            } else {
                engine.ingest(&folder).await
            };
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.ok {
                std::process::exit(1);
            }
        }
        Commands::Ask { question, model } => {
            let question = question.join(" ");
            let completion = OllamaCompletion::new(&cli.ollama_url).with_model(model);
            let answer = engine.ask(&question, &completion).await;
            debug!(grounded = answer.grounded, learned = answer.learned, "answered");
            println!("{}", answer.text);
        }
        Commands::Context { question } => {
            println!("{}", engine.answer_context(&question.join(" ")).await);
        }
        Commands::Reset => {
            if !engine.reset().await {
                anyhow::bail!("reset failed, see log for details");
            }
            println!("Index reset.");
        }
        Commands::Status => {
            let index = engine.index();
            let status = serde_json::json!({
                "collection": index.config().collection_name,
                "has_content": engine.has_content().await,
                "records": index.count().await.ok(),
                "embedder": index.embedding_provider().name(),
                "embedder_model": index.embedding_provider().model_id(),
                "store": index.vector_store().backend(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
