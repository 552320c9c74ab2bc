//! # Recall CLI (`recall`)
//!
//! The `recall` binary drives the document comprehension service: database
//! initialization, PDF ingestion, question generation, answer scoring, and
//! the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and run schema migrations |
//! | `recall ingest <file.pdf>` | Upload, embed, and generate first questions |
//! | `recall questions <id>` | Generate follow-up questions for a document |
//! | `recall answer <id> <text>` | Score a typed answer |
//! | `recall serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! recall init --config ./config/recall.toml
//!
//! # Ingest a PDF for the owner "alice"
//! recall ingest notes.pdf --owner alice --config ./config/recall.toml
//!
//! # Ask for more questions
//! recall questions 6f1c... --config ./config/recall.toml
//!
//! # Score an answer to a specific question
//! recall answer 6f1c... --user alice --question 9b2d... "Photosynthesis converts light into chemical energy."
//!
//! # Start the HTTP server
//! recall serve --config ./config/recall.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use recall_harness::config::{self, Config};
use recall_harness::extract::MIME_PDF;
use recall_harness::store::sqlite::SqliteStore;
use recall_harness::workflow::Workflow;
use recall_harness::{db, embedding, migrate, question_gen, server, storage, transcribe};

/// Recall Harness CLI — a document comprehension service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/recall.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Recall Harness — upload documents, generate comprehension questions, score answers",
    version,
    long_about = "Recall Harness ingests PDF documents, embeds them into document-level vectors, \
    generates comprehension questions with a generative model, and scores free-form answers by \
    embedding similarity. Exposes both a CLI and an HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest a PDF document.
    ///
    /// Uploads the file to object storage, extracts its text, computes the
    /// document embedding, and prints the generated questions.
    Ingest {
        /// Path to the PDF file.
        file: PathBuf,

        /// Owner identifier recorded on the document.
        #[arg(long)]
        owner: Option<String>,
    },

    /// Generate follow-up questions for a document.
    ///
    /// Replays the document's chat history so new questions build on what
    /// was already asked and answered.
    Questions {
        /// Document UUID.
        id: String,
    },

    /// Score a typed answer against a document.
    Answer {
        /// Document UUID.
        id: String,

        /// The answer text.
        text: String,

        /// User identifier recorded on the response.
        #[arg(long)]
        user: String,

        /// Question UUID the answer addresses, if any.
        #[arg(long)]
        question: Option<String>,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// document comprehension API.
    Serve,
}

/// Wire up the workflow from configuration: store, providers, storage,
/// transcriber. Runs migrations so every command works on a fresh database.
async fn build_workflow(cfg: &Config) -> anyhow::Result<Arc<Workflow>> {
    let pool = db::connect(&cfg.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    let embedder: Arc<dyn embedding::EmbeddingProvider> =
        embedding::create_provider(&cfg.embedding)?.into();
    let generator: Arc<dyn question_gen::GenerationProvider> =
        question_gen::create_provider(&cfg.generation)?.into();
    let object_storage: Arc<dyn storage::ObjectStorage> =
        storage::create_storage(&cfg.storage)?.into();
    let transcriber: Arc<dyn transcribe::Transcriber> =
        transcribe::create_transcriber(&cfg.transcription)?.into();

    Ok(Arc::new(Workflow::new(
        store,
        embedder,
        generator,
        object_storage,
        transcriber,
        cfg.clone(),
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, owner } => {
            let bytes = std::fs::read(&file)?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload.pdf");

            let workflow = build_workflow(&cfg).await?;
            let outcome = workflow
                .ingest(file_name, &bytes, MIME_PDF, owner.as_deref())
                .await?;

            println!("Document:    {}", outcome.document_id);
            println!("Storage URI: {}", outcome.storage_uri);
            println!("Questions:");
            for q in &outcome.questions {
                println!("  [{}] {}", q.id, q.text);
            }
        }
        Commands::Questions { id } => {
            let workflow = build_workflow(&cfg).await?;
            let questions = workflow.more_questions(&id).await?;
            for q in &questions {
                println!("  [{}] {}", q.id, q.text);
            }
        }
        Commands::Answer {
            id,
            text,
            user,
            question,
        } => {
            let workflow = build_workflow(&cfg).await?;
            let outcome = workflow
                .answer(&id, question.as_deref(), &user, &text)
                .await?;
            println!("Score:      {}/100", outcome.score);
            println!("Response:   {}", outcome.response_id);
            println!("Evaluation: {}", outcome.evaluation_id);
        }
        Commands::Serve => {
            let workflow = build_workflow(&cfg).await?;
            server::run_server(workflow, &cfg.server.bind).await?;
        }
    }

    Ok(())
}
