// src/main.rs
// newsrag server and ingestion CLI

use std::future::IntoFuture;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use newsrag::{
    api::create_router,
    config::RagConfig,
    ingest::{ingest_documents, read_documents, DEFAULT_BATCH_SIZE},
    retrieval::VectorIndex,
    session::spawn_cleanup_scheduler,
    AppState,
};

#[derive(Parser)]
#[command(name = "newsrag")]
#[command(about = "Retrieval-augmented chat over news articles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP and WebSocket server (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Embed a JSON array of articles and store them in the vector index
    Ingest {
        /// Path to the articles file
        #[arg(index = 1)]
        file: PathBuf,

        /// Articles embedded per provider call
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = RagConfig::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        None => run_server(config).await,
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                config.port = port;
            }
            run_server(config).await
        }
        Some(Commands::Ingest { file, batch_size }) => run_ingest(config, file, batch_size).await,
    }
}

async fn run_server(config: RagConfig) -> Result<()> {
    info!("Starting newsrag");
    let state = AppState::open(config)
        .await
        .context("Failed to initialise services")?;

    let cleanup_interval = state.config.cleanup_interval();
    let cleanup_handle = spawn_cleanup_scheduler(state.sessions.clone(), cleanup_interval);
    info!(
        "Session cleanup scheduler started - running every {} seconds",
        cleanup_interval.as_secs()
    );

    let bind_address = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!("Server listening on http://{}", bind_address);

    let app = create_router(state.clone());
    let server_future = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .into_future();

    tokio::select! {
        result = server_future => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = cleanup_handle => {
            error!("Session cleanup scheduler unexpectedly terminated");
        }
    }

    state.close().await;
    Ok(())
}

async fn run_ingest(config: RagConfig, file: PathBuf, batch_size: usize) -> Result<()> {
    let documents = read_documents(&file)
        .with_context(|| format!("Failed to read articles from {}", file.display()))?;
    info!("Loaded {} articles from {}", documents.len(), file.display());

    let state = AppState::open(config)
        .await
        .context("Failed to initialise services")?;

    let report = ingest_documents(&state.embedder, state.index.as_ref(), documents, batch_size)
        .await
        .context("Ingestion failed")?;
    let total = state.index.count().await.context("Failed to count indexed articles")?;

    println!(
        "Stored {} articles ({} duplicates, {} empty skipped); index now holds {}",
        report.stored, report.duplicates, report.empty, total
    );

    state.close().await;
    Ok(())
}
