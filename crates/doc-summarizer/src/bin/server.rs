//! Summarization server binary
//!
//! Run with: cargo run -p doc-summarizer --bin doc-summarizer-server -- --config config.toml

use clap::Parser;
use doc_summarizer::{config::SummarizerConfig, server::SummarizerServer};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "doc-summarizer-server")]
#[command(about = "PDF upload API with background LLM summaries")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the listen host
    #[arg(long)]
    host: Option<String>,
    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
    /// Serve the API only; another process runs the worker
    #[arg(long)]
    no_worker: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_summarizer=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                     Doc Summarizer                        ║
║            PDF uploads with background summaries          ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // Load configuration
    let mut config = SummarizerConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Storage: {:?}", config.storage.backend);
    tracing::info!("  - Broker: {:?}", config.queue.broker);
    tracing::info!("  - LLM: {:?} ({})", config.llm.backend, config.llm.model);
    tracing::info!("  - Job timeout: {}s", config.processing.job_timeout_secs);

    let server = SummarizerServer::new(config.clone()).await?;
    let state = server.state().clone();

    let removed = state
        .database()
        .cleanup_old_jobs(config.queue.job_retention_days)?;
    if removed > 0 {
        tracing::info!(
            "Removed {} finished jobs older than {} days",
            removed,
            config.queue.job_retention_days
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Interrupted jobs are only re-queued by the process that runs the worker
    let worker = if cli.no_worker {
        tracing::info!("Worker disabled (--no-worker); jobs are only queued");
        None
    } else {
        Some(state.start_worker(shutdown_rx).await?)
    };

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/uploads                 - Get an upload URL");
    println!("  POST /api/documents/:id/complete  - Queue summarization");
    println!("  GET  /api/documents/:id/status    - Poll progress");
    println!("\nPress Ctrl+C to stop\n");

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    };

    server.start(shutdown).await?;

    if let Some(worker) = worker {
        tracing::info!("Waiting for the worker to finish its current job...");
        worker.await?;
    }

    Ok(())
}
