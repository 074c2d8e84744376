//! CLI entrypoint: loads configuration, builds the remote queue client, registers tasks, and
//! runs the worker pool until asked to stop.
//!
//! Initializes logging first, builds long-lived state, then races the supervisor future against
//! an OS signal future so Ctrl+C / SIGTERM trigger a graceful drain instead of an abrupt kill.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use relayq_core::queue::SqsRemoteQueue;
use relayq_core::{logging, ManagerWorker, TaskRegistry, WorkerSettings};
use tracing::info;

/// Run the relayq worker pool against an SQS queue.
#[derive(Debug, Parser)]
#[command(name = "relayq-worker", version, about)]
struct Cli {
    /// Override the queue URL from config/environment.
    #[arg(long)]
    queue_url: Option<String>,

    /// Override the number of read workers.
    #[arg(long)]
    readers: Option<usize>,

    /// Override the number of process workers.
    #[arg(long)]
    processors: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();

    let cli = Cli::parse();
    let mut settings = WorkerSettings::load().context("failed to load worker settings")?;

    if let Some(queue_url) = cli.queue_url {
        settings.queue_url = queue_url;
    }
    if let Some(readers) = cli.readers {
        settings.read_worker_count = readers;
    }
    if let Some(processors) = cli.processors {
        settings.process_worker_count = processors;
    }

    if settings.queue_url.is_empty() {
        anyhow::bail!("queue_url must be set via --queue-url, relayq.toml, or RELAYQ_QUEUE_URL");
    }

    let remote = Arc::new(
        SqsRemoteQueue::connect(
            settings.queue_url.clone(),
            settings.queue_name.clone(),
            settings.visibility_timeout(),
        )
        .await,
    );

    // Task registration is application-specific; a real deployment links in its own crate of
    // task implementations and registers them here before `start()`.
    let registry = Arc::new(TaskRegistry::new());

    let mut manager = ManagerWorker::new(settings.to_manager_config(), remote, registry);
    manager.start();

    let supervision_outcome = tokio::select! {
        result = run_supervisor(&mut manager) => Some(result),
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            None
        }
    };

    // Always attempt a graceful drain, even when supervision failed fatally, so in-flight work
    // gets a chance to finish before the process exits non-zero.
    manager.shutdown().await;
    if let Some(result) = supervision_outcome {
        result?;
    }
    Ok(())
}

async fn run_supervisor(manager: &mut ManagerWorker) -> Result<()> {
    manager.supervise().await.context("worker supervision failed")
}

/// Wait for either Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
