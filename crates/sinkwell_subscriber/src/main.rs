//! Sinkwell subscriber binary.
//!
//! Usage:
//!     sinkwell-subscriber tcp://127.0.0.1:7700

use clap::Parser;
use sinkwell_subscriber::{ServerConfig, ShapeCatalog, SubscriberHandler, SubscriberServer};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sinkwell-subscriber", about = "Pipeline data-sink subscriber")]
struct Args {
    /// Listen address for orchestrator connections
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sinkwell_subscriber=info,sinkwell_sink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("Starting Sinkwell subscriber");
    tracing::info!("  Listen: {}", args.listen);

    let handler = Arc::new(SubscriberHandler::new(ShapeCatalog::default()));
    let config = ServerConfig {
        bind_addr: args.listen,
    };

    // Bind and run
    let (server, shutdown_tx) = SubscriberServer::bind(config, handler).await?;
    let server_task = tokio::spawn(server.run());

    tracing::info!("CTRL-C to close");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down.");

    let _ = shutdown_tx.send(()).await;
    server_task.await??;

    Ok(())
}
