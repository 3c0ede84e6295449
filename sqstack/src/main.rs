//! sqstack - local SQS emulator
//!
//! Serves a fixed set of in-memory queues, declared in the configuration
//! file, over the SQS query and JSON protocols.

mod config;
mod router;

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sqstack_sqs::Sqs;

#[derive(Parser, Debug)]
#[command(name = "sqstack")]
#[command(about = "Local SQS emulator", long_about = None)]
struct Args {
    /// Configuration file (yaml, toml or json); defaults to ./sqstack.* if present
    #[arg(short, long, env = "SQSTACK_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the configuration file)
    #[arg(short, long, env = "SQSTACK_PORT")]
    port: Option<u16>,

    /// Host to bind to (overrides the configuration file)
    #[arg(long, env = "SQSTACK_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SQSTACK_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "sqstack={level},sqstack_sqs={level},tower_http=debug",
                    level = args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load(args.config.as_deref())
        .context("failed to load configuration")?;

    info!("Starting sqstack...");
    info!(
        region = %config.sqs.region,
        account = %config.sqs.account_id,
        queues = config.sqs.queues.len(),
        "SQS"
    );

    let sqs = Arc::new(Sqs::bootstrap(&config.sqs).context("failed to create queues")?);

    // Create router
    let app = router::create_router(Arc::clone(&sqs));

    // Start server
    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sqs.shutdown().await;
    info!("sqstack stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
