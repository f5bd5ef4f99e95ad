//! Telemetry agent for hostlink-managed hosts.
//!
//! Serves host metrics over plain HTTP on the LAN:
//! - `GET /health`: liveness and version
//! - `GET /metrics`: cpu/memory/disk/network sample
//! - `GET /files?path=`: directory listing
//! - `GET /processes`: process table snapshot
//! - `POST /execute`: always refused; the agent is read-only

mod metrics;
mod protocol;
mod routes;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_BIND: &str = "0.0.0.0:9876";

#[derive(Debug, Parser)]
#[command(
    name = "hostlink-agent",
    version,
    about = "Telemetry agent for hostlink-managed hosts"
)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = DEFAULT_BIND, env = "HOSTLINK_AGENT_BIND")]
    bind: String,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!(
        "hostlink-agent v{} listening on http://{}",
        routes::VERSION,
        listener.local_addr()?
    );

    axum::serve(listener, routes::build_router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
