//! hostlink - personal SSH/RDP host-connection manager
//!
//! The library carries all behavior: the profile registry, reachability
//! probes, the live status engine, the WebSocket terminal relay and the
//! external-tool launchers. The `hostlink` binary is a thin clap surface
//! over it; `hostlink-agent` (the `agent` workspace member) is the
//! deployable telemetry probe it can query.

// The relay churns through small short-lived allocations (frames, probe
// futures); mimalloc handles that pattern well.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod agent;
pub mod audit;
pub mod cli;
pub mod config;
pub mod exec;
pub mod probe;
pub mod relay;
pub mod ssh;
pub mod status;
pub mod validate;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the tracing subscriber; env filter, `info` by default.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
