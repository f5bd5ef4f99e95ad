//! Client side of the deployable telemetry agent (`hostlink-agent`).

pub mod client;
pub mod protocol;

pub use client::{AgentClient, AgentError, DEFAULT_AGENT_PORT};
pub use protocol::{HealthResponse, MetricsResponse, ProcessesResponse};
