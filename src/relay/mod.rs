//! The session relay: a token-gated WebSocket endpoint that multiplexes
//! interactive SSH sessions over a single connection.
//!
//! - [`protocol`] defines the JSON frames exchanged with clients.
//! - [`registry`] tracks live sessions and enforces the lifecycle.
//! - [`session`] opens SSH shells and pumps their output back out.
//! - [`server`] ties it together around a Tokio accept loop.

pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use protocol::{ClientMessage, ServerMessage};
pub use registry::{RelayError, SessionRegistry, SessionState, SessionSummary};
pub use server::{generate_token, validate_token, RelayConfig, RelayServer, DEFAULT_BIND};
