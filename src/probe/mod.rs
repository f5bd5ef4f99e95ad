//! Reachability Probes
//!
//! Stateless network checks (ping, TCP connect) and the wake-on-LAN
//! sender. Every probe is fail-closed: any error, timeout or DNS failure
//! reads as "unreachable", never as an error surfaced to a status listing.

pub mod net;
pub mod wol;

pub use net::{ping, tcp_check, tcp_latency, DEFAULT_PING_TIMEOUT, DEFAULT_TCP_TIMEOUT};
pub use wol::{magic_packet, send_magic_packet, wait_until_awake, WolError};
