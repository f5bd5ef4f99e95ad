//! Live Status Engine
//!
//! Answers "is this profile reachable" for whole profile collections
//! without serializing on network latency: probes fan out concurrently
//! under a wall-clock budget, and a monitor mode re-probes on an interval
//! until cancelled. Results are ephemeral; nothing is cached across
//! cycles or written back into profiles.

pub mod engine;
pub mod monitor;

pub use engine::{ProbeConfig, StatusEngine, StatusSnapshot};
pub use monitor::{clamp_interval, StatusMonitor, DEFAULT_MONITOR_INTERVAL};
