//! SSH transport layer built on russh.
//!
//! Relay sessions go through here: [`client::connect`] resolves credentials
//! and authenticates, [`shell::spawn_shell`] opens the PTY channel and hands
//! back the worker queues. Host keys are accepted after logging their
//! fingerprint; strict verification is the job of the system ssh client,
//! which is what interactive `connect` shells out to.

pub mod agent;
pub mod client;
pub mod error;
pub mod shell;

pub use agent::{is_agent_available, SshAgentClient};
pub use client::{connect, default_auth_sources, AuthSource, HostAcceptor, SshTarget};
pub use error::SshError;
pub use shell::{spawn_shell, ShellCommand, ShellHandle};
