//! Launching external tools: the system ssh and scp clients, the platform
//! RDP client, and a small catalogue of canned remote diagnostics.

pub mod catalog;
pub mod launch;
pub mod runner;

pub use catalog::{Diagnostic, DIAGNOSTICS, HARDENING_CHECKLIST};
pub use launch::{
    forward, launch_rdp, mini_top, open_shell, run_diagnostic, transfer, TransferDirection,
};
pub use runner::{run_interactive, spawn_detached, ExecError};
