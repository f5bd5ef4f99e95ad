//! Argv construction and launch flows for the system ssh, scp and RDP
//! clients.

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::config::{RdpProfile, SshProfile};
use crate::validate::{sanitize_path, validate_hostname, validate_port};

use super::catalog::Diagnostic;
use super::runner::{run_interactive, spawn_detached, ExecError};

/// Refresh interval of the live `top` view.
pub const MINI_TOP_INTERVAL: Duration = Duration::from_secs(3);

/// Remote command behind the `top` view; falls back to `ps` where `top`
/// is unavailable.
pub const MINI_TOP_COMMAND: &str =
    "top -b -n1 | head -n 10 || (ps aux --sort=-%mem | head -n 10)";

fn ssh_destination(user: Option<&str>, host: &str) -> String {
    match user {
        Some(user) => format!("{}@{}", user, host),
        None => host.to_string(),
    }
}

/// `ssh -p <port> [user@]host`
pub fn ssh_argv(profile: &SshProfile) -> Vec<String> {
    vec![
        "ssh".to_string(),
        "-p".to_string(),
        profile.port.to_string(),
        ssh_destination(profile.user.as_deref(), &profile.host),
    ]
}

/// `ssh -p <port> [user@]host <command>`
pub fn ssh_command_argv(profile: &SshProfile, command: &str) -> Vec<String> {
    let mut argv = ssh_argv(profile);
    argv.push(command.to_string());
    argv
}

/// `ssh -L <local>:<remote_host>:<remote_port> -p <port> [user@]host`
pub fn forward_argv(
    profile: &SshProfile,
    local_port: u16,
    remote_host: &str,
    remote_port: u16,
) -> Vec<String> {
    vec![
        "ssh".to_string(),
        "-L".to_string(),
        format!("{}:{}:{}", local_port, remote_host, remote_port),
        "-p".to_string(),
        profile.port.to_string(),
        ssh_destination(profile.user.as_deref(), &profile.host),
    ]
}

/// Direction of an scp transfer, seen from the local machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Upload,
    Download,
}

/// `scp [-r] -P <port> <source> <dest>` with the remote side spelled
/// `[user@]host:path`.
pub fn scp_argv(
    profile: &SshProfile,
    direction: TransferDirection,
    recursive: bool,
    local: &Path,
    remote: &str,
) -> Vec<String> {
    let remote_spec = format!(
        "{}:{}",
        ssh_destination(profile.user.as_deref(), &profile.host),
        remote
    );
    let local = local.to_string_lossy().into_owned();

    let mut argv = vec!["scp".to_string()];
    if recursive {
        argv.push("-r".to_string());
    }
    argv.push("-P".to_string());
    argv.push(profile.port.to_string());
    match direction {
        TransferDirection::Upload => {
            argv.push(local);
            argv.push(remote_spec);
        }
        TransferDirection::Download => {
            argv.push(remote_spec);
            argv.push(local);
        }
    }
    argv
}

/// `mstsc /v:<host>:<port> /f`
pub fn rdp_argv(profile: &RdpProfile) -> Vec<String> {
    vec![
        "mstsc".to_string(),
        format!("/v:{}:{}", profile.host, profile.port),
        "/f".to_string(),
    ]
}

/// Opens an interactive shell with the system ssh client and stays attached
/// until it exits.
pub async fn open_shell(profile: &SshProfile) -> Result<(), ExecError> {
    validate_hostname(&profile.host)?;
    run_interactive(&ssh_argv(profile)).await
}

/// Runs one catalogued diagnostic on the host.
pub async fn run_diagnostic(
    profile: &SshProfile,
    diagnostic: &Diagnostic,
) -> Result<(), ExecError> {
    validate_hostname(&profile.host)?;
    run_interactive(&ssh_command_argv(profile, diagnostic.remote_command)).await
}

/// Copies a file or directory with scp. The local path is sanitized first;
/// uploads require it to exist, downloads require its parent directory to.
pub async fn transfer(
    profile: &SshProfile,
    direction: TransferDirection,
    recursive: bool,
    local: &str,
    remote: &str,
) -> Result<(), ExecError> {
    validate_hostname(&profile.host)?;
    let local = sanitize_path(local)?;

    match direction {
        TransferDirection::Upload => {
            if !local.exists() {
                return Err(ExecError::MissingLocal(local));
            }
        }
        TransferDirection::Download => {
            if let Some(parent) = local.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(ExecError::MissingLocal(parent.to_path_buf()));
                }
            }
        }
    }

    run_interactive(&scp_argv(profile, direction, recursive, &local, remote)).await
}

/// Opens an ssh tunnel `localhost:<local_port> -> <remote_host>:<remote_port>`
/// through the profile's host and stays attached until ssh exits.
pub async fn forward(
    profile: &SshProfile,
    local_port: u16,
    remote_host: &str,
    remote_port: u16,
) -> Result<(), ExecError> {
    validate_hostname(&profile.host)?;
    validate_hostname(remote_host)?;
    validate_port(local_port)?;
    validate_port(remote_port)?;

    info!(
        "tunnel localhost:{} -> {}:{} via {}",
        local_port, remote_host, remote_port, profile.host
    );
    run_interactive(&forward_argv(profile, local_port, remote_host, remote_port)).await
}

/// Starts the platform RDP client detached.
pub fn launch_rdp(profile: &RdpProfile) -> Result<(), ExecError> {
    validate_hostname(&profile.host)?;
    info!("starting RDP client for {}:{}", profile.host, profile.port);
    spawn_detached(&rdp_argv(profile))
}

/// Re-runs [`MINI_TOP_COMMAND`] every [`MINI_TOP_INTERVAL`] until ctrl-c.
/// Remote failures print through the inherited stderr and do not end the
/// loop; only a failure to start ssh does.
pub async fn mini_top(profile: &SshProfile) -> Result<(), ExecError> {
    validate_hostname(&profile.host)?;
    let argv = ssh_command_argv(profile, MINI_TOP_COMMAND);

    loop {
        match run_interactive(&argv).await {
            Err(e @ ExecError::Spawn { .. }) => return Err(e),
            Err(ExecError::Interrupted { .. }) => return Ok(()),
            _ => {}
        }
        tokio::select! {
            _ = tokio::time::sleep(MINI_TOP_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
