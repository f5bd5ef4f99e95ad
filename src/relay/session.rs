//! Per-session bridge between a relay connection and a remote shell.
//!
//! [`establish`] runs once per `open` request: resolve the profile, connect
//! over SSH, spawn the shell worker, then hand the output side to a pump
//! task. The pump forwards each chunk from the worker's queue into the
//! connection's outgoing queue as an `output` frame; a `None` from the
//! worker means the shell ended, so the pump removes the session from the
//! registry and emits the final `closed` frame.

use std::sync::Arc;

use russh::client::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::protocol::ServerMessage;
use super::registry::{RelayError, SessionRegistry, SessionState};
use crate::audit::{EventKind, SessionLog};
use crate::config::model::SshProfile;
use crate::config::{ssh_config, Keychain, ProfileStore};
use crate::ssh::{self, HostAcceptor, ShellCommand, ShellHandle, SshTarget};

/// Everything an `open` frame resolved to.
pub struct OpenRequest {
    pub id: String,
    pub profile_name: String,
    pub cols: u16,
    pub rows: u16,
}

fn resolve_ssh_profile(store: &ProfileStore, name: &str) -> Result<SshProfile, RelayError> {
    let doc = store.load()?;
    if let Some(profile) = doc.ssh.get(name) {
        return Ok(profile.clone());
    }
    if doc.rdp.contains_key(name) {
        return Err(RelayError::NotSshProfile(name.to_string()));
    }
    Err(RelayError::ProfileNotFound(name.to_string()))
}

/// Take a reserved session through CONNECTING to OPEN.
///
/// On success the `opened` frame has been sent and the output pump is
/// running; every later frame for this session comes from the pump. On
/// error the registry entry is still present (in INIT or CONNECTING) and
/// the caller discards it.
pub async fn establish(
    registry: Arc<SessionRegistry>,
    store: Arc<ProfileStore>,
    keychain: Arc<Keychain>,
    audit: Arc<SessionLog>,
    out_tx: mpsc::Sender<ServerMessage>,
    request: OpenRequest,
) -> Result<(), RelayError> {
    let OpenRequest {
        id,
        profile_name,
        cols,
        rows,
    } = request;

    registry.advance(&id, SessionState::Connecting)?;

    let profile = resolve_ssh_profile(&store, &profile_name)?;
    let target = SshTarget {
        host: profile.host.clone(),
        port: profile.port,
        username: profile.user.clone().unwrap_or_else(whoami::username),
    };

    let password = keychain.get(&profile_name).ok();
    let sources = ssh::default_auth_sources(ssh_config::default_identity_path().as_deref(), password);

    let handle = ssh::connect(&target, &sources).await?;
    let shell = ssh::spawn_shell(&handle, &id, cols, rows).await?;

    if let Err(e) = registry.attach_shell(&id, shell.cmd_tx.clone()) {
        // Closed out from under us while connecting; wind the shell down quietly.
        debug!("session {} vanished during connect: {}", id, e);
        let _ = shell.cmd_tx.try_send(ShellCommand::Close);
        return Ok(());
    }

    audit.record(EventKind::SshConnect, &profile_name, None);
    info!("session {} opened for profile {}", id, profile_name);

    if out_tx
        .send(ServerMessage::Opened {
            session_id: id.clone(),
        })
        .await
        .is_err()
    {
        // Client connection died before the session opened.
        let _ = shell.cmd_tx.try_send(ShellCommand::Close);
        registry.finish(&id);
        return Ok(());
    }

    spawn_output_pump(registry, out_tx, id, handle, shell);
    Ok(())
}

/// Forward shell output into the connection's outgoing queue until the
/// worker exits, then clean up. The SSH transport handle lives inside this
/// task so the connection stays up exactly as long as the session.
fn spawn_output_pump(
    registry: Arc<SessionRegistry>,
    out_tx: mpsc::Sender<ServerMessage>,
    id: String,
    handle: Handle<HostAcceptor>,
    mut shell: ShellHandle,
) {
    tokio::spawn(async move {
        let _transport = handle;

        while let Some(chunk) = shell.output_rx.recv().await {
            let data = String::from_utf8_lossy(&chunk).into_owned();
            if out_tx
                .send(ServerMessage::Output {
                    session_id: id.clone(),
                    data,
                })
                .await
                .is_err()
            {
                // Client connection gone; stop the worker and bail out.
                let _ = shell.cmd_tx.try_send(ShellCommand::Close);
                break;
            }
        }

        registry.finish(&id);
        let _ = out_tx
            .send(ServerMessage::Closed {
                session_id: id.clone(),
            })
            .await;
        debug!("output pump finished for session {}", id);
    });
}
