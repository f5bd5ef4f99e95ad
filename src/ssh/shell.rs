//! Interactive shell channel driver.
//!
//! One worker task owns the russh channel for the whole life of a session.
//! Input and control arrive over a command queue; everything the remote
//! side writes is published, in the order it was read, to a bounded output
//! queue that the relay dispatcher drains.

use bytes::Bytes;
use russh::client::Handle;
use russh::ChannelMsg;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::client::HostAcceptor;
use super::error::SshError;

/// Terminal type requested for the PTY.
pub const TERM: &str = "xterm-256color";

const CMD_CHANNEL_CAPACITY: usize = 1024;
const OUTPUT_CHANNEL_CAPACITY: usize = 1024;

/// Commands accepted by a running shell worker.
#[derive(Debug)]
pub enum ShellCommand {
    /// Bytes for the remote stdin.
    Data(Vec<u8>),
    /// New PTY geometry (cols, rows).
    Resize(u16, u16),
    /// Terminate the shell.
    Close,
}

/// Handle to a running shell worker.
///
/// The worker drops its output sender when it exits, so a `None` from
/// `output_rx` means the shell is gone, whether by remote EOF, channel
/// close, or an explicit [`ShellCommand::Close`].
pub struct ShellHandle {
    pub cmd_tx: mpsc::Sender<ShellCommand>,
    pub output_rx: mpsc::Receiver<Bytes>,
    pub worker: JoinHandle<()>,
}

/// Open a session channel with a PTY and an interactive shell, then spawn
/// the worker that owns the channel.
pub async fn spawn_shell(
    handle: &Handle<HostAcceptor>,
    session_id: &str,
    cols: u16,
    rows: u16,
) -> Result<ShellHandle, SshError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| SshError::Channel(format!("channel open failed: {}", e)))?;

    channel
        .request_pty(false, TERM, cols as u32, rows as u32, 0, 0, &[])
        .await
        .map_err(|e| SshError::Channel(format!("PTY request failed: {}", e)))?;

    channel
        .request_shell(false)
        .await
        .map_err(|e| SshError::Channel(format!("shell request failed: {}", e)))?;

    info!("interactive shell started for session {}", session_id);

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<ShellCommand>(CMD_CHANNEL_CAPACITY);
    let (out_tx, output_rx) = mpsc::channel::<Bytes>(OUTPUT_CHANNEL_CAPACITY);

    let sid = session_id.to_string();
    let worker = tokio::spawn(async move {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ShellCommand::Data(data)) => {
                            if let Err(e) = channel.data(&data[..]).await {
                                error!("failed to write to shell for session {}: {}", sid, e);
                                break;
                            }
                        }
                        Some(ShellCommand::Resize(cols, rows)) => {
                            // Geometry is advisory; a failed resize keeps the shell running.
                            if let Err(e) = channel.window_change(cols as u32, rows as u32, 0, 0).await {
                                error!("failed to resize PTY for session {}: {}", sid, e);
                            } else {
                                debug!("PTY resized to {}x{} for session {}", cols, rows, sid);
                            }
                        }
                        // A dropped command sender means the owning connection is gone.
                        Some(ShellCommand::Close) | None => {
                            debug!("closing shell for session {}", sid);
                            let _ = channel.eof().await;
                            break;
                        }
                    }
                }

                msg = channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Data { data }) => {
                            if out_tx.send(Bytes::copy_from_slice(&data)).await.is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                            if out_tx.send(Bytes::copy_from_slice(&data)).await.is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::Eof) => {
                            info!("shell EOF for session {}", sid);
                            break;
                        }
                        Some(ChannelMsg::Close) | None => {
                            info!("shell channel closed for session {}", sid);
                            break;
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            info!("shell exit status {} for session {}", exit_status, sid);
                        }
                        Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                            info!("shell exit signal {:?} for session {}", signal_name, sid);
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        // out_tx drops here; the dispatcher sees end of stream.
        debug!("shell worker terminated for session {}", sid);
    });

    Ok(ShellHandle {
        cmd_tx,
        output_rx,
        worker,
    })
}
