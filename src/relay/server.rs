//! WebSocket relay server.
//!
//! One process-wide token gates the handshake; clients present it as a
//! `?token=` query parameter. Per accepted connection there are exactly two
//! moving parts: a sender task that drains the connection's outgoing queue
//! into the sink (with a timeout so one stuck client cannot wedge the
//! relay), and the dispatch loop below that reads client frames. Session
//! output pumps feed the same outgoing queue, so ordering per session is
//! whatever order the pump published.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use futures_util::{SinkExt, StreamExt};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::protocol::{ClientMessage, ServerMessage};
use super::registry::{RelayError, SessionRegistry, DEFAULT_MAX_SESSIONS};
use super::session::{establish, OpenRequest};
use crate::audit::SessionLog;
use crate::config::{Keychain, ProfileStore};
use crate::ssh::ShellCommand;

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:9822";

/// Outgoing queue depth per connection.
const OUTGOING_CAPACITY: usize = 4096;
/// Ceiling on a single sink write before the client counts as dead.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Token layout: 32 random bytes followed by 8 bytes of mint timestamp.
const TOKEN_RANDOM_LEN: usize = 32;
const TOKEN_TIMESTAMP_LEN: usize = 8;
const TOKEN_TOTAL_LEN: usize = TOKEN_RANDOM_LEN + TOKEN_TIMESTAMP_LEN;

fn unix_timestamp_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Mint the per-run authentication token: Base64(random[32] ‖ timestamp[8]),
/// URL-safe without padding. The timestamp records mint time but carries no
/// expiry; the token is valid for the lifetime of the server process.
pub fn generate_token() -> String {
    let mut data = [0u8; TOKEN_TOTAL_LEN];
    rand::rngs::OsRng.fill_bytes(&mut data[..TOKEN_RANDOM_LEN]);
    data[TOKEN_RANDOM_LEN..].copy_from_slice(&unix_timestamp_secs().to_be_bytes());
    URL_SAFE_NO_PAD.encode(data)
}

/// Constant-time comparison of a presented token against the expected one.
pub fn validate_token(received: &str, expected: &str) -> bool {
    let received = received.trim();
    if received.len() != expected.len() {
        return false;
    }

    let received_bytes = match URL_SAFE_NO_PAD.decode(received) {
        Ok(bytes) if bytes.len() == TOKEN_TOTAL_LEN => bytes,
        _ => return false,
    };
    let expected_bytes = match URL_SAFE_NO_PAD.decode(expected) {
        Ok(bytes) if bytes.len() == TOKEN_TOTAL_LEN => bytes,
        _ => return false,
    };

    bool::from(received_bytes.ct_eq(&expected_bytes))
}

fn token_from_query(query: &str) -> Option<&str> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: String,
    pub max_sessions: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// The relay itself. Construct once, [`bind`](Self::bind), then
/// [`run`](Self::run) on the listener.
pub struct RelayServer {
    store: Arc<ProfileStore>,
    keychain: Arc<Keychain>,
    audit: Arc<SessionLog>,
    registry: Arc<SessionRegistry>,
    config: RelayConfig,
    token: String,
}

impl RelayServer {
    pub fn new(
        config: RelayConfig,
        store: Arc<ProfileStore>,
        keychain: Arc<Keychain>,
        audit: Arc<SessionLog>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::with_max_sessions(config.max_sessions));
        Self {
            store,
            keychain,
            audit,
            registry,
            config,
            token: generate_token(),
        }
    }

    /// The token clients must present. Printed by the `serve` command.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub async fn bind(&self) -> Result<TcpListener, RelayError> {
        let listener = TcpListener::bind(&self.config.bind).await?;
        let addr = listener.local_addr()?;
        info!("relay listening on ws://{}", addr);
        Ok(listener)
    }

    /// Accept loop. Runs until the listener fails or the task is dropped.
    pub async fn run(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("failed to set TCP_NODELAY: {}", e);
                    }
                    debug!("relay connection from {}", addr);
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            debug!("relay connection from {} ended: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    warn!("failed to accept relay connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream) -> Result<(), RelayError> {
        let expected = self.token.clone();
        let callback = move |request: &Request, response: Response| {
            let presented = request.uri().query().and_then(token_from_query);
            match presented {
                Some(token) if validate_token(token, &expected) => Ok(response),
                _ => {
                    warn!("rejecting relay connection: missing or invalid token");
                    let mut reject = ErrorResponse::new(Some("invalid or missing token".to_string()));
                    *reject.status_mut() = StatusCode::UNAUTHORIZED;
                    Err(reject)
                }
            }
        };

        let ws_stream = accept_hdr_async(stream, callback)
            .await
            .map_err(|e| RelayError::Transport(format!("WebSocket handshake failed: {}", e)))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTGOING_CAPACITY);

        // The single dispatcher for everything leaving this connection.
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("failed to encode relay frame: {}", e);
                        continue;
                    }
                };
                match tokio::time::timeout(SEND_TIMEOUT, ws_sender.send(Message::Text(text))).await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!("relay send failed: {}", e);
                        break;
                    }
                    Err(_) => {
                        warn!("relay send timed out, client unresponsive");
                        break;
                    }
                }
            }
            debug!("relay sender stopped");
        });

        // Sessions opened on this connection; torn down when it drops.
        let mut owned: HashSet<String> = HashSet::new();

        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => self.dispatch(msg, &out_tx, &mut owned).await,
                    Err(e) => {
                        let _ = out_tx
                            .send(ServerMessage::error(
                                None,
                                format!("malformed frame: {}", e),
                            ))
                            .await;
                    }
                },
                Ok(Message::Binary(_)) => {
                    let _ = out_tx
                        .send(ServerMessage::error(
                            None,
                            "binary frames are not supported",
                        ))
                        .await;
                }
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    debug!("relay receive error: {}", e);
                    break;
                }
            }
        }

        for id in owned {
            match self.registry.begin_close(&id) {
                Ok(tx) => {
                    let _ = tx.try_send(ShellCommand::Close);
                }
                Err(_) => self.registry.discard(&id),
            }
        }
        debug!("relay connection closed");
        Ok(())
    }

    async fn dispatch(
        &self,
        msg: ClientMessage,
        out_tx: &mpsc::Sender<ServerMessage>,
        owned: &mut HashSet<String>,
    ) {
        match msg {
            ClientMessage::Open {
                profile_name,
                session_id,
                cols,
                rows,
            } => match self.registry.reserve(session_id.clone(), &profile_name) {
                Ok(id) => {
                    owned.insert(id.clone());
                    let registry = Arc::clone(&self.registry);
                    let store = Arc::clone(&self.store);
                    let keychain = Arc::clone(&self.keychain);
                    let audit = Arc::clone(&self.audit);
                    let out_tx = out_tx.clone();
                    // Connecting can take seconds; never block the dispatch loop on it.
                    tokio::spawn(async move {
                        let request = OpenRequest {
                            id: id.clone(),
                            profile_name,
                            cols,
                            rows,
                        };
                        if let Err(e) = establish(
                            Arc::clone(&registry),
                            store,
                            keychain,
                            audit,
                            out_tx.clone(),
                            request,
                        )
                        .await
                        {
                            warn!("failed to open session {}: {}", id, e);
                            registry.discard(&id);
                            let _ = out_tx
                                .send(ServerMessage::error(Some(id), e.to_string()))
                                .await;
                        }
                    });
                }
                Err(e) => {
                    let _ = out_tx
                        .send(ServerMessage::error(session_id, e.to_string()))
                        .await;
                }
            },

            ClientMessage::Input { session_id, data } => {
                match self.registry.cmd_tx(&session_id) {
                    Some(tx) => {
                        if tx.send(ShellCommand::Data(data.into_bytes())).await.is_err() {
                            let _ = out_tx
                                .send(ServerMessage::error(
                                    Some(session_id),
                                    "session worker is gone",
                                ))
                                .await;
                        }
                    }
                    None => {
                        let _ = out_tx
                            .send(ServerMessage::error(
                                Some(session_id),
                                "no open session with that id",
                            ))
                            .await;
                    }
                }
            }

            ClientMessage::Resize {
                session_id,
                cols,
                rows,
            } => match self.registry.cmd_tx(&session_id) {
                Some(tx) => {
                    let _ = tx.send(ShellCommand::Resize(cols, rows)).await;
                }
                None => {
                    let _ = out_tx
                        .send(ServerMessage::error(
                            Some(session_id),
                            "no open session with that id",
                        ))
                        .await;
                }
            },

            ClientMessage::Close { session_id } => {
                match self.registry.begin_close(&session_id) {
                    // The final `closed` frame comes from the output pump.
                    Ok(tx) => {
                        let _ = tx.send(ShellCommand::Close).await;
                    }
                    // Unknown or never-opened ids: acknowledge and move on.
                    Err(_) => {
                        self.registry.discard(&session_id);
                        let _ = out_tx.send(ServerMessage::Closed { session_id }).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::connect_async;

    fn test_server() -> (tempfile::TempDir, Arc<RelayServer>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ProfileStore::with_path(dir.path().join("doc.json")));
        let audit = Arc::new(SessionLog::new(dir.path().join("audit.log")));
        let config = RelayConfig {
            bind: "127.0.0.1:0".to_string(),
            max_sessions: 4,
        };
        let server = Arc::new(RelayServer::new(
            config,
            store,
            Arc::new(Keychain::new()),
            audit,
        ));
        (dir, server)
    }

    async fn start(server: Arc<RelayServer>) -> std::net::SocketAddr {
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server.run(listener));
        addr
    }

    #[test]
    fn tokens_validate_and_reject_tampering() {
        let token = generate_token();
        assert!(validate_token(&token, &token));
        assert!(validate_token(&format!("  {}  ", token), &token));

        let mut tampered = token.clone().into_bytes();
        tampered[0] = if tampered[0] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(!validate_token(&tampered, &token));

        assert!(!validate_token("", &token));
        assert!(!validate_token("not-base64!!!", &token));
    }

    #[test]
    fn token_is_extracted_from_query() {
        assert_eq!(token_from_query("token=abc"), Some("abc"));
        assert_eq!(token_from_query("a=1&token=abc&b=2"), Some("abc"));
        assert_eq!(token_from_query("a=1&b=2"), None);
    }

    #[tokio::test]
    async fn handshake_rejects_bad_token() {
        let (_dir, server) = test_server();
        let addr = start(server).await;

        let result = connect_async(format!("ws://{}/?token=wrong", addr)).await;
        assert!(result.is_err());

        let result = connect_async(format!("ws://{}/", addr)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn close_for_unknown_session_is_acknowledged() {
        let (_dir, server) = test_server();
        let token = server.token().to_string();
        let addr = start(server).await;

        let (mut ws, _) = connect_async(format!("ws://{}/?token={}", addr, token))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"type":"close","session_id":"ghost"}"#.to_string(),
        ))
        .await
        .unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let msg: ServerMessage = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Closed {
                session_id: "ghost".to_string()
            }
        );
    }

    #[tokio::test]
    async fn malformed_frames_get_an_error_reply() {
        let (_dir, server) = test_server();
        let token = server.token().to_string();
        let addr = start(server).await;

        let (mut ws, _) = connect_async(format!("ws://{}/?token={}", addr, token))
            .await
            .unwrap();
        ws.send(Message::Text("not json".to_string())).await.unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let msg: ServerMessage = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::Error {
                session_id: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn open_for_missing_profile_reports_error_and_frees_the_id() {
        let (_dir, server) = test_server();
        let token = server.token().to_string();
        let checker = Arc::clone(&server);
        let addr = start(server).await;

        let (mut ws, _) = connect_async(format!("ws://{}/?token={}", addr, token))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"type":"open","profile_name":"ghost","session_id":"s1"}"#.to_string(),
        ))
        .await
        .unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let msg: ServerMessage = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        match msg {
            ServerMessage::Error {
                session_id,
                message,
            } => {
                assert_eq!(session_id.as_deref(), Some("s1"));
                assert!(message.contains("ghost"));
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        assert_eq!(checker.registry().count(), 0);
    }

    #[tokio::test]
    async fn input_for_unknown_session_reports_error() {
        let (_dir, server) = test_server();
        let token = server.token().to_string();
        let addr = start(server).await;

        let (mut ws, _) = connect_async(format!("ws://{}/?token={}", addr, token))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"type":"input","session_id":"ghost","data":"ls\n"}"#.to_string(),
        ))
        .await
        .unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let msg: ServerMessage = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::Error {
                session_id: Some(_),
                ..
            }
        ));
    }
}
