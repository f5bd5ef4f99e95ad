//! Relay wire protocol.
//!
//! JSON text frames, internally tagged on `type`. Clients drive sessions
//! with `open`/`input`/`resize`/`close`; the server answers with
//! `opened`/`output`/`error`/`closed`. Output data is text: shell bytes are
//! decoded with lossy UTF-8 replacement before they reach the wire.

use serde::{Deserialize, Serialize};

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

fn default_cols() -> u16 {
    DEFAULT_COLS
}

fn default_rows() -> u16 {
    DEFAULT_ROWS
}

/// Frames the client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Start a session for a named SSH profile. The server generates a
    /// session id when the client does not supply one.
    Open {
        profile_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default = "default_cols")]
        cols: u16,
        #[serde(default = "default_rows")]
        rows: u16,
    },
    /// Keystrokes for a running session.
    Input { session_id: String, data: String },
    /// New PTY geometry.
    Resize {
        session_id: String,
        cols: u16,
        rows: u16,
    },
    /// Orderly teardown. Unknown ids are acknowledged with `closed`.
    Close { session_id: String },
}

/// Frames the relay sends to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The session reached OPEN; input is accepted from here on.
    Opened { session_id: String },
    /// A chunk of shell output, in the order it was read.
    Output { session_id: String, data: String },
    /// A request failed. `session_id` is present when the failure concerns
    /// one session rather than the connection.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        message: String,
    },
    /// The session is gone, whether by request, remote EOF, or error.
    Closed { session_id: String },
}

impl ServerMessage {
    pub fn error(session_id: Option<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            session_id,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_accepts_minimal_form() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"open","profile_name":"web"}"#).unwrap();
        match msg {
            ClientMessage::Open {
                profile_name,
                session_id,
                cols,
                rows,
            } => {
                assert_eq!(profile_name, "web");
                assert_eq!(session_id, None);
                assert_eq!(cols, DEFAULT_COLS);
                assert_eq!(rows, DEFAULT_ROWS);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn open_accepts_explicit_id_and_geometry() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"open","profile_name":"web","session_id":"s1","cols":120,"rows":40}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Open {
                profile_name: "web".to_string(),
                session_id: Some("s1".to_string()),
                cols: 120,
                rows: 40,
            }
        );
    }

    #[test]
    fn client_variants_round_trip() {
        let messages = vec![
            ClientMessage::Input {
                session_id: "s1".to_string(),
                data: "ls -la\n".to_string(),
            },
            ClientMessage::Resize {
                session_id: "s1".to_string(),
                cols: 132,
                rows: 43,
            },
            ClientMessage::Close {
                session_id: "s1".to_string(),
            },
        ];
        for msg in messages {
            let text = serde_json::to_string(&msg).unwrap();
            let back: ClientMessage = serde_json::from_str(&text).unwrap();
            assert_eq!(back, msg);
        }
    }

    #[test]
    fn server_frames_have_expected_shape() {
        let opened = serde_json::to_string(&ServerMessage::Opened {
            session_id: "s1".to_string(),
        })
        .unwrap();
        assert_eq!(opened, r#"{"type":"opened","session_id":"s1"}"#);

        let closed = serde_json::to_string(&ServerMessage::Closed {
            session_id: "s1".to_string(),
        })
        .unwrap();
        assert_eq!(closed, r#"{"type":"closed","session_id":"s1"}"#);

        let output = serde_json::to_string(&ServerMessage::Output {
            session_id: "s1".to_string(),
            data: "hello\r\n".to_string(),
        })
        .unwrap();
        assert!(output.starts_with(r#"{"type":"output""#));
    }

    #[test]
    fn error_omits_absent_session_id() {
        let text = serde_json::to_string(&ServerMessage::error(None, "bad token")).unwrap();
        assert_eq!(text, r#"{"type":"error","message":"bad token"}"#);

        let text =
            serde_json::to_string(&ServerMessage::error(Some("s1".to_string()), "boom")).unwrap();
        assert!(text.contains(r#""session_id":"s1""#));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let parsed = serde_json::from_str::<ClientMessage>(r#"{"type":"shutdown"}"#);
        assert!(parsed.is_err());
    }
}
