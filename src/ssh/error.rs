//! Errors raised while establishing and driving relay shells.

use thiserror::Error;

/// Failure modes of the russh-backed transport. Connect, auth and channel
/// problems stay distinct so relay `error` frames can name the stage that
/// failed. `client::Handler` requires the error type to absorb raw russh
/// errors; those surface as connection failures.
#[derive(Error, Debug)]
pub enum SshError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("channel setup failed: {0}")]
    Channel(String),

    #[error("unusable key: {0}")]
    Key(String),

    #[error("ssh agent not available: {0}")]
    AgentNotAvailable(String),

    #[error("ssh agent failure: {0}")]
    Agent(String),
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::ConnectionFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_stage_that_failed() {
        let e = SshError::AuthenticationFailed("key rejected".to_string());
        assert_eq!(e.to_string(), "authentication failed: key rejected");
        assert!(SshError::Timeout("handshake".to_string())
            .to_string()
            .starts_with("timed out"));
    }
}
