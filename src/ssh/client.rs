//! SSH client transport built on russh.
//!
//! Owns the connect-and-authenticate sequence for relay sessions: resolve
//! the target, complete the handshake under a timeout, then walk the
//! credential sources in order until the server accepts one.

use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::ssh_key::HashAlg;
use russh::keys::PublicKey;
use tracing::{debug, info, warn};

use super::agent::{is_agent_available, SshAgentClient};
use super::error::SshError;

/// Ceiling on TCP connect plus SSH handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to connect and as whom.
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
}

/// One credential source. Sources are tried in the order handed to [`connect`];
/// the first one the server accepts wins.
#[derive(Clone)]
pub enum AuthSource {
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    Agent,
    Password(String),
}

impl AuthSource {
    fn label(&self) -> &'static str {
        match self {
            AuthSource::KeyFile { .. } => "key file",
            AuthSource::Agent => "agent",
            AuthSource::Password(_) => "password",
        }
    }
}

/// Host key callback that accepts every server key after logging its SHA256
/// fingerprint. Equivalent to `ssh -o StrictHostKeyChecking=no`.
pub struct HostAcceptor {
    host: String,
    port: u16,
}

impl client::Handler for HostAcceptor {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        warn!(
            "accepting host key for {}:{} without verification (fingerprint {})",
            self.host,
            self.port,
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        Ok(true)
    }
}

/// Build the credential chain in resolution order: the identity file when it
/// exists on disk, then the agent when one is advertised, then the stored
/// password when there is one.
pub fn default_auth_sources(key_path: Option<&Path>, password: Option<String>) -> Vec<AuthSource> {
    let mut sources = Vec::new();
    if let Some(path) = key_path.filter(|p| p.exists()) {
        sources.push(AuthSource::KeyFile {
            path: path.to_path_buf(),
            passphrase: None,
        });
    }
    if is_agent_available() {
        sources.push(AuthSource::Agent);
    }
    if let Some(password) = password {
        sources.push(AuthSource::Password(password));
    }
    sources
}

/// Open a TCP connection, complete the SSH handshake, and authenticate.
pub async fn connect(
    target: &SshTarget,
    sources: &[AuthSource],
) -> Result<client::Handle<HostAcceptor>, SshError> {
    let addr = format!("{}:{}", target.host, target.port);
    info!("connecting to {} as {}", addr, target.username);

    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| SshError::ConnectionFailed(format!("failed to resolve {}: {}", addr, e)))?
        .next()
        .ok_or_else(|| SshError::ConnectionFailed(format!("no address found for {}", addr)))?;

    let config = client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    };

    let handler = HostAcceptor {
        host: target.host.clone(),
        port: target.port,
    };

    let mut handle = tokio::time::timeout(
        CONNECT_TIMEOUT,
        client::connect(Arc::new(config), socket_addr, handler),
    )
    .await
    .map_err(|_| SshError::Timeout(format!("connection to {} timed out", addr)))?
    .map_err(|e| SshError::ConnectionFailed(e.to_string()))?;

    debug!("SSH handshake completed with {}", addr);

    let mut failures: Vec<String> = Vec::new();
    for source in sources {
        match try_source(&mut handle, &target.username, source).await {
            Ok(()) => {
                info!("authenticated to {} via {}", addr, source.label());
                return Ok(handle);
            }
            Err(e) => {
                debug!("{} authentication failed for {}: {}", source.label(), addr, e);
                failures.push(format!("{}: {}", source.label(), e));
            }
        }
    }

    if failures.is_empty() {
        return Err(SshError::AuthenticationFailed(
            "no credential source available".to_string(),
        ));
    }
    Err(SshError::AuthenticationFailed(failures.join("; ")))
}

async fn try_source(
    handle: &mut client::Handle<HostAcceptor>,
    username: &str,
    source: &AuthSource,
) -> Result<(), SshError> {
    match source {
        AuthSource::KeyFile { path, passphrase } => {
            let key = russh::keys::load_secret_key(path, passphrase.as_deref())
                .map_err(|e| SshError::Key(e.to_string()))?;
            let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), None);
            let result = handle
                .authenticate_publickey(username, key_with_hash)
                .await
                .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?;
            if result.success() {
                Ok(())
            } else {
                Err(SshError::AuthenticationFailed(
                    "key rejected by server".to_string(),
                ))
            }
        }
        AuthSource::Agent => {
            let mut agent = SshAgentClient::connect().await?;
            agent.authenticate(handle, username).await
        }
        AuthSource::Password(password) => {
            let result = handle
                .authenticate_password(username, password)
                .await
                .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?;
            if result.success() {
                Ok(())
            } else {
                Err(SshError::AuthenticationFailed(
                    "password rejected by server".to_string(),
                ))
            }
        }
    }
}
