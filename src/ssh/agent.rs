//! SSH agent authentication.
//!
//! Talks to the system agent over `SSH_AUTH_SOCK` (Unix) or the OpenSSH
//! named pipe (Windows) and delegates challenge signing to it. Tried after
//! an explicit identity file and before any stored password.

use std::future::Future;

use russh::client::Handle;
use russh::keys::agent::client::{AgentClient, AgentStream};
use russh::keys::ssh_key;
use russh::{AgentAuthError, CryptoVec, Signer};
use tracing::{debug, info, warn};

use super::client::HostAcceptor;
use super::error::SshError;

/// Agent connection with a type-erased stream, so one type covers both the
/// Unix socket and the Windows named pipe.
type DynAgent = AgentClient<Box<dyn AgentStream + Send + Unpin + 'static>>;

#[cfg(windows)]
const OPENSSH_AGENT_PIPE: &str = r"\\.\pipe\openssh-ssh-agent";

/// [`Signer`] wrapper that clones the borrowed `PublicKey` to an owned value
/// before the async block, so the returned future captures no cross-`.await`
/// borrow of a local (russh's built-in impl trips rust-lang/rust#100013 here).
struct AgentSigner<'a> {
    agent: &'a mut DynAgent,
}

impl Signer for AgentSigner<'_> {
    type Error = AgentAuthError;

    fn auth_publickey_sign(
        &mut self,
        key: &ssh_key::PublicKey,
        hash_alg: Option<ssh_key::HashAlg>,
        to_sign: CryptoVec,
    ) -> impl Future<Output = Result<CryptoVec, Self::Error>> + Send {
        let key_owned = key.clone();
        async move {
            self.agent
                .sign_request(&key_owned, hash_alg, to_sign)
                .await
                .map_err(Into::into)
        }
    }
}

#[cfg(unix)]
async fn platform_connect() -> Result<DynAgent, String> {
    AgentClient::connect_env().await.map(|a| a.dynamic()).map_err(|e| {
        format!("cannot reach SSH agent: {e}. Is SSH_AUTH_SOCK set and ssh-agent running?")
    })
}

#[cfg(windows)]
async fn platform_connect() -> Result<DynAgent, String> {
    AgentClient::connect_named_pipe(OPENSSH_AGENT_PIPE)
        .await
        .map(|a| a.dynamic())
        .map_err(|e| {
            format!(
                "cannot reach SSH agent named pipe: {e}. \
                 Is the OpenSSH Authentication Agent service running?"
            )
        })
}

#[cfg(not(any(unix, windows)))]
async fn platform_connect() -> Result<DynAgent, String> {
    Err("SSH agent is not supported on this platform".to_string())
}

/// Client for the system SSH agent.
pub struct SshAgentClient {
    agent: DynAgent,
}

impl SshAgentClient {
    /// Connect to the running agent.
    pub async fn connect() -> Result<Self, SshError> {
        let agent = platform_connect()
            .await
            .map_err(SshError::AgentNotAvailable)?;
        debug!("connected to SSH agent");
        Ok(Self { agent })
    }

    /// Number of identities the agent currently holds.
    pub async fn identity_count(&mut self) -> Result<usize, SshError> {
        Ok(self.identities().await?.len())
    }

    /// Try every agent-held key against the server until one is accepted.
    pub async fn authenticate(
        &mut self,
        handle: &mut Handle<HostAcceptor>,
        username: &str,
    ) -> Result<(), SshError> {
        let keys = self.identities().await?;
        if keys.is_empty() {
            return Err(SshError::Agent(
                "agent holds no keys; add one with ssh-add".to_string(),
            ));
        }
        debug!("agent holds {} key(s)", keys.len());

        let mut failures: Vec<String> = Vec::new();
        for key in &keys {
            match handle
                .authenticate_publickey_with(
                    username,
                    key.clone(),
                    None,
                    &mut AgentSigner {
                        agent: &mut self.agent,
                    },
                )
                .await
            {
                Ok(result) if result.success() => {
                    info!("agent key {} ({}) accepted", key.comment(), key.algorithm());
                    return Ok(());
                }
                Ok(_rejected) => failures.push(format!("{} rejected", key.comment())),
                Err(e) => {
                    warn!("agent signing failed for {}: {}", key.comment(), e);
                    failures.push(format!("{}: {}", key.comment(), e));
                }
            }
        }

        Err(SshError::Agent(format!(
            "no agent key accepted ({})",
            failures.join("; ")
        )))
    }

    async fn identities(&mut self) -> Result<Vec<ssh_key::PublicKey>, SshError> {
        self.agent
            .request_identities()
            .await
            .map_err(|e| SshError::Agent(format!("cannot list agent keys: {e}")))
    }
}

/// Quick pre-check for agent presence. A `true` here does not guarantee
/// that a connection will succeed.
pub fn is_agent_available() -> bool {
    #[cfg(unix)]
    {
        std::env::var("SSH_AUTH_SOCK").is_ok()
    }

    #[cfg(windows)]
    {
        true
    }

    #[cfg(not(any(unix, windows)))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_without_agent_reports_unavailable() {
        if is_agent_available() {
            // A real agent is running; nothing to assert about the failure path.
            return;
        }
        match SshAgentClient::connect().await {
            Err(SshError::AgentNotAvailable(_)) => {}
            Ok(_) => panic!("connected although no agent socket is advertised"),
            Err(e) => panic!("unexpected error type: {:?}", e),
        }
    }
}
