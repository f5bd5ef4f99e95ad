//! Session registry and lifecycle state machine.
//!
//! Every relay session passes through INIT → CONNECTING → OPEN → CLOSING →
//! CLOSED, with CONNECTING and OPEN allowed to jump straight to CLOSED when
//! the connect fails or the remote side disappears. The registry is the
//! single authority on those transitions; ids stay claimed until [`finish`]
//! or [`discard`] removes them, which is what makes a duplicate `open` for
//! a live id fail without touching the existing session.
//!
//! [`finish`]: SessionRegistry::finish
//! [`discard`]: SessionRegistry::discard

use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::ssh::ShellCommand;

/// Default ceiling on concurrently live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 20;

/// Lifecycle of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Init,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Init, Connecting)
                | (Connecting, Open)
                | (Connecting, Closed)
                | (Open, Closing)
                | (Open, Closed)
                | (Closing, Closed)
        )
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("session limit reached: {current}/{max} live")]
    SessionLimitReached { current: usize, max: usize },

    #[error("session already exists: {0}")]
    DuplicateSession(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid session state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    #[error("no SSH profile named '{0}'")]
    ProfileNotFound(String),

    #[error("profile '{0}' is not an SSH profile")]
    NotSshProfile(String),

    #[error(transparent)]
    Store(#[from] crate::config::StoreError),

    #[error(transparent)]
    Ssh(#[from] crate::ssh::SshError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("relay io: {0}")]
    Io(#[from] std::io::Error),
}

/// One live session.
pub struct SessionEntry {
    pub id: String,
    pub profile_name: String,
    pub state: SessionState,
    /// Worker command queue, present once the session reaches OPEN.
    pub cmd_tx: Option<mpsc::Sender<ShellCommand>>,
    pub created_at: Instant,
}

/// Point-in-time view of a session for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub profile_name: String,
    pub state: SessionState,
    pub uptime_secs: u64,
}

/// Concurrent map of live sessions.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
    max_sessions: usize,
    // Makes the limit check and the insert one atomic step.
    create_lock: parking_lot::Mutex<()>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_max_sessions(DEFAULT_MAX_SESSIONS)
    }

    pub fn with_max_sessions(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_sessions,
            create_lock: parking_lot::Mutex::new(()),
        }
    }

    /// Claim an id for a new session, generating one when the client did
    /// not supply it. The entry starts in INIT. Fails when the id is
    /// already live or the session limit is reached.
    pub fn reserve(
        &self,
        requested_id: Option<String>,
        profile_name: &str,
    ) -> Result<String, RelayError> {
        let _guard = self.create_lock.lock();

        let current = self.sessions.len();
        if current >= self.max_sessions {
            return Err(RelayError::SessionLimitReached {
                current,
                max: self.max_sessions,
            });
        }

        let id = requested_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if self.sessions.contains_key(&id) {
            return Err(RelayError::DuplicateSession(id));
        }

        debug!("session {} reserved for profile {}", id, profile_name);
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                id: id.clone(),
                profile_name: profile_name.to_string(),
                state: SessionState::Init,
                cmd_tx: None,
                created_at: Instant::now(),
            },
        );
        Ok(id)
    }

    /// Move a session to the next lifecycle state.
    pub fn advance(&self, id: &str, next: SessionState) -> Result<(), RelayError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;

        if !entry.state.can_advance_to(next) {
            return Err(RelayError::InvalidTransition {
                from: entry.state,
                to: next,
            });
        }
        debug!("session {} state {:?} -> {:?}", id, entry.state, next);
        entry.state = next;
        Ok(())
    }

    /// Record the worker command queue and mark the session OPEN.
    pub fn attach_shell(
        &self,
        id: &str,
        cmd_tx: mpsc::Sender<ShellCommand>,
    ) -> Result<(), RelayError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;

        if !entry.state.can_advance_to(SessionState::Open) {
            return Err(RelayError::InvalidTransition {
                from: entry.state,
                to: SessionState::Open,
            });
        }
        entry.state = SessionState::Open;
        entry.cmd_tx = Some(cmd_tx);
        info!("session {} open ({})", id, entry.profile_name);
        Ok(())
    }

    /// Begin an orderly close, handing back the worker queue so the caller
    /// can deliver the Close command. Calling this again while the session
    /// is already CLOSING is fine.
    pub fn begin_close(&self, id: &str) -> Result<mpsc::Sender<ShellCommand>, RelayError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;

        match (entry.state, entry.cmd_tx.clone()) {
            (SessionState::Open, Some(tx)) => {
                entry.state = SessionState::Closing;
                Ok(tx)
            }
            (SessionState::Closing, Some(tx)) => Ok(tx),
            (state, _) => Err(RelayError::InvalidTransition {
                from: state,
                to: SessionState::Closing,
            }),
        }
    }

    /// Terminal cleanup once the worker is gone: the entry leaves the map
    /// and the id becomes reusable.
    pub fn finish(&self, id: &str) {
        if let Some((_, entry)) = self.sessions.remove(id) {
            info!("session {} closed ({})", id, entry.profile_name);
        }
    }

    /// Abandon a reservation that never reached OPEN.
    pub fn discard(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            debug!("session {} discarded before opening", id);
        }
    }

    pub fn cmd_tx(&self, id: &str) -> Option<mpsc::Sender<ShellCommand>> {
        self.sessions.get(id).and_then(|entry| entry.cmd_tx.clone())
    }

    pub fn state(&self, id: &str) -> Option<SessionState> {
        self.sessions.get(id).map(|entry| entry.state)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| SessionSummary {
                id: entry.id.clone(),
                profile_name: entry.profile_name.clone(),
                state: entry.state,
                uptime_secs: entry.created_at.elapsed().as_secs(),
            })
            .collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_cmd_tx() -> mpsc::Sender<ShellCommand> {
        let (tx, _rx) = mpsc::channel(1);
        tx
    }

    #[test]
    fn reserve_generates_an_id_when_absent() {
        let registry = SessionRegistry::new();
        let id = registry.reserve(None, "web").unwrap();
        assert!(!id.is_empty());
        assert_eq!(registry.state(&id), Some(SessionState::Init));
    }

    #[test]
    fn full_lifecycle_walks_forward() {
        let registry = SessionRegistry::new();
        let id = registry.reserve(Some("s1".to_string()), "web").unwrap();

        registry.advance(&id, SessionState::Connecting).unwrap();
        registry.attach_shell(&id, dummy_cmd_tx()).unwrap();
        assert_eq!(registry.state(&id), Some(SessionState::Open));

        registry.begin_close(&id).unwrap();
        assert_eq!(registry.state(&id), Some(SessionState::Closing));

        registry.finish(&id);
        assert_eq!(registry.state(&id), None);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn duplicate_id_rejected_without_touching_the_first() {
        let registry = SessionRegistry::new();
        let id = registry.reserve(Some("s1".to_string()), "web").unwrap();
        registry.advance(&id, SessionState::Connecting).unwrap();
        registry.attach_shell(&id, dummy_cmd_tx()).unwrap();

        let second = registry.reserve(Some("s1".to_string()), "other");
        assert!(matches!(second, Err(RelayError::DuplicateSession(_))));

        // First session unchanged: still open, queue still attached.
        assert_eq!(registry.state("s1"), Some(SessionState::Open));
        assert!(registry.cmd_tx("s1").is_some());
    }

    #[test]
    fn states_cannot_skip_connecting() {
        let registry = SessionRegistry::new();
        let id = registry.reserve(Some("s1".to_string()), "web").unwrap();
        let err = registry.advance(&id, SessionState::Open).unwrap_err();
        assert!(matches!(err, RelayError::InvalidTransition { .. }));
    }

    #[test]
    fn close_before_open_is_not_an_orderly_close() {
        let registry = SessionRegistry::new();
        let id = registry.reserve(Some("s1".to_string()), "web").unwrap();
        registry.advance(&id, SessionState::Connecting).unwrap();
        assert!(registry.begin_close(&id).is_err());
    }

    #[test]
    fn session_limit_is_enforced() {
        let registry = SessionRegistry::with_max_sessions(2);
        registry.reserve(None, "a").unwrap();
        registry.reserve(None, "b").unwrap();
        let third = registry.reserve(None, "c");
        assert!(matches!(
            third,
            Err(RelayError::SessionLimitReached { current: 2, max: 2 })
        ));
    }

    #[test]
    fn finished_ids_become_reusable() {
        let registry = SessionRegistry::new();
        let id = registry.reserve(Some("s1".to_string()), "web").unwrap();
        registry.finish(&id);
        assert!(registry.reserve(Some("s1".to_string()), "web").is_ok());
    }
}
