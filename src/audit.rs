//! Append-only session audit log.
//!
//! One line per connect-type event, semicolon-delimited:
//! `timestamp;event_kind;profile_name;extra`. The core only ever appends;
//! the single read path renders "recent activity".

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::warn;

pub const LOG_FILE_NAME: &str = ".hostlink_sessions.log";

/// Event kinds written by the connect flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SshConnect,
    RdpConnect,
    RdpConnectAfterWol,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SshConnect => "SSH_CONNECT",
            EventKind::RdpConnect => "RDP_CONNECT",
            EventKind::RdpConnectAfterWol => "RDP_CONNECT_AFTER_WOL",
        }
    }
}

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLogEntry {
    pub timestamp: String,
    pub event_kind: String,
    pub profile_name: String,
    pub extra: String,
}

impl SessionLogEntry {
    /// Parses `timestamp;event;name;extra`. Lines missing any of the first
    /// three fields are skipped by the reader.
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(4, ';');
        Some(Self {
            timestamp: parts.next()?.to_string(),
            event_kind: parts.next()?.to_string(),
            profile_name: parts.next()?.to_string(),
            extra: parts.next().unwrap_or("").to_string(),
        })
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("no home directory available")]
    NoHomeDir,

    #[error("log io: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle on the audit log file.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log in the home directory (`~/.hostlink_sessions.log`).
    pub fn default_location() -> Result<Self, AuditError> {
        let home = dirs::home_dir().ok_or(AuditError::NoHomeDir)?;
        Ok(Self::new(home.join(LOG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry. Failure is reported to the caller but connect
    /// flows treat it as non-fatal.
    pub fn append(
        &self,
        kind: EventKind,
        profile_name: &str,
        extra: Option<&str>,
    ) -> Result<(), AuditError> {
        let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!(
            "{};{};{};{}\n",
            ts,
            kind.as_str(),
            profile_name,
            extra.unwrap_or("")
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Best-effort append used by connect flows; logs instead of failing.
    pub fn record(&self, kind: EventKind, profile_name: &str, extra: Option<&str>) {
        if let Err(e) = self.append(kind, profile_name, extra) {
            warn!("failed to append session log entry: {}", e);
        }
    }

    /// Returns the last `limit` entries, oldest first. A missing log file
    /// yields an empty list.
    pub fn recent(&self, limit: usize) -> Result<Vec<SessionLogEntry>, AuditError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let parsed: Vec<SessionLogEntry> = content
            .lines()
            .filter_map(SessionLogEntry::parse)
            .collect();
        let skip = parsed.len().saturating_sub(limit);
        Ok(parsed.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, SessionLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::new(dir.path().join("sessions.log"));
        (dir, log)
    }

    #[test]
    fn append_writes_semicolon_delimited_lines() {
        let (_dir, log) = temp_log();
        log.append(EventKind::SshConnect, "lab1", None).unwrap();
        log.append(EventKind::RdpConnectAfterWol, "desk", Some("woke after 4s"))
            .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(";SSH_CONNECT;lab1;"));
        assert!(lines[1].ends_with(";RDP_CONNECT_AFTER_WOL;desk;woke after 4s"));
    }

    #[test]
    fn recent_returns_last_entries_in_order() {
        let (_dir, log) = temp_log();
        for i in 0..8 {
            log.append(EventKind::SshConnect, &format!("host{i}"), None)
                .unwrap();
        }
        let entries = log.recent(3).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].profile_name, "host5");
        assert_eq!(entries[2].profile_name, "host7");
        assert!(entries.iter().all(|e| e.event_kind == "SSH_CONNECT"));
    }

    #[test]
    fn recent_on_missing_file_is_empty() {
        let (_dir, log) = temp_log();
        assert!(log.recent(5).unwrap().is_empty());
    }

    #[test]
    fn extra_field_may_contain_semicolons() {
        let (_dir, log) = temp_log();
        log.append(EventKind::RdpConnect, "desk", Some("a;b;c"))
            .unwrap();
        let entries = log.recent(1).unwrap();
        assert_eq!(entries[0].extra, "a;b;c");
    }
}
