//! Concurrent reachability snapshots.

use std::time::Duration;

use chrono::{DateTime, Local};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::timeout;

use crate::config::{ProfileKind, ProfileRow};
use crate::probe::net;

/// One probe result row. Derived and ephemeral; lives for one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub name: String,
    pub kind: ProfileKind,
    /// Echo probe answered.
    pub reachable: bool,
    /// TCP connect on the declared port succeeded.
    pub service_reachable: bool,
    pub latency_ms: Option<u64>,
    pub checked_at: DateTime<Local>,
}

impl StatusSnapshot {
    /// The shape rendered for entries still unresolved at the deadline.
    fn unknown(name: &str, kind: ProfileKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            reachable: false,
            service_reachable: false,
            latency_ms: None,
            checked_at: Local::now(),
        }
    }
}

/// Probe timeouts and the overall snapshot budget.
#[derive(Debug, Clone, Copy)]
pub struct ProbeConfig {
    pub ping_timeout: Duration,
    pub tcp_timeout: Duration,
    /// Wall-clock bound for a whole snapshot; entries still pending at the
    /// deadline render as unknown.
    pub budget: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ping_timeout: net::DEFAULT_PING_TIMEOUT,
            tcp_timeout: net::DEFAULT_TCP_TIMEOUT,
            budget: Duration::from_secs(3),
        }
    }
}

/// Fans probes out across a profile collection.
#[derive(Debug, Clone, Default)]
pub struct StatusEngine {
    config: ProbeConfig,
}

impl StatusEngine {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probes one profile: echo and TCP connect run concurrently.
    pub async fn probe_row(&self, row: &ProfileRow) -> StatusSnapshot {
        let host = row.profile.host();
        let port = row.profile.port();
        let (reachable, latency) = tokio::join!(
            net::ping(host, 1, self.config.ping_timeout),
            net::tcp_latency(host, port, self.config.tcp_timeout),
        );
        StatusSnapshot {
            name: row.name.clone(),
            kind: row.kind,
            reachable,
            service_reachable: latency.is_some(),
            latency_ms: latency.map(|d| d.as_millis() as u64),
            checked_at: Local::now(),
        }
    }

    /// Probes every row concurrently. The budget bounds the snapshot as a
    /// whole: rows that resolved in time keep their results, the rest come
    /// back unknown. Output order matches input order.
    pub async fn snapshot(&self, rows: &[ProfileRow]) -> Vec<StatusSnapshot> {
        let budget = self.config.budget;
        let probes = rows.iter().map(|row| async move {
            match timeout(budget, self.probe_row(row)).await {
                Ok(snapshot) => snapshot,
                Err(_) => StatusSnapshot::unknown(&row.name, row.kind),
            }
        });
        join_all(probes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionProfile, SshProfile};
    use std::time::Instant;
    use tokio::net::TcpListener;

    fn row(name: &str, host: &str, port: u16) -> ProfileRow {
        ProfileRow {
            name: name.to_string(),
            kind: ProfileKind::Ssh,
            profile: ConnectionProfile::Ssh(SshProfile {
                user: None,
                host: host.to_string(),
                port,
                tags: vec![],
                favorite: false,
            }),
        }
    }

    #[tokio::test]
    async fn local_listener_reads_as_service_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let engine = StatusEngine::default();
        let snaps = engine.snapshot(&[row("local", "127.0.0.1", port)]).await;

        assert_eq!(snaps.len(), 1);
        assert!(snaps[0].service_reachable);
        assert!(snaps[0].latency_ms.is_some());
    }

    #[tokio::test]
    async fn snapshot_respects_its_budget() {
        let engine = StatusEngine::new(ProbeConfig {
            budget: Duration::from_millis(300),
            ..ProbeConfig::default()
        });
        // TEST-NET-1, unroutable; probes would run to their own timeouts.
        let rows = vec![
            row("a", "192.0.2.1", 22),
            row("b", "192.0.2.2", 22),
            row("c", "192.0.2.3", 22),
        ];

        let started = Instant::now();
        let snaps = engine.snapshot(&rows).await;
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(snaps.len(), 3);
        let names: Vec<&str> = snaps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn exhausted_budget_renders_unknown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let engine = StatusEngine::new(ProbeConfig {
            budget: Duration::ZERO,
            ..ProbeConfig::default()
        });
        let snaps = engine.snapshot(&[row("local", "127.0.0.1", port)]).await;

        assert!(!snaps[0].reachable);
        assert!(!snaps[0].service_reachable);
        assert!(snaps[0].latency_ms.is_none());
    }
}
