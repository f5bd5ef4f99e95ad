//! Ping and TCP reachability checks.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Upper bound on one echo probe. Keeps list rendering responsive.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on one TCP connect attempt.
pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Sends `count` echo requests via the system `ping` binary and reports
/// whether it exited clean within the budget. A missing binary, a timeout
/// or a non-zero exit all read as unreachable.
pub async fn ping(host: &str, count: u32, budget: Duration) -> bool {
    let count_flag = if cfg!(windows) { "-n" } else { "-c" };

    let child = Command::new("ping")
        .arg(count_flag)
        .arg(count.to_string())
        .arg(host)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let mut child = match child {
        Ok(c) => c,
        Err(e) => {
            debug!("ping spawn failed for {}: {}", host, e);
            return false;
        }
    };

    match timeout(budget, child.wait()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!("ping wait failed for {}: {}", host, e);
            false
        }
        Err(_) => {
            // Budget elapsed; the probe is killed on drop.
            false
        }
    }
}

/// Attempts a TCP connect and returns the elapsed time on success.
pub async fn tcp_latency(host: &str, port: u16, budget: Duration) -> Option<Duration> {
    let started = Instant::now();
    match timeout(budget, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => Some(started.elapsed()),
        Ok(Err(e)) => {
            debug!("tcp connect {}:{} failed: {}", host, port, e);
            None
        }
        Err(_) => None,
    }
}

/// True when a TCP connect to `host:port` succeeds within the budget.
pub async fn tcp_check(host: &str, port: u16, budget: Duration) -> bool {
    tcp_latency(host, port, budget).await.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_check_sees_a_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(tcp_check("127.0.0.1", port, DEFAULT_TCP_TIMEOUT).await);
        let latency = tcp_latency("127.0.0.1", port, DEFAULT_TCP_TIMEOUT).await;
        assert!(latency.is_some());
    }

    #[tokio::test]
    async fn tcp_check_fails_closed_on_a_dead_port() {
        // Bind then drop to get a port that is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(!tcp_check("127.0.0.1", port, DEFAULT_TCP_TIMEOUT).await);
    }

    #[tokio::test]
    async fn tcp_check_never_blocks_past_its_budget() {
        let budget = Duration::from_millis(300);
        let started = Instant::now();
        // TEST-NET-1 address, guaranteed unroutable.
        let up = tcp_check("192.0.2.1", 3389, budget).await;
        assert!(!up);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn ping_fails_closed_on_bad_host() {
        assert!(!ping("host.invalid.", 1, Duration::from_secs(2)).await);
    }
}
