//! Cancellable live monitor.
//!
//! Re-probes a fixed profile set on an interval and publishes each cycle
//! to a channel. The loop stops on `stop()`, when the handle is dropped,
//! or when the consumer goes away. Every cycle probes from scratch.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::config::ProfileRow;

use super::engine::{StatusEngine, StatusSnapshot};

pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(2);

const MIN_INTERVAL: Duration = Duration::from_millis(1500);
const MAX_INTERVAL: Duration = Duration::from_secs(3);

/// Clamps a requested refresh interval into the supported range
/// (1.5s to 3s).
pub fn clamp_interval(requested: Duration) -> Duration {
    requested.clamp(MIN_INTERVAL, MAX_INTERVAL)
}

/// Handle on a running monitor loop.
pub struct StatusMonitor {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl StatusMonitor {
    /// Spawns the monitor loop. The first cycle runs immediately; each
    /// cycle's snapshots are sent to `out`.
    pub fn spawn(
        engine: StatusEngine,
        rows: Vec<ProfileRow>,
        interval: Duration,
        out: mpsc::Sender<Vec<StatusSnapshot>>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("status monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let snapshots = engine.snapshot(&rows).await;
                        if out.send(snapshots).await.is_err() {
                            debug!("status monitor consumer gone");
                            break;
                        }
                    }
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            task,
        }
    }

    /// Signals the loop to stop after the current cycle.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Stops the loop and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        let _ = (&mut self.task).await;
    }

    /// True once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn monitor_publishes_cycles_until_stopped() {
        let (tx, mut rx) = mpsc::channel(4);
        let monitor = StatusMonitor::spawn(
            StatusEngine::default(),
            vec![],
            Duration::from_millis(10),
            tx,
        );

        // At least two cycles arrive.
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();

        monitor.shutdown().await;
        // Sender side is gone once the loop exits.
        assert!(timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn monitor_exits_when_consumer_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        let monitor = StatusMonitor::spawn(
            StatusEngine::default(),
            vec![],
            Duration::from_millis(10),
            tx,
        );
        drop(rx);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !monitor.is_finished() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "monitor loop should exit once the consumer is gone"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[test]
    fn interval_clamps_into_supported_range() {
        assert_eq!(
            clamp_interval(Duration::from_millis(100)),
            Duration::from_millis(1500)
        );
        assert_eq!(clamp_interval(Duration::from_secs(2)), Duration::from_secs(2));
        assert_eq!(clamp_interval(Duration::from_secs(30)), Duration::from_secs(3));
    }
}
