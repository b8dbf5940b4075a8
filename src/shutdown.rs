//! Termination signals and the bounded worker drain

use crate::stats::Statistics;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Interval between checks of the active-worker gauge while draining
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Registration can fail in restricted environments
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "could not register signal handlers, falling back to ctrl_c");
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C, shutting down");
            }
        }
    }
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}

/// Cancel `token` on the first termination signal.
///
/// The listener also exits quietly once the token is cancelled elsewhere.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => token.cancel(),
            _ = token.cancelled() => {}
        }
    })
}

/// Wait until no workers are active or `timeout` elapses.
///
/// Returns `true` when the gauge reached zero.
pub async fn drain_workers(stats: &Statistics, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let active = stats.active_workers();
        if active == 0 {
            return true;
        }
        if Instant::now() >= deadline {
            warn!(active, "drain timed out with workers still active");
            return false;
        }
        info!(active, "waiting for workers to finish");
        tokio::time::sleep(DRAIN_POLL_INTERVAL.min(timeout)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_drain_idle_returns_immediately() {
        let stats = Statistics::new();
        assert!(drain_workers(&stats, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_drain_times_out() {
        let stats = Statistics::new();
        stats.worker_started();
        assert!(!drain_workers(&stats, Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_drain_waits_for_worker() {
        let stats = Arc::new(Statistics::new());
        stats.worker_started();

        let worker = Arc::clone(&stats);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            worker.worker_finished();
        });

        assert!(drain_workers(&stats, Duration::from_secs(10)).await);
        assert_eq!(stats.active_workers(), 0);
    }

    #[tokio::test]
    async fn test_signal_listener_exits_on_cancel() {
        let token = CancellationToken::new();
        let handle = spawn_signal_listener(token.clone());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
