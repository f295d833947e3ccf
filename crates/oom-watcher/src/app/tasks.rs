use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::domain::oom_watcher::RelayHandle;

/// How the daemon's main wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Signal,
    RelayStopped,
}

/// Wait for SIGTERM/SIGINT or for the relay task to stop, whichever comes first.
pub async fn wait_for_exit(relay: RelayHandle) -> Result<Exit> {
    let signal_handler = shutdown_signal();
    tokio::pin!(signal_handler);

    tokio::select! {
        result = &mut signal_handler => {
            result?;
            tracing::info!("Shutdown signal received");
            Ok(Exit::Signal)
        }
        result = relay.stopped() => {
            if let Err(e) = result {
                tracing::error!("OOM relay task failed: {e}");
            }
            Ok(Exit::RelayStopped)
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::signal;
    use tokio::signal::unix::SignalKind;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
        _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    Ok(())
}

/// Wait for a background task, giving up after `timeout`.
pub async fn join_with_timeout(name: &str, task: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(())) => tracing::info!("{name} task completed"),
        Ok(Err(e)) => tracing::error!("{name} task failed during shutdown: {e}"),
        Err(_) => tracing::warn!("{name} task shutdown timed out after {timeout:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use similar_asserts::assert_eq;
    use test_log::test;
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::oom_watcher::mock::MockMonitor;
    use crate::domain::oom_watcher::mock::MockRecorder;
    use crate::domain::oom_watcher::ChannelSource;
    use crate::domain::oom_watcher::OomWatcher;
    use crate::infrastructure::k8s::node_reference;

    #[test(tokio::test)]
    async fn exits_when_relay_stops() {
        let (sender, receiver) = mpsc::channel(1);
        let watcher = OomWatcher::new(
            MockMonitor::channel(ChannelSource::new(receiver)),
            Arc::new(MockRecorder::new()),
        );
        let relay = watcher.start(node_reference("worker-1")).unwrap();
        drop(sender);

        let exit = wait_for_exit(relay).await.unwrap();

        assert_eq!(exit, Exit::RelayStopped);
    }

    #[test(tokio::test)]
    async fn join_with_timeout_gives_up_on_stuck_tasks() {
        let stuck = tokio::spawn(std::future::pending::<()>());

        join_with_timeout("stuck", stuck, Duration::from_millis(10)).await;
    }
}
