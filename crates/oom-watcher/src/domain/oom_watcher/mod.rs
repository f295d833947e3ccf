//! System OOM watcher.
//!
//! Subscribes to OOM-kill events on the node's root cgroup and republishes each
//! one as a `Warning` notification against a fixed target object. A single
//! relay task per [`OomWatcher::start`] call drains the subscription until the
//! producer closes it; a panic inside the relay is contained and logged.

#[cfg(test)]
pub(crate) mod mock;
pub mod traits;
pub mod types;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use error_stack::Report;
use error_stack::ResultExt;
use futures::FutureExt;
use k8s_openapi::api::core::v1::ObjectReference;
use tokio::task::JoinError;
use tokio::task::JoinHandle;

pub use traits::ChannelSource;
pub use traits::EventMonitor;
pub use traits::EventSource;
pub use traits::NotificationRecorder;
pub use traits::WatcherLog;
pub use types::*;

/// [`WatcherLog`] that writes through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl WatcherLog for TracingLog {
    fn event_received(&self, event: &OomEvent) {
        tracing::debug!(?event, "Got system OOM event");
    }

    fn stream_closed(&self) {
        tracing::error!("Unexpectedly stopped receiving OOM notifications");
    }

    fn relay_panicked(&self, message: &str) {
        tracing::error!("OOM relay task panicked: {message}");
    }
}

/// Lifecycle of a relay task. A watcher whose subscription failed never
/// reaches `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Running,
    Stopped,
}

/// Handle to a spawned relay task.
#[derive(Debug)]
pub struct RelayHandle {
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub fn state(&self) -> RelayState {
        if self.task.is_finished() {
            RelayState::Stopped
        } else {
            RelayState::Running
        }
    }

    /// Wait until the relay task has stopped.
    pub async fn stopped(self) -> Result<(), JoinError> {
        self.task.await
    }
}

/// Watches a monitoring subsystem for system OOM kills.
pub struct OomWatcher<M, R, L = TracingLog> {
    monitor: M,
    recorder: Arc<R>,
    log: Arc<L>,
}

impl<M, R> OomWatcher<M, R, TracingLog>
where
    M: EventMonitor,
    R: NotificationRecorder,
{
    pub fn new(monitor: M, recorder: Arc<R>) -> Self {
        Self::with_log(monitor, recorder, Arc::new(TracingLog))
    }
}

impl<M, R, L> OomWatcher<M, R, L>
where
    M: EventMonitor,
    R: NotificationRecorder,
    L: WatcherLog,
{
    pub fn with_log(monitor: M, recorder: Arc<R>, log: Arc<L>) -> Self {
        Self {
            monitor,
            recorder,
            log,
        }
    }

    /// Subscribe to system OOM kills and spawn the relay task.
    ///
    /// Returns once the subscription is open, without waiting for events. Each
    /// successful call spawns an independent relay task.
    ///
    /// # Errors
    ///
    /// - [`WatcherError::SubscriptionFailed`] if the monitor rejects the
    ///   subscription; no task is spawned in that case.
    pub fn start(&self, target: ObjectReference) -> Result<RelayHandle, Report<WatcherError>> {
        let filter = EventFilter::system_oom();
        let source = self
            .monitor
            .subscribe(&filter)
            .change_context(WatcherError::SubscriptionFailed)
            .attach_printable_lazy(|| format!("target: {:?}", target.name))?;

        let target = Arc::new(target);
        let recorder = Arc::clone(&self.recorder);
        let log = Arc::clone(&self.log);

        let task = tokio::spawn(async move {
            let relay = relay_events(source, &target, recorder.as_ref(), log.as_ref());
            if let Err(payload) = AssertUnwindSafe(relay).catch_unwind().await {
                log.relay_panicked(&panic_message(payload.as_ref()));
            }
        });

        Ok(RelayHandle { task })
    }
}

/// Drain `source`, publishing one notification per event in arrival order.
async fn relay_events<S, R, L>(mut source: S, target: &Arc<ObjectReference>, recorder: &R, log: &L)
where
    S: EventSource,
    R: NotificationRecorder,
    L: WatcherLog,
{
    while let Some(event) = source.next().await {
        log.event_received(&event);
        recorder.publish_at(Notification::system_oom(target, &event));
    }
    log.stream_closed();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
