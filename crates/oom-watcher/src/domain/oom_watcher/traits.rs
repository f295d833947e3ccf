//! Capabilities the OOM watcher consumes

use std::future::Future;

use error_stack::Report;
use tokio::sync::mpsc;

use super::types::EventFilter;
use super::types::MonitorError;
use super::types::Notification;
use super::types::OomEvent;

/// Node-level resource monitoring subsystem.
pub trait EventMonitor: Send + Sync {
    type Source: EventSource + 'static;

    /// Open a subscription for the events selected by `filter`.
    fn subscribe(&self, filter: &EventFilter) -> Result<Self::Source, Report<MonitorError>>;
}

/// A live, non-restartable stream of monitoring events.
pub trait EventSource: Send {
    /// Wait for the next event. `None` marks the end of the stream.
    fn next(&mut self) -> impl Future<Output = Option<OomEvent>> + Send;
}

/// Sink for notifications attached to a target object.
pub trait NotificationRecorder: Send + Sync + 'static {
    /// Publish a notification at its own timestamp rather than "now".
    fn publish_at(&self, notification: Notification);
}

/// Log capability injected into the watcher.
pub trait WatcherLog: Send + Sync + 'static {
    fn event_received(&self, event: &OomEvent);

    fn stream_closed(&self);

    fn relay_panicked(&self, message: &str);
}

/// [`EventSource`] backed by a tokio channel; closes once every sender is dropped.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<OomEvent>,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<OomEvent>) -> Self {
        Self { receiver }
    }
}

impl EventSource for ChannelSource {
    fn next(&mut self) -> impl Future<Output = Option<OomEvent>> + Send {
        self.receiver.recv()
    }
}
