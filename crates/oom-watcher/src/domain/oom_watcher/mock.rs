//! Test doubles for the watcher's injected capabilities

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use error_stack::Report;

use super::traits::ChannelSource;
use super::traits::EventMonitor;
use super::traits::EventSource;
use super::traits::NotificationRecorder;
use super::traits::WatcherLog;
use super::types::EventFilter;
use super::types::MonitorError;
use super::types::Notification;
use super::types::OomEvent;

/// Source that replays a fixed script. A `None` step ends the stream even if
/// more steps follow.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: VecDeque<Option<OomEvent>>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Option<OomEvent>>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl EventSource for ScriptedSource {
    fn next(&mut self) -> impl Future<Output = Option<OomEvent>> + Send {
        std::future::ready(self.steps.pop_front().flatten())
    }
}

#[derive(Debug)]
pub enum MockSource {
    Scripted(ScriptedSource),
    Channel(ChannelSource),
}

impl EventSource for MockSource {
    fn next(&mut self) -> impl Future<Output = Option<OomEvent>> + Send {
        async move {
            match self {
                MockSource::Scripted(source) => source.next().await,
                MockSource::Channel(source) => source.next().await,
            }
        }
    }
}

enum Behavior {
    Once(Mutex<Option<MockSource>>),
    Repeat(Vec<OomEvent>),
    Fail,
}

/// Monitor handing out prepared sources and recording requested filters.
pub struct MockMonitor {
    behavior: Behavior,
    filters: Arc<Mutex<Vec<EventFilter>>>,
}

impl MockMonitor {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            filters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn scripted(source: ScriptedSource) -> Self {
        Self::with_behavior(Behavior::Once(Mutex::new(Some(MockSource::Scripted(
            source,
        )))))
    }

    pub fn channel(source: ChannelSource) -> Self {
        Self::with_behavior(Behavior::Once(Mutex::new(Some(MockSource::Channel(
            source,
        )))))
    }

    /// Every subscription gets a fresh source replaying `events`.
    pub fn repeating(events: Vec<OomEvent>) -> Self {
        Self::with_behavior(Behavior::Repeat(events))
    }

    pub fn failing() -> Self {
        Self::with_behavior(Behavior::Fail)
    }

    pub fn filters(&self) -> Arc<Mutex<Vec<EventFilter>>> {
        Arc::clone(&self.filters)
    }
}

impl EventMonitor for MockMonitor {
    type Source = MockSource;

    fn subscribe(&self, filter: &EventFilter) -> Result<Self::Source, Report<MonitorError>> {
        self.filters.lock().unwrap().push(filter.clone());
        match &self.behavior {
            Behavior::Once(source) => source.lock().unwrap().take().ok_or_else(|| {
                Report::new(MonitorError::SubscriptionFailed {
                    message: "mock source already handed out".to_string(),
                })
            }),
            Behavior::Repeat(events) => Ok(MockSource::Scripted(ScriptedSource::new(
                events.iter().cloned().map(Some).collect(),
            ))),
            Behavior::Fail => Err(Report::new(MonitorError::SubscriptionFailed {
                message: "monitor unavailable".to_string(),
            })),
        }
    }
}

/// Recorder that keeps every published notification.
#[derive(Default)]
pub struct MockRecorder {
    published: Mutex<Vec<Notification>>,
    calls: AtomicUsize,
    panic_on: Option<usize>,
}

impl MockRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panics on the `call`-th publish (1-based).
    pub fn panicking_on(call: usize) -> Self {
        Self {
            panic_on: Some(call),
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<Notification> {
        self.published.lock().unwrap().clone()
    }
}

impl NotificationRecorder for MockRecorder {
    fn publish_at(&self, notification: Notification) {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on == Some(call) {
            panic!("publish #{call} failed");
        }
        self.published.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct RecordingLog {
    received: AtomicUsize,
    closed: AtomicUsize,
    panics: Mutex<Vec<String>>,
}

impl RecordingLog {
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn panics(&self) -> Vec<String> {
        self.panics.lock().unwrap().clone()
    }
}

impl WatcherLog for RecordingLog {
    fn event_received(&self, _event: &OomEvent) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }

    fn stream_closed(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn relay_panicked(&self, message: &str) {
        self.panics.lock().unwrap().push(message.to_string());
    }
}
