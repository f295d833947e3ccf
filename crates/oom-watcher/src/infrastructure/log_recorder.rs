//! Notification recorder writing to the process log

use tracing::warn;

use crate::domain::oom_watcher::Notification;
use crate::domain::oom_watcher::NotificationRecorder;

/// Emits every notification as a structured log line. Used when the watcher
/// runs without access to the Kubernetes API.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecorder;

impl NotificationRecorder for LogRecorder {
    fn publish_at(&self, notification: Notification) {
        warn!(
            target: "oom_watcher::notifications",
            object = ?notification.target.name,
            kind = ?notification.target.kind,
            timestamp = %notification.timestamp.to_rfc3339(),
            severity = %notification.severity,
            reason = notification.reason,
            "{}",
            notification.message
        );
    }
}
