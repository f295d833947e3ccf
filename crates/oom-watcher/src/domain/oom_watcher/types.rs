use core::error::Error;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use k8s_openapi::api::core::v1::ObjectReference;

/// Reason code attached to every system OOM notification.
pub const SYSTEM_OOM_REASON: &str = "SystemOOM";

/// Message used when the kill event carries no usable process details.
pub const SYSTEM_OOM_MESSAGE: &str = "System OOM encountered";

/// Scope name of the node-level (root) cgroup.
pub const ROOT_SCOPE: &str = "/";

/// Kinds of events the monitoring subsystem can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// The kernel OOM killer terminated a process.
    OomKill,
    /// A cgroup hit its memory limit; the victim is reported separately.
    Oom,
}

/// Which events a subscription is interested in.
///
/// Built once per subscription and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub kinds: BTreeSet<EventKind>,
    pub scope: String,
    pub include_descendants: bool,
}

impl EventFilter {
    /// OOM kills on the root scope only, sub-scopes excluded.
    pub fn system_oom() -> Self {
        Self {
            kinds: BTreeSet::from([EventKind::OomKill]),
            scope: ROOT_SCOPE.to_string(),
            include_descendants: false,
        }
    }

    pub fn wants(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Returns `true` when the event falls inside this filter.
    pub fn matches(&self, event: &OomEvent) -> bool {
        if !self.wants(event.kind) {
            return false;
        }
        if event.scope == self.scope {
            return true;
        }
        if !self.include_descendants {
            return false;
        }
        let prefix = self.scope.trim_end_matches('/');
        event
            .scope
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Process details of an OOM kill. Zero pid and empty name mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OomKillData {
    pub pid: u32,
    pub process_name: String,
}

/// A raw event delivered by the monitoring subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OomEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    /// cgroup the event was observed in.
    pub scope: String,
    pub oom_kill: OomKillData,
}

impl OomEvent {
    /// Convenience constructor for a root-scope OOM kill.
    pub fn oom_kill(timestamp: DateTime<Utc>, pid: u32, process_name: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind: EventKind::OomKill,
            scope: ROOT_SCOPE.to_string(),
            oom_kill: OomKillData {
                pid,
                process_name: process_name.into(),
            },
        }
    }
}

/// Severity of a published notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Severity {
    #[display("Normal")]
    Normal,
    #[display("Warning")]
    Warning,
}

/// A human-readable record attached to the target object.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub target: Arc<ObjectReference>,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub reason: &'static str,
    pub message: String,
}

impl Notification {
    /// Maps a raw OOM kill event to the notification published for it.
    pub fn system_oom(target: &Arc<ObjectReference>, event: &OomEvent) -> Self {
        Self {
            target: Arc::clone(target),
            timestamp: event.timestamp,
            severity: Severity::Warning,
            reason: SYSTEM_OOM_REASON,
            message: system_oom_message(&event.oom_kill),
        }
    }
}

/// Builds the notification text; both pid and name must be present for the
/// process suffix to be appended.
pub fn system_oom_message(data: &OomKillData) -> String {
    if data.pid != 0 && !data.process_name.is_empty() {
        format!(
            "{SYSTEM_OOM_MESSAGE}:  process pid {}, process name: {}",
            data.pid, data.process_name
        )
    } else {
        SYSTEM_OOM_MESSAGE.to_string()
    }
}

/// Errors reported by a monitoring subsystem.
#[derive(Debug, derive_more::Display)]
pub enum MonitorError {
    #[display("Failed to subscribe to monitoring events: {message}")]
    SubscriptionFailed { message: String },
    #[display("Unsupported event filter: {message}")]
    UnsupportedFilter { message: String },
}

impl Error for MonitorError {}

/// Errors surfaced to callers of the watcher.
#[derive(Debug, derive_more::Display)]
pub enum WatcherError {
    #[display("Failed to start OOM watcher: subscription rejected")]
    SubscriptionFailed,
}

impl Error for WatcherError {}
