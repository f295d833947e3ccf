//! Kernel log parsing for OOM kills

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::oom_watcher::EventKind;
use crate::domain::oom_watcher::OomEvent;
use crate::domain::oom_watcher::OomKillData;
use crate::domain::oom_watcher::ROOT_SCOPE;

// oom-kill:constraint=CONSTRAINT_NONE,...,task_memcg=/kubepods/pod1,task=stress,pid=4821,uid=0
static OOM_KILL_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"oom-kill:.*task_memcg=([^,]*),task=([^,]*),pid=([0-9]+)").expect("valid regex")
});

// Task in /kubepods/pod1 killed as a result of limit of /kubepods/pod1
static LEGACY_MEMCG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Task in (\S+) killed as a result of limit of (\S+)").expect("valid regex")
});

static KILLED_PROCESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Killed process ([0-9]+) \((.+?)\)").expect("valid regex")
});

/// A single `/dev/kmsg` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsgRecord<'a> {
    /// Microseconds since boot, when the record carries a header.
    pub timestamp_us: Option<u64>,
    pub message: &'a str,
}

impl<'a> KmsgRecord<'a> {
    /// Split `prio,seq,usec,flags[,...];message`. Lines without a header are
    /// taken verbatim.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some((header, message)) = line.split_once(';') {
            let mut fields = header.split(',');
            let prio = fields.next();
            let _seq = fields.next();
            let usec = fields.next().and_then(|f| f.parse::<u64>().ok());
            if prio.is_some_and(|p| p.parse::<u32>().is_ok()) && usec.is_some() {
                return Self {
                    timestamp_us: usec,
                    message,
                };
            }
        }
        Self {
            timestamp_us: None,
            message: line,
        }
    }
}

/// Stateful OOM parser.
///
/// The kernel reports the victim's cgroup on a line preceding the
/// `Killed process` line; the cgroup is remembered until the kill is seen.
#[derive(Debug)]
pub struct OomParser {
    boot_time: DateTime<Utc>,
    pending_scope: Option<String>,
}

impl OomParser {
    pub fn new(boot_time: DateTime<Utc>) -> Self {
        Self {
            boot_time,
            pending_scope: None,
        }
    }

    /// Feed one kmsg line, returning an event when it completes an OOM kill.
    pub fn feed(&mut self, line: &str) -> Option<OomEvent> {
        if line.starts_with(' ') {
            return None;
        }
        let record = KmsgRecord::parse(line);

        if let Some(caps) = OOM_KILL_SUMMARY.captures(record.message) {
            self.pending_scope = Some(normalize_scope(&caps[1]));
            return None;
        }
        if let Some(caps) = LEGACY_MEMCG.captures(record.message) {
            self.pending_scope = Some(normalize_scope(&caps[1]));
            return None;
        }

        let caps = KILLED_PROCESS.captures(record.message)?;
        let pid = caps[1].parse::<u32>().unwrap_or(0);
        let process_name = caps[2].to_string();
        let scope = self
            .pending_scope
            .take()
            .unwrap_or_else(|| ROOT_SCOPE.to_string());

        Some(OomEvent {
            timestamp: self.timestamp(record.timestamp_us),
            kind: EventKind::OomKill,
            scope,
            oom_kill: OomKillData { pid, process_name },
        })
    }

    fn timestamp(&self, timestamp_us: Option<u64>) -> DateTime<Utc> {
        match timestamp_us.and_then(|us| i64::try_from(us).ok()) {
            Some(us) => self.boot_time + Duration::microseconds(us),
            None => Utc::now(),
        }
    }
}

fn normalize_scope(scope: &str) -> String {
    if scope.is_empty() || scope == "(null)" {
        ROOT_SCOPE.to_string()
    } else {
        scope.to_string()
    }
}

/// Parse the first field of `/proc/uptime` and derive the boot time from `now`.
pub fn boot_time_from_uptime(uptime: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let secs = uptime.split_whitespace().next()?.parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let micros = (secs * 1_000_000.0) as i64;
    Some(now - Duration::microseconds(micros))
}
