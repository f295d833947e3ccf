//! Kernel ring buffer monitor.
//!
//! Reads `/dev/kmsg` on a dedicated OS thread, turns OOM-killer reports into
//! [`OomEvent`]s and forwards those matching the subscription filter through a
//! [`ChannelSource`]. The thread is detached from the tokio runtime so a read
//! parked on a quiet kernel log never holds up runtime shutdown.

pub mod parser;

use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use error_stack::Report;
use error_stack::ResultExt;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use self::parser::boot_time_from_uptime;
use self::parser::OomParser;
use crate::domain::oom_watcher::ChannelSource;
use crate::domain::oom_watcher::EventFilter;
use crate::domain::oom_watcher::EventKind;
use crate::domain::oom_watcher::EventMonitor;
use crate::domain::oom_watcher::MonitorError;
use crate::domain::oom_watcher::OomEvent;

pub const DEFAULT_KMSG_PATH: &str = "/dev/kmsg";

const UPTIME_PATH: &str = "/proc/uptime";
const EVENT_CHANNEL_CAPACITY: usize = 64;
const READER_THREAD_NAME: &str = "kmsg-reader";

/// [`EventMonitor`] backed by the kernel log.
#[derive(Debug, Clone)]
pub struct KmsgMonitor {
    path: PathBuf,
    replay_existing: bool,
}

impl KmsgMonitor {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            replay_existing: false,
        }
    }

    /// Also report records already in the buffer when subscribing.
    pub fn replay_existing(mut self, replay: bool) -> Self {
        self.replay_existing = replay;
        self
    }

    fn open(&self) -> Result<File, Report<MonitorError>> {
        let mut file = File::open(&self.path).change_context_lazy(|| {
            MonitorError::SubscriptionFailed {
                message: format!("Failed to open kernel log: {}", self.path.display()),
            }
        })?;
        if !self.replay_existing {
            file.seek(SeekFrom::End(0)).change_context_lazy(|| {
                MonitorError::SubscriptionFailed {
                    message: format!("Failed to seek kernel log: {}", self.path.display()),
                }
            })?;
        }
        Ok(file)
    }
}

impl EventMonitor for KmsgMonitor {
    type Source = ChannelSource;

    fn subscribe(&self, filter: &EventFilter) -> Result<ChannelSource, Report<MonitorError>> {
        if !filter.wants(EventKind::OomKill) {
            return Err(Report::new(MonitorError::UnsupportedFilter {
                message: "kernel log monitor only reports OOM kills".to_string(),
            })
            .attach_printable(format!("requested kinds: {:?}", filter.kinds)));
        }

        let file = self.open()?;
        let boot_time = read_boot_time(Path::new(UPTIME_PATH));
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let filter = filter.clone();
        let path = self.path.clone();

        info!(path = %path.display(), scope = %filter.scope, "Subscribed to kernel OOM events");
        std::thread::Builder::new()
            .name(READER_THREAD_NAME.into())
            .spawn(move || {
                read_events(BufReader::new(file), &path, boot_time, &filter, &sender);
            })
            .change_context(MonitorError::SubscriptionFailed {
                message: "Failed to spawn kernel log reader thread".to_string(),
            })?;

        Ok(ChannelSource::new(receiver))
    }
}

fn read_boot_time(uptime_path: &Path) -> DateTime<Utc> {
    let now = Utc::now();
    match std::fs::read_to_string(uptime_path) {
        Ok(content) => boot_time_from_uptime(&content, now).unwrap_or_else(|| {
            warn!("Unparseable {}, using current time as boot time", uptime_path.display());
            now
        }),
        Err(e) => {
            warn!("Failed to read {}: {e}, using current time as boot time", uptime_path.display());
            now
        }
    }
}

/// Blocking read loop; returns when the log ends, a read fails or the
/// subscriber goes away. Dropping `sender` closes the subscriber's source.
///
/// The subscriber is checked before every read, so unrelated kernel traffic
/// is enough to notice it has gone.
fn read_events<R: BufRead>(
    mut reader: R,
    path: &Path,
    boot_time: DateTime<Utc>,
    filter: &EventFilter,
    sender: &mpsc::Sender<OomEvent>,
) {
    let mut parser = OomParser::new(boot_time);
    let mut buf = Vec::with_capacity(1024);

    loop {
        if sender.is_closed() {
            debug!("OOM event subscriber dropped, stopping kernel log reader");
            return;
        }
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                info!("Kernel log {} reached end of file", path.display());
                return;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let Some(event) = parser.feed(&line) else {
                    continue;
                };
                if !filter.matches(&event) {
                    debug!(scope = %event.scope, "Ignoring OOM kill outside watched scope");
                    continue;
                }
                if sender.blocking_send(event).is_err() {
                    debug!("OOM event subscriber dropped, stopping kernel log reader");
                    return;
                }
            }
            // records were overwritten before we read them
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                warn!("Kernel log records lost: {e}");
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                error!("Failed to read kernel log {}: {e}", path.display());
                return;
            }
        }
    }
}
