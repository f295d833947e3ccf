//! provides logging helpers

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::InitError;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// When set, logs are additionally written to daily-rotated files in this
/// directory.
pub const LOG_PATH_ENV_VAR: &str = "OOM_WATCHER_LOG_PATH";

const LOG_FILE_PREFIX: &str = "oom-watcher.log";
const MAX_LOG_FILES: usize = 3;

/// initiate the global tracing subscriber
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init() -> Option<WorkerGuard> {
    let env_filter = || {
        filter::EnvFilter::builder()
            .with_default_directive(filter::LevelFilter::INFO.into())
            .from_env_lossy()
    };

    let stderr_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    let file_output = env::var(LOG_PATH_ENV_VAR)
        .ok()
        .map(|dir| file_writer(Path::new(&dir)));
    let (file_layer, guard) = match file_output {
        Some(Ok((writer, guard))) => {
            let file_layer = layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter());
            (Some(file_layer), Some(guard))
        }
        Some(Err(e)) => {
            eprintln!("failed to create log file appender, logging to stderr only: {e}");
            (None, None)
        }
        None => (None, None),
    };

    registry().with(stderr_layer).with(file_layer).init();
    guard
}

fn file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}
