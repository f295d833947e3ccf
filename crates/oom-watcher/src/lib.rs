pub mod app;
pub mod config;
mod domain;
mod infrastructure;

// Re-export main modules
pub use domain::oom_watcher;
pub use infrastructure::k8s;
pub use infrastructure::kmsg;
pub use infrastructure::log_recorder;
pub use infrastructure::logging;
