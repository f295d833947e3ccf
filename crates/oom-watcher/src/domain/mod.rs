pub mod oom_watcher;
