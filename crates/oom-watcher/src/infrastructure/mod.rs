pub mod k8s;
pub mod kmsg;
pub mod log_recorder;
pub mod logging;
