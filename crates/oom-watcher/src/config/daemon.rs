use std::path::PathBuf;

use clap::Parser;

use crate::infrastructure::kmsg::DEFAULT_KMSG_PATH;

#[derive(Parser, Debug, Clone)]
pub struct DaemonArgs {
    #[arg(
        long,
        env = "NODE_NAME",
        help = "Name of the node this watcher runs on; events are attached to this Node object"
    )]
    pub node_name: String,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to the kubeconfig file; defaults to in-cluster or default kubeconfig"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        help = "Record OOM events through the Kubernetes API; when disabled they are only logged",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enable_k8s: bool,

    #[arg(
        long,
        env = "KMSG_PATH",
        value_hint = clap::ValueHint::FilePath,
        default_value = DEFAULT_KMSG_PATH,
        help = "Kernel log device to read OOM kills from"
    )]
    pub kmsg_path: PathBuf,

    #[arg(
        long,
        help = "Also report OOM kills already present in the kernel log at startup",
        default_value_t = false
    )]
    pub replay_kmsg: bool,

    #[arg(
        long,
        default_value = "oom-watcher",
        help = "Component name reported as the source of recorded events"
    )]
    pub component: String,
}
