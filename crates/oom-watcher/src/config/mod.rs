pub mod cli;
pub mod daemon;

pub use cli::*;
pub use daemon::*;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::CommandFactory;
    use clap::FromArgMatches;
    use similar_asserts::assert_eq;

    use super::*;

    const ENV_BACKED_ARGS: [&str; 3] = ["node_name", "kubeconfig", "kmsg_path"];

    /// Parse `argv` with the environment fallbacks removed, so variables set
    /// on the machine running the tests cannot leak into the result.
    fn parse_daemon_args(argv: &[&str]) -> DaemonArgs {
        let command = Cli::command().mut_subcommand("daemon", |daemon| {
            ENV_BACKED_ARGS.iter().fold(daemon, |daemon, id| {
                daemon.mut_arg(*id, |arg| arg.env(None::<&'static str>))
            })
        });
        let matches = command.try_get_matches_from(argv).expect("should parse");
        let cli = Cli::from_arg_matches(&matches).expect("should map to Cli");
        let Commands::Daemon(args) = cli.command;
        *args
    }

    #[test]
    fn daemon_defaults() {
        let args = parse_daemon_args(&["oom-watcher", "daemon", "--node-name", "worker-1"]);

        assert_eq!(args.node_name, "worker-1");
        assert_eq!(args.kubeconfig, None);
        assert!(args.enable_k8s);
        assert_eq!(args.kmsg_path, PathBuf::from("/dev/kmsg"));
        assert!(!args.replay_kmsg);
        assert_eq!(args.component, "oom-watcher");
    }

    #[test]
    fn daemon_overrides() {
        let args = parse_daemon_args(&[
            "oom-watcher",
            "daemon",
            "--node-name",
            "worker-2",
            "--enable-k8s",
            "false",
            "--kmsg-path",
            "/tmp/kmsg",
            "--replay-kmsg",
            "--component",
            "kubelet",
        ]);

        assert!(!args.enable_k8s);
        assert_eq!(args.kmsg_path, PathBuf::from("/tmp/kmsg"));
        assert!(args.replay_kmsg);
        assert_eq!(args.component, "kubelet");
    }
}
