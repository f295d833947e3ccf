use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::app::tasks;
use crate::app::tasks::Exit;
use crate::config::DaemonArgs;
use crate::domain::oom_watcher::NotificationRecorder;
use crate::domain::oom_watcher::OomWatcher;
use crate::infrastructure::k8s::init_kube_client;
use crate::infrastructure::k8s::node_reference;
use crate::infrastructure::k8s::EventSourceInfo;
use crate::infrastructure::k8s::KubeEventRecorder;
use crate::infrastructure::kmsg::KmsgMonitor;
use crate::infrastructure::log_recorder::LogRecorder;

const SINK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application core structure
pub struct Application {
    daemon_args: DaemonArgs,
    cancellation_token: CancellationToken,
}

impl Application {
    pub fn new(daemon_args: DaemonArgs) -> Self {
        Self {
            daemon_args,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn daemon_args(&self) -> &DaemonArgs {
        &self.daemon_args
    }

    /// Start the watcher and block until shutdown.
    ///
    /// Returns an error if the watcher cannot subscribe or its relay task
    /// stops, so that a supervisor can restart the daemon.
    pub async fn run(&self) -> Result<()> {
        if !self.daemon_args.enable_k8s {
            tracing::info!("Kubernetes disabled, OOM events will only be logged");
            return self.watch(Arc::new(LogRecorder)).await;
        }

        let client = init_kube_client(self.daemon_args.kubeconfig.clone())
            .await
            .map_err(|e| anyhow!("{e:?}"))?;
        let source = EventSourceInfo {
            component: self.daemon_args.component.clone(),
            host: self.daemon_args.node_name.clone(),
        };
        let (recorder, sink) =
            KubeEventRecorder::spawn(client, source, self.cancellation_token.clone());

        let result = self.watch(Arc::new(recorder)).await;

        self.cancellation_token.cancel();
        tasks::join_with_timeout("event sink", sink, SINK_SHUTDOWN_TIMEOUT).await;
        result
    }

    async fn watch<R: NotificationRecorder>(&self, recorder: Arc<R>) -> Result<()> {
        let args = &self.daemon_args;
        let monitor = KmsgMonitor::new(&args.kmsg_path).replay_existing(args.replay_kmsg);
        let watcher = OomWatcher::new(monitor, recorder);

        let relay = watcher
            .start(node_reference(&args.node_name))
            .map_err(|e| anyhow!("{e:?}"))?;
        tracing::info!(
            node = %args.node_name,
            kmsg = %args.kmsg_path.display(),
            "OOM watcher started"
        );

        match tasks::wait_for_exit(relay).await? {
            Exit::Signal => Ok(()),
            Exit::RelayStopped => Err(anyhow!("OOM relay stopped, watcher is no longer active")),
        }
    }
}
