use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Event;
use k8s_openapi::api::core::v1::EventSource;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::PostParams;
use kube::Api;
use kube::Client;
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::types::KubernetesError;
use crate::domain::oom_watcher::Notification;
use crate::domain::oom_watcher::NotificationRecorder;

/// Events about cluster-scoped objects land in this namespace.
const DEFAULT_NAMESPACE: &str = "default";

/// Identifies the reporter in recorded events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSourceInfo {
    pub component: String,
    pub host: String,
}

/// Records notifications as Kubernetes `Event` objects.
///
/// `publish_at` never blocks: notifications are queued for a background sink
/// task which writes them to the API server one at a time. Write failures are
/// logged and the notification is dropped.
#[derive(Debug, Clone)]
pub struct KubeEventRecorder {
    sender: mpsc::UnboundedSender<Notification>,
}

impl KubeEventRecorder {
    /// Create the recorder and spawn its sink task. The sink stops when
    /// `cancellation_token` fires or every recorder clone is dropped.
    pub fn spawn(
        client: Client,
        source: EventSourceInfo,
        cancellation_token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let sink = tokio::spawn(run_sink(client, source, receiver, cancellation_token));
        (Self { sender }, sink)
    }
}

impl NotificationRecorder for KubeEventRecorder {
    fn publish_at(&self, notification: Notification) {
        if let Err(e) = self.sender.send(notification) {
            warn!(
                reason = e.0.reason,
                note = %e.0.message,
                "Event sink stopped, dropping notification"
            );
        }
    }
}

#[tracing::instrument(skip_all, fields(component = %source.component, host = %source.host))]
async fn run_sink(
    client: Client,
    source: EventSourceInfo,
    mut receiver: mpsc::UnboundedReceiver<Notification>,
    cancellation_token: CancellationToken,
) {
    info!("Starting event sink");
    loop {
        select! {
            _ = cancellation_token.cancelled() => {
                info!("Event sink shutdown requested");
                break;
            }
            notification = receiver.recv() => {
                let Some(notification) = notification else {
                    info!("All recorders dropped, stopping event sink");
                    break;
                };
                if let Err(e) = write_event(&client, &source, &notification).await {
                    error!("Failed to record event: {e:?}");
                }
            }
        }
    }
}

async fn write_event(
    client: &Client,
    source: &EventSourceInfo,
    notification: &Notification,
) -> Result<(), Report<KubernetesError>> {
    let event = build_event(notification, source);
    let namespace = event
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let api: Api<Event> = Api::namespaced(client.clone(), &namespace);

    api.create(&PostParams::default(), &event)
        .await
        .change_context_lazy(|| KubernetesError::EventWriteFailed {
            message: format!(
                "{} for {:?}",
                notification.reason, notification.target.name
            ),
        })?;
    Ok(())
}

/// Map a notification to the `core/v1` event written for it.
pub(crate) fn build_event(notification: &Notification, source: &EventSourceInfo) -> Event {
    let target = notification.target.as_ref();
    let target_name = target.name.clone().unwrap_or_default();
    let namespace = target
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let nanos = notification.timestamp.timestamp_nanos_opt().unwrap_or_default();
    let timestamp = Time(notification.timestamp);

    Event {
        metadata: ObjectMeta {
            name: Some(format!("{target_name}.{nanos:x}")),
            namespace: Some(namespace),
            ..Default::default()
        },
        involved_object: target.clone(),
        reason: Some(notification.reason.to_string()),
        message: Some(notification.message.clone()),
        type_: Some(notification.severity.to_string()),
        first_timestamp: Some(timestamp.clone()),
        last_timestamp: Some(timestamp),
        count: Some(1),
        source: Some(EventSource {
            component: Some(source.component.clone()),
            host: Some(source.host.clone()),
        }),
        reporting_component: Some(source.component.clone()),
        reporting_instance: Some(source.host.clone()),
        ..Default::default()
    }
}
