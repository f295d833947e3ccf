//! Kubernetes integration.
//!
//! Publishes watcher notifications as `core/v1` events attached to the node
//! object.
//!
//! - [`KubeEventRecorder`]: writes notifications through the API server
//! - [`node_reference`]: the object reference events are attached to

pub mod event_recorder;
pub mod kube_client;
pub mod types;

use k8s_openapi::api::core::v1::ObjectReference;

pub use event_recorder::EventSourceInfo;
pub use event_recorder::KubeEventRecorder;
pub use kube_client::init_kube_client;
pub use types::KubernetesError;

/// Reference to the node object. Nodes are cluster scoped, and the kubelet
/// uses the node name as its UID.
pub fn node_reference(node_name: &str) -> ObjectReference {
    ObjectReference {
        kind: Some("Node".to_string()),
        name: Some(node_name.to_string()),
        uid: Some(node_name.to_string()),
        namespace: None,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn node_reference_uses_name_as_uid() {
        let reference = node_reference("worker-1");
        assert_eq!(reference.kind.as_deref(), Some("Node"));
        assert_eq!(reference.name.as_deref(), Some("worker-1"));
        assert_eq!(reference.uid.as_deref(), Some("worker-1"));
        assert_eq!(reference.namespace, None);
    }
}
