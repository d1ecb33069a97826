pub mod kube_client;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim, Pod};

use crate::error::SchedulerError;

/// The orchestrator's entire view of the Kubernetes REST API, narrowed
/// down to exactly the calls the scheduling pipeline makes. Kept as a
/// trait so the decision pipeline can be driven by a fake in tests
/// instead of a live cluster; [`kube_client::KubeApiClient`] is the only
/// production implementation.
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    /// Streams every pod `Apply` event in `namespace`, already flattened
    /// out of `kube`'s `Event<Pod>` wrapper (a `Restarted` event yields
    /// one stream item per pod). The watch loop drives scheduling off
    /// this stream instead of talking to `kube::runtime::watcher`
    /// directly, so it can run against a fake in tests.
    async fn watch_pods(&self, namespace: &str) -> Result<BoxStream<'static, Result<Pod, SchedulerError>>, SchedulerError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, SchedulerError>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, SchedulerError>;

    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<StatefulSet>, SchedulerError>;

    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>, SchedulerError>;

    async fn list_persistent_volume_claims(
        &self,
        namespace: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, SchedulerError>;

    /// Sets `claim_ref` on a PV and patches it. Retries up to 5 times on
    /// a 409 conflict, sleeping 5 seconds between attempts.
    async fn bind_persistent_volume(
        &self,
        pv_name: &str,
        pvc_name: &str,
        pvc_namespace: &str,
    ) -> Result<(), SchedulerError>;

    /// Sets `spec.volumeName` on a PVC and patches it. Same retry policy
    /// as [`SchedulerApi::bind_persistent_volume`].
    async fn bind_persistent_volume_claim(
        &self,
        pvc_name: &str,
        namespace: &str,
        pv_name: &str,
    ) -> Result<(), SchedulerError>;

    /// Creates the `Binding` subresource that assigns `pod_name` to
    /// `node_name`. This is the terminal call of a successful scheduling
    /// decision.
    async fn create_binding(
        &self,
        pod_name: &str,
        namespace: &str,
        node_name: &str,
    ) -> Result<(), SchedulerError>;
}
