use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim, Pod};
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::runtime::watcher;
use kube::{Api, Client};

use crate::api::SchedulerApi;
use crate::error::SchedulerError;

const MAX_BIND_ATTEMPTS: u32 = 5;
const CONFLICT_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Talks to a real cluster via [`kube::Client`]. The only production
/// implementation of [`SchedulerApi`].
pub struct KubeApiClient {
    client: Client,
}

impl KubeApiClient {
    /// Builds a client from `~/.kube/config` if present, falling back to
    /// the in-cluster service account.
    pub async fn create() -> Result<Self, SchedulerError> {
        let client = Client::try_default()
            .await
            .or_else(|_| {
                kube::Config::incluster_env()
                    .map_err(|e| kube::Error::Service(e.into()))
                    .and_then(Client::try_from)
            })
            .map_err(|e| SchedulerError::Startup(format!("could not build Kubernetes client: {e}")))?;

        Ok(KubeApiClient { client })
    }

    fn client(&self) -> Client {
        self.client.clone()
    }

    /// Patches `pv`/`pvc`, retrying a bounded number of times when the
    /// API server reports a write conflict. Mirrors the binder's
    /// original retry policy: five attempts, five seconds apart.
    async fn patch_with_conflict_retry<K, F>(
        api: &Api<K>,
        name: &str,
        make_patch: F,
    ) -> Result<(), SchedulerError>
    where
        K: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
        K::DynamicType: Default,
        F: Fn() -> serde_json::Value,
    {
        retry_on_conflict(name, || async {
            let patch = Patch::Merge(make_patch());
            api.patch(name, &PatchParams::default(), &patch).await
        })
        .await
    }
}

/// Runs `attempt` up to [`MAX_BIND_ATTEMPTS`] times, retrying on a 409
/// conflict and sleeping [`CONFLICT_RETRY_DELAY`] between tries. Pulled
/// out of [`KubeApiClient::patch_with_conflict_retry`] so the policy
/// itself can be exercised without a live API server.
async fn retry_on_conflict<T, F, Fut>(name: &str, mut attempt: F) -> Result<(), SchedulerError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, kube::Error>>,
{
    let mut attempts = 0;
    loop {
        match attempt().await {
            Ok(_) => return Ok(()),
            Err(kube::Error::Api(ref e)) if e.code == 409 && attempts < MAX_BIND_ATTEMPTS => {
                attempts += 1;
                log::info!("conflict patching {name}, retrying ({attempts}/{MAX_BIND_ATTEMPTS})");
                tokio::time::sleep(CONFLICT_RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(SchedulerError::Transient {
                    attempts,
                    source: e,
                })
            }
        }
    }
}

#[async_trait]
impl SchedulerApi for KubeApiClient {
    async fn watch_pods(&self, namespace: &str) -> Result<BoxStream<'static, Result<Pod, SchedulerError>>, SchedulerError> {
        let pods = Api::<Pod>::namespaced(self.client(), namespace);
        let stream = watcher(pods, watcher::Config::default()).flat_map(|event| {
            let items: Vec<Result<Pod, SchedulerError>> = match event {
                Ok(event) => event.into_iter_applied().map(Ok).collect(),
                Err(e) => vec![Err(SchedulerError::Watch(e.to_string()))],
            };
            futures_util::stream::iter(items)
        });

        Ok(stream.boxed())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, SchedulerError> {
        let nodes = Api::<Node>::all(self.client());
        Ok(nodes.list(&ListParams::default()).await?.items)
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, SchedulerError> {
        let pods = Api::<Pod>::namespaced(self.client(), namespace);
        Ok(pods.list(&ListParams::default()).await?.items)
    }

    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<StatefulSet>, SchedulerError> {
        let stateful_sets = Api::<StatefulSet>::namespaced(self.client(), namespace);
        Ok(stateful_sets.list(&ListParams::default()).await?.items)
    }

    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>, SchedulerError> {
        let pvs = Api::<PersistentVolume>::all(self.client());
        Ok(pvs.list(&ListParams::default()).await?.items)
    }

    async fn list_persistent_volume_claims(
        &self,
        namespace: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, SchedulerError> {
        let pvcs = Api::<PersistentVolumeClaim>::namespaced(self.client(), namespace);
        Ok(pvcs.list(&ListParams::default()).await?.items)
    }

    async fn bind_persistent_volume(
        &self,
        pv_name: &str,
        pvc_name: &str,
        pvc_namespace: &str,
    ) -> Result<(), SchedulerError> {
        let pvs = Api::<PersistentVolume>::all(self.client());
        Self::patch_with_conflict_retry(&pvs, pv_name, || {
            serde_json::json!({
                "spec": {
                    "claimRef": {
                        "apiVersion": "v1",
                        "kind": "PersistentVolumeClaim",
                        "name": pvc_name,
                        "namespace": pvc_namespace,
                    }
                }
            })
        })
        .await
    }

    async fn bind_persistent_volume_claim(
        &self,
        pvc_name: &str,
        namespace: &str,
        pv_name: &str,
    ) -> Result<(), SchedulerError> {
        let pvcs = Api::<PersistentVolumeClaim>::namespaced(self.client(), namespace);
        Self::patch_with_conflict_retry(&pvcs, pvc_name, || {
            serde_json::json!({
                "spec": {
                    "volumeName": pv_name,
                }
            })
        })
        .await
    }

    async fn create_binding(
        &self,
        pod_name: &str,
        namespace: &str,
        node_name: &str,
    ) -> Result<(), SchedulerError> {
        use k8s_openapi::api::core::v1::{Binding, ObjectReference};
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

        let binding = Binding {
            metadata: ObjectMeta {
                name: Some(pod_name.to_owned()),
                ..Default::default()
            },
            target: ObjectReference {
                api_version: Some("v1".into()),
                kind: Some("Node".into()),
                name: Some(node_name.to_owned()),
                ..Default::default()
            },
        };

        // Binding is a subresource of Pod, not a freestanding listable
        // resource, so it has no Api<Binding> of its own; this call goes
        // straight through the generated request builder instead.
        let (request, _) = Pod::create_namespaced_binding(
            pod_name,
            namespace,
            &PostParams::default(),
            &binding,
        )
        .map_err(|e| SchedulerError::Startup(format!("could not build binding request: {e}")))?;

        let _: Binding = self
            .client()
            .request(request)
            .await
            .map_err(SchedulerError::from)?;

        log::info!("pod {} bound to node {}", pod_name, node_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn conflict() -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "Operation cannot be fulfilled: the object has been modified".into(),
            reason: "Conflict".into(),
            code: 409,
        })
    }

    fn not_found() -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "not found".into(),
            reason: "NotFound".into(),
            code: 404,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn retries_on_conflict_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_closure = calls.clone();

        let result = retry_on_conflict::<(), _, _>("pv-a", move || {
            let calls = calls_in_closure.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(conflict())
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_closure = calls.clone();

        let result = retry_on_conflict::<(), _, _>("pv-a", move || {
            let calls = calls_in_closure.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(conflict())
            }
        })
        .await;

        match result {
            Err(SchedulerError::Transient { attempts, .. }) => {
                assert_eq!(attempts, MAX_BIND_ATTEMPTS);
            }
            other => panic!("expected Transient error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), MAX_BIND_ATTEMPTS + 1);
    }

    #[tokio::test]
    async fn non_conflict_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_closure = calls.clone();

        let result = retry_on_conflict::<(), _, _>("pv-a", move || {
            let calls = calls_in_closure.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(not_found())
            }
        })
        .await;

        assert!(matches!(result, Err(SchedulerError::Transient { attempts: 0, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
