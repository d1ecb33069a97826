use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;

use crate::error::SchedulerError;

/// The parts of a stateful set's spec the scheduler needs: its replica
/// count and its volume claim templates.
pub struct StatefulSetShape {
    pub replicas: i32,
    pub volume_claim_templates: Vec<PersistentVolumeClaim>,
}

/// Finds `stateful_set_name` among `stateful_sets` and extracts the shape
/// the rest of the pipeline needs.
pub fn inspect(
    stateful_sets: &[StatefulSet],
    stateful_set_name: &str,
    namespace: &str,
) -> Result<StatefulSetShape, SchedulerError> {
    let found = stateful_sets
        .iter()
        .find(|ss| ss.metadata.name.as_deref() == Some(stateful_set_name))
        .ok_or_else(|| SchedulerError::StatefulSetNotFound {
            name: stateful_set_name.to_owned(),
            namespace: namespace.to_owned(),
        })?;

    let spec = found.spec.as_ref().ok_or_else(|| SchedulerError::StatefulSetNotFound {
        name: stateful_set_name.to_owned(),
        namespace: namespace.to_owned(),
    })?;

    Ok(StatefulSetShape {
        replicas: spec.replicas.unwrap_or(1),
        volume_claim_templates: spec.volume_claim_templates.clone().unwrap_or_default(),
    })
}
