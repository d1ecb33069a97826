use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};

use crate::api::SchedulerApi;
use crate::error::SchedulerError;
use crate::scheduler::volume_planner::VolumePlan;

/// Binds every PVC-to-PV pair in `plan.bindings`: first patches each PV's
/// `claimRef`, then — only if every PV patch succeeded — patches each
/// PVC's `volumeName`. A failure partway through leaves whatever PVs
/// were already patched bound and does not roll them back; the pod
/// simply stays unscheduled and is retried on the next watch event.
pub async fn bind_volumes(
    api: &dyn SchedulerApi,
    namespace: &str,
    plan: &VolumePlan<'_>,
) -> Result<(), SchedulerError> {
    for (pvc, pv) in &plan.bindings {
        bind_one_pv(api, namespace, pvc, pv).await?;
    }

    for (pvc, pv) in &plan.bindings {
        bind_one_pvc(api, namespace, pvc, pv).await?;
    }

    Ok(())
}

async fn bind_one_pv(
    api: &dyn SchedulerApi,
    namespace: &str,
    pvc: &PersistentVolumeClaim,
    pv: &PersistentVolume,
) -> Result<(), SchedulerError> {
    let pv_name = pv.metadata.name.as_deref().unwrap_or_default();
    let pvc_name = pvc.metadata.name.as_deref().unwrap_or_default();
    log::info!("binding PV {pv_name} to PVC {pvc_name}");
    api.bind_persistent_volume(pv_name, pvc_name, namespace).await
}

async fn bind_one_pvc(
    api: &dyn SchedulerApi,
    namespace: &str,
    pvc: &PersistentVolumeClaim,
    pv: &PersistentVolume,
) -> Result<(), SchedulerError> {
    let pv_name = pv.metadata.name.as_deref().unwrap_or_default();
    let pvc_name = pvc.metadata.name.as_deref().unwrap_or_default();
    log::info!("binding PVC {pvc_name} to PV {pv_name}");
    api.bind_persistent_volume_claim(pvc_name, namespace, pv_name).await
}
