use k8s_openapi::api::core::v1::Pod;

/// A pod this scheduler has decided to admit for scheduling, with the
/// stateful set name it's a member of already extracted.
pub struct AdmittedPod<'a> {
    pub pod: &'a Pod,
    pub stateful_set_name: String,
}

/// Decides whether `pod` is a fresh admission event this scheduler
/// should act on: still `Pending`, named as this scheduler, carrying no
/// status conditions yet, and owned by a `StatefulSet`.
///
/// Returns `None` for anything else, including a pod owned by something
/// other than a `StatefulSet` — this scheduler only places stateful set
/// members, and logs a warning rather than silently ignoring the event.
pub fn admit<'a>(pod: &'a Pod, scheduler_name: &str) -> Option<AdmittedPod<'a>> {
    let status = pod.status.as_ref()?;
    if status.phase.as_deref() != Some("Pending") {
        return None;
    }
    if status.conditions.is_some() {
        return None;
    }

    let spec = pod.spec.as_ref()?;
    if spec.scheduler_name.as_deref() != Some(scheduler_name) {
        return None;
    }

    let owner = pod.metadata.owner_references.as_ref()?.first()?;
    if owner.kind != "StatefulSet" {
        log::warn!(
            "pod {:?} is owned by {} {:?}, this scheduler only places StatefulSet members",
            pod.metadata.name,
            owner.kind,
            owner.name
        );
        return None;
    }

    Some(AdmittedPod {
        pod,
        stateful_set_name: owner.name.clone(),
    })
}
