use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim};
use regex::Regex;

use crate::error::SchedulerError;
use crate::quantity::QuantityExt;
use crate::scheduler::match_expr::{label_requirement_matches, MatchOperator};

const AVAILABLE: &str = "Available";
const BOUND: &str = "Bound";
const PENDING: &str = "Pending";

/// Narrows the cluster's full PV list down to the ones relevant to this
/// pod: available volumes of a storage class the stateful set's claim
/// templates ask for, plus any volume already bound to a claim named
/// `{storage_class}-{pod_name}` (preserving the original binder's
/// matching rule, odd as it is — a volume bound under that name is this
/// pod's own volume reappearing across a reschedule).
pub fn gather_persistent_volumes<'a>(
    all_pvs: &'a [PersistentVolume],
    storage_classes: &[String],
    pod_name: &str,
) -> Vec<&'a PersistentVolume> {
    all_pvs
        .iter()
        .filter(|pv| {
            let Some(spec) = &pv.spec else { return false };
            let Some(phase) = pv.status.as_ref().and_then(|s| s.phase.as_deref()) else {
                return false;
            };
            storage_classes.iter().any(|sc| {
                spec.storage_class_name.as_deref() == Some(sc)
                    && (phase == AVAILABLE
                        || (phase == BOUND
                            && spec
                                .claim_ref
                                .as_ref()
                                .and_then(|c| c.name.as_deref())
                                == Some(&format!("{sc}-{pod_name}"))))
            })
        })
        .collect()
}

/// Narrows the namespace's full PVC list down to this pod's claims: one
/// per volume claim template name, matched by the `^{template}-{pod}.*$`
/// naming convention stateful sets use, in `Pending` or `Bound` phase.
pub fn gather_persistent_volume_claims<'a>(
    all_pvcs: &'a [PersistentVolumeClaim],
    template_names: &[String],
    pod_name: &str,
) -> Vec<&'a PersistentVolumeClaim> {
    all_pvcs
        .iter()
        .filter(|pvc| {
            let Some(phase) = pvc.status.as_ref().and_then(|s| s.phase.as_deref()) else {
                return false;
            };
            if phase != PENDING && phase != BOUND {
                return false;
            }
            let Some(name) = pvc.metadata.name.as_deref() else {
                return false;
            };
            template_names.iter().any(|template| {
                Regex::new(&format!("^{}-{}.*$", regex::escape(template), regex::escape(pod_name)))
                    .map(|re| re.is_match(name))
                    .unwrap_or(false)
            })
        })
        .collect()
}

pub enum PvcState<'a> {
    /// Already bound to a specific PV; nothing to allocate.
    Allocated {
        pvc: &'a PersistentVolumeClaim,
        pv: &'a PersistentVolume,
    },
    /// Unbound, with one or more unclaimed PVs of adequate capacity.
    Allocatable {
        pvc: &'a PersistentVolumeClaim,
        candidates: Vec<&'a PersistentVolume>,
    },
    /// Unbound, with no PV able to satisfy it.
    Unallocatable { pvc_name: String },
}

/// Classifies each of the pod's PVCs as already bound, allocatable
/// against one or more free PVs, or unallocatable.
pub fn classify<'a>(
    pvs: &[&'a PersistentVolume],
    pod_pvcs: &[&'a PersistentVolumeClaim],
) -> Vec<PvcState<'a>> {
    pod_pvcs
        .iter()
        .map(|pvc| classify_one(pvs, pvc))
        .collect()
}

fn classify_one<'a>(pvs: &[&'a PersistentVolume], pvc: &'a PersistentVolumeClaim) -> PvcState<'a> {
    let phase = pvc.status.as_ref().and_then(|s| s.phase.as_deref());
    let pvc_name = pvc.metadata.name.clone().unwrap_or_default();

    if phase == Some(BOUND) {
        if let Some(pv) = pvs
            .iter()
            .find(|pv| {
                pv.spec
                    .as_ref()
                    .and_then(|s| s.claim_ref.as_ref())
                    .and_then(|c| c.name.as_deref())
                    == Some(pvc_name.as_str())
            })
            .copied()
        {
            return PvcState::Allocated { pvc, pv };
        }
        return PvcState::Unallocatable { pvc_name };
    }

    let requested = pvc
        .spec
        .as_ref()
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get("storage"))
        .and_then(|q| q.to_bytes().ok().flatten());

    let Some(requested) = requested else {
        return PvcState::Unallocatable { pvc_name };
    };

    let mut candidates: Vec<&PersistentVolume> = pvs
        .iter()
        .filter(|pv| {
            let spec = match &pv.spec {
                Some(s) => s,
                None => return false,
            };
            if spec.claim_ref.is_some() {
                return false;
            }
            spec.capacity
                .as_ref()
                .and_then(|c| c.get("storage"))
                .and_then(|q| q.to_bytes().ok().flatten())
                .map(|cap| cap >= requested)
                .unwrap_or(false)
        })
        .copied()
        .collect();

    candidates.sort_by_key(|pv| {
        std::cmp::Reverse(
            pv.spec
                .as_ref()
                .and_then(|s| s.capacity.as_ref())
                .and_then(|c| c.get("storage"))
                .and_then(|q| q.to_bytes().ok().flatten())
                .unwrap_or(0),
        )
    });

    if candidates.is_empty() {
        PvcState::Unallocatable { pvc_name }
    } else {
        PvcState::Allocatable { pvc, candidates }
    }
}

/// Evaluates a PV's `spec.nodeAffinity.required` against a node's labels.
/// A PV with no node affinity configured passes for every node.
pub fn node_satisfies_volume_affinity(pv: &PersistentVolume, node: &Node) -> bool {
    let Some(spec) = &pv.spec else { return true };
    let Some(affinity) = &spec.node_affinity else { return true };
    let Some(required) = &affinity.required else { return true };

    let labels = node.metadata.labels.clone().unwrap_or_default();

    required.node_selector_terms.iter().any(|term| {
        term.match_expressions
            .as_ref()
            .map(|exprs| {
                exprs.iter().all(|expr| {
                    let op = MatchOperator::parse(&expr.operator);
                    let values = expr.values.clone().unwrap_or_default();
                    label_requirement_matches(&labels, &expr.key, op, &values)
                })
            })
            .unwrap_or(true)
    })
}

pub struct VolumePlan<'a> {
    pub chosen_node: &'a Node,
    pub already_bound: Vec<(&'a PersistentVolumeClaim, &'a PersistentVolume)>,
    pub bindings: Vec<(&'a PersistentVolumeClaim, &'a PersistentVolume)>,
}

/// Winnows `nodes` down to the ones whose volume affinity is compatible
/// with every already-bound PV and at least one allocatable PV per PVC,
/// takes the highest-scored survivor (`nodes` arrives pre-sorted by the
/// scorer) as the chosen node, then — per §4.7(c).2 — strikes every
/// candidate PV that doesn't itself satisfy *that* node's affinity
/// before deduplicating the remainder into a PVC-to-PV bijection. This
/// keeps a PVC from being bound to a PV whose node affinity only some
/// other surviving node happened to satisfy.
///
/// Returns an error naming the pod if any PVC has no PV at all, or if no
/// node survives winnowing.
pub fn plan_volumes<'a>(
    pod_name: &str,
    nodes: Vec<&'a Node>,
    states: Vec<PvcState<'a>>,
) -> Result<VolumePlan<'a>, SchedulerError> {
    let mut already_bound = Vec::new();
    let mut allocatable = Vec::new();

    for state in states {
        match state {
            PvcState::Allocated { pvc, pv } => already_bound.push((pvc, pv)),
            PvcState::Allocatable { pvc, candidates } => allocatable.push((pvc, candidates)),
            PvcState::Unallocatable { pvc_name } => {
                return Err(SchedulerError::UnschedulableVolumes {
                    pod: pod_name.to_owned(),
                    reason: format!("no PV available for claim {pvc_name}"),
                });
            }
        }
    }

    let winnowed: Vec<&Node> = nodes
        .into_iter()
        .filter(|node| {
            already_bound
                .iter()
                .all(|(_, pv)| node_satisfies_volume_affinity(pv, node))
        })
        .filter(|node| {
            allocatable
                .iter()
                .all(|(_, candidates)| candidates.iter().any(|pv| node_satisfies_volume_affinity(pv, node)))
        })
        .collect();

    let Some(chosen_node) = winnowed.into_iter().next() else {
        return Err(SchedulerError::UnschedulableVolumes {
            pod: pod_name.to_owned(),
            reason: "no node satisfies volume node-affinity for every PVC".into(),
        });
    };

    let restricted: Vec<(&'a PersistentVolumeClaim, Vec<&'a PersistentVolume>)> = allocatable
        .into_iter()
        .map(|(pvc, candidates)| {
            let candidates = candidates
                .into_iter()
                .filter(|pv| node_satisfies_volume_affinity(pv, chosen_node))
                .collect();
            (pvc, candidates)
        })
        .collect();

    let bindings = dedup_bindings(&restricted);

    Ok(VolumePlan {
        chosen_node,
        already_bound,
        bindings,
    })
}

/// For each PVC in order, claims the first candidate PV not already
/// claimed by an earlier PVC, tracked via an index-based consumed set
/// rather than deep-copying and mutating the candidate lists. Expects
/// candidates already restricted to the chosen node's affinity.
fn dedup_bindings<'a>(
    allocatable: &[(&'a PersistentVolumeClaim, Vec<&'a PersistentVolume>)],
) -> Vec<(&'a PersistentVolumeClaim, &'a PersistentVolume)> {
    let mut consumed: BTreeSet<String> = BTreeSet::new();
    let mut bindings = Vec::new();

    for (pvc, candidates) in allocatable {
        if let Some(pv) = candidates
            .iter()
            .find(|pv| !consumed.contains(pv.metadata.name.as_deref().unwrap_or_default()))
        {
            consumed.insert(pv.metadata.name.clone().unwrap_or_default());
            bindings.push((*pvc, *pv));
        }
    }

    bindings
}
