pub mod binder;
pub mod data_centre;
pub mod match_expr;
pub mod node_filter;
pub mod pod_affinity;
pub mod scorer;
pub mod stateful_set;
pub mod volume_planner;
pub mod watch;

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;

use crate::api::SchedulerApi;
use crate::config::Config;
use crate::error::SchedulerError;
use crate::quantity::QuantityExt;

/// Runs the full per-pod scheduling decision: admit, inspect the owning
/// stateful set, choose a data centre, filter and score nodes, plan and
/// bind any required volumes, and finally bind the pod to a node.
///
/// Every stage after admission can fail; the watch loop that drives this
/// catches the error, logs it, and moves on to the next event rather
/// than aborting.
pub struct Orchestrator {
    api: Arc<dyn SchedulerApi>,
    config: Config,
    scheduler_name: String,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn SchedulerApi>, config: Config, scheduler_name: String) -> Self {
        Orchestrator {
            api,
            config,
            scheduler_name,
        }
    }

    /// Processes one admitted pod through the full decision pipeline.
    /// Returns `Ok(())` once the pod has been bound to a node (and, if
    /// it has volume claims, those have been bound too).
    pub async fn schedule_pod(&self, pod: &Pod) -> Result<(), SchedulerError> {
        let Some(admitted) = watch::admit(pod, &self.scheduler_name) else {
            return Ok(());
        };

        let pod_name = admitted.pod.metadata.name.clone().unwrap_or_default();
        log::info!("admitted pod {pod_name} for stateful set {}", admitted.stateful_set_name);

        let stateful_sets = self.api.list_stateful_sets(&self.config.namespace).await?;
        let shape = stateful_set::inspect(&stateful_sets, &admitted.stateful_set_name, &self.config.namespace)?;

        let data_centre = data_centre::choose_data_centre(
            &pod_name,
            shape.replicas,
            &self.config.primary_data_centres,
            &self.config.no_primary_data_centres,
        )?;
        log::debug!("pod {pod_name} assigned to data centre {data_centre}");

        let all_nodes = self.api.list_nodes().await?;
        let in_data_centre = node_filter::ready_nodes_in_data_centre(
            &all_nodes,
            &self.config.data_centres_label,
            &data_centre,
        );

        let all_pods = self.api.list_pods(&self.config.namespace).await?;
        let running_pods: Vec<Pod> = all_pods
            .into_iter()
            .filter(|p| p.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running"))
            .collect();

        let (required_anti_affinity, required_affinity) = required_pod_affinity_terms(pod);
        let affinity_filtered = pod_affinity::filter_by_pod_affinity(
            in_data_centre,
            &required_anti_affinity,
            &required_affinity,
            &running_pods,
        );

        let (requested_cpu, requested_mem) = requested_resources(pod);
        let scored = scorer::score_and_sort(affinity_filtered, requested_cpu, requested_mem);

        if scored.is_empty() {
            return Err(SchedulerError::UnschedulableNodes {
                pod: pod_name,
                reason: "no node survived filtering and scoring".into(),
            });
        }

        let candidate_nodes: Vec<_> = scored.iter().map(|s| s.node).collect();

        let chosen_node_name = if shape.volume_claim_templates.is_empty() {
            candidate_nodes[0].metadata.name.clone().unwrap_or_default()
        } else {
            self.plan_and_bind_volumes(&pod_name, candidate_nodes, &shape.volume_claim_templates)
                .await?
        };

        log::info!("binding pod {pod_name} to node {chosen_node_name}");
        self.api
            .create_binding(&pod_name, &self.config.namespace, &chosen_node_name)
            .await
    }

    async fn plan_and_bind_volumes(
        &self,
        pod_name: &str,
        candidate_nodes: Vec<&k8s_openapi::api::core::v1::Node>,
        templates: &[k8s_openapi::api::core::v1::PersistentVolumeClaim],
    ) -> Result<String, SchedulerError> {
        let mut storage_classes: Vec<String> = templates
            .iter()
            .filter_map(|t| t.spec.as_ref()?.storage_class_name.clone())
            .collect();
        storage_classes.sort();
        storage_classes.dedup();

        let template_names: Vec<String> = templates
            .iter()
            .filter_map(|t| t.metadata.name.clone())
            .collect();

        let all_pvs = self.api.list_persistent_volumes().await?;
        let all_pvcs = self.api.list_persistent_volume_claims(&self.config.namespace).await?;

        let pvs = volume_planner::gather_persistent_volumes(&all_pvs, &storage_classes, pod_name);
        let pod_pvcs = volume_planner::gather_persistent_volume_claims(&all_pvcs, &template_names, pod_name);

        let states = volume_planner::classify(&pvs, &pod_pvcs);
        let plan = volume_planner::plan_volumes(pod_name, candidate_nodes, states)?;

        let chosen = plan.chosen_node.metadata.name.clone().unwrap_or_default();
        binder::bind_volumes(self.api.as_ref(), &self.config.namespace, &plan).await?;

        Ok(chosen)
    }
}

fn requested_resources(pod: &Pod) -> (i64, i64) {
    let mut total_cpu = 0;
    let mut total_mem = 0;

    let Some(spec) = &pod.spec else { return (0, 0) };
    for container in &spec.containers {
        let Some(resources) = &container.resources else { continue };
        let Some(requests) = &resources.requests else { continue };
        if let Some(cpu) = requests.get("cpu").and_then(|q| q.to_milli_cpus().ok().flatten()) {
            total_cpu += cpu;
        }
        if let Some(mem) = requests.get("memory").and_then(|q| q.to_bytes().ok().flatten()) {
            total_mem += mem;
        }
    }

    (total_cpu, total_mem)
}

fn required_pod_affinity_terms(
    pod: &Pod,
) -> (
    Vec<k8s_openapi::api::core::v1::PodAffinityTerm>,
    Vec<k8s_openapi::api::core::v1::PodAffinityTerm>,
) {
    let Some(affinity) = pod.spec.as_ref().and_then(|s| s.affinity.as_ref()) else {
        return (Vec::new(), Vec::new());
    };

    if let Some(preferred) = affinity
        .pod_anti_affinity
        .as_ref()
        .and_then(|a| a.preferred_during_scheduling_ignored_during_execution.as_ref())
    {
        if !preferred.is_empty() {
            log::warn!("preferred pod anti-affinity is not implemented, ignoring");
        }
    }
    if let Some(preferred) = affinity
        .pod_affinity
        .as_ref()
        .and_then(|a| a.preferred_during_scheduling_ignored_during_execution.as_ref())
    {
        if !preferred.is_empty() {
            log::warn!("preferred pod affinity is not implemented, ignoring");
        }
    }

    let anti_affinity = affinity
        .pod_anti_affinity
        .as_ref()
        .and_then(|a| a.required_during_scheduling_ignored_during_execution.clone())
        .unwrap_or_default();
    let pod_affinity = affinity
        .pod_affinity
        .as_ref()
        .and_then(|a| a.required_during_scheduling_ignored_during_execution.clone())
        .unwrap_or_default();

    (anti_affinity, pod_affinity)
}
