use k8s_openapi::api::core::v1::Node;

use crate::quantity::QuantityExt;

/// A node paired with its fractional resource score, kept alongside the
/// node rather than stuffed into a label the way the original does it.
pub struct ScoredNode<'a> {
    pub node: &'a Node,
    pub score: f64,
}

/// Scores every candidate node by remaining CPU and memory headroom
/// after subtracting the pod's requested CPU (milli-cpus) and memory
/// (bytes), drops nodes whose score is zero or negative, and returns the
/// survivors sorted by score, highest first.
///
/// `score = (cpuCapacity - requestedCpu) / cpuCapacity
///         + (memCapacity - requestedMem) / memCapacity`
pub fn score_and_sort<'a>(
    candidates: Vec<&'a Node>,
    requested_cpu_millis: i64,
    requested_mem_bytes: i64,
) -> Vec<ScoredNode<'a>> {
    let mut scored: Vec<ScoredNode<'a>> = candidates
        .into_iter()
        .filter_map(|node| {
            let score = node_score(node, requested_cpu_millis, requested_mem_bytes)?;
            Some(ScoredNode { node, score })
        })
        .filter(|scored| scored.score > 0.0)
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

fn node_score(node: &Node, requested_cpu_millis: i64, requested_mem_bytes: i64) -> Option<f64> {
    let capacity = node.status.as_ref()?.capacity.as_ref()?;

    let cpu_capacity = capacity.get("cpu")?.to_milli_cpus().ok().flatten()?;
    let mem_capacity = capacity.get("memory")?.to_bytes().ok().flatten()?;

    if cpu_capacity == 0 || mem_capacity == 0 {
        log::warn!(
            "node {:?} reports zero capacity, excluding from scoring",
            node.metadata.name
        );
        return None;
    }

    let cpu_score = (cpu_capacity - requested_cpu_millis) as f64 / cpu_capacity as f64;
    let mem_score = (mem_capacity - requested_mem_bytes) as f64 / mem_capacity as f64;

    Some(cpu_score + mem_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::NodeStatus;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn node(name: &str, cpu: &str, mem: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                capacity: Some(BTreeMap::from([
                    ("cpu".to_string(), Quantity(cpu.into())),
                    ("memory".to_string(), Quantity(mem.into())),
                ])),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn scores_descending_by_headroom() {
        let tight = node("tight", "2", "2Gi");
        let roomy = node("roomy", "8", "16Gi");

        let scored = score_and_sort(vec![&tight, &roomy], 1000, 1024 * 1024 * 1024);

        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].node.metadata.name.as_deref(), Some("roomy"));
        assert_eq!(scored[1].node.metadata.name.as_deref(), Some("tight"));
    }

    #[test]
    fn overcommitted_node_is_dropped() {
        let overcommitted = node("small", "1", "1Gi");

        let scored = score_and_sort(vec![&overcommitted], 2000, 0);

        assert!(scored.is_empty());
    }

    #[test]
    fn missing_capacity_excludes_node() {
        let mut n = node("no-status", "2", "2Gi");
        n.status = None;

        let scored = score_and_sort(vec![&n], 0, 0);

        assert!(scored.is_empty());
    }
}
