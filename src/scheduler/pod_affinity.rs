use k8s_openapi::api::core::v1::{Pod, PodAffinityTerm};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;

use crate::config::NODE_HOSTNAME_KEY;
use crate::error::SchedulerError;
use crate::scheduler::match_expr::MatchOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    AntiAffinity,
    Affinity,
}

/// Filters `candidates` down to the nodes that satisfy every required pod
/// anti-affinity term, then every required pod affinity term, in that
/// order. `running_pods` is the full set of currently running pods in the
/// namespace, used as the comparison pool for every term.
///
/// Only the `kubernetes.io/hostname` topology key is supported; a term
/// naming any other key is logged and skipped rather than applied.
pub fn filter_by_pod_affinity<'a>(
    candidates: Vec<&'a k8s_openapi::api::core::v1::Node>,
    required_anti_affinity: &[PodAffinityTerm],
    required_affinity: &[PodAffinityTerm],
    running_pods: &[Pod],
) -> Vec<&'a k8s_openapi::api::core::v1::Node> {
    let after_anti_affinity: Vec<_> = candidates
        .into_iter()
        .filter(|node| {
            required_anti_affinity
                .iter()
                .all(|term| term_satisfied(term, running_pods, node, Kind::AntiAffinity))
        })
        .collect();

    after_anti_affinity
        .into_iter()
        .filter(|node| {
            required_affinity
                .iter()
                .all(|term| term_satisfied(term, running_pods, node, Kind::Affinity))
        })
        .collect()
}

fn term_satisfied(
    term: &PodAffinityTerm,
    running_pods: &[Pod],
    node: &k8s_openapi::api::core::v1::Node,
    kind: Kind,
) -> bool {
    if term.topology_key != NODE_HOSTNAME_KEY {
        log::warn!(
            "{}",
            SchedulerError::MisconfiguredAffinity(format!(
                "unsupported topology key {:?}, skipping term",
                term.topology_key
            ))
        );
        return true;
    }

    let Some(selector) = &term.label_selector else {
        return true;
    };
    let Some(expressions) = &selector.match_expressions else {
        return true;
    };

    expressions
        .iter()
        .all(|expr| expression_satisfied(expr, running_pods, node, kind))
}

fn expression_satisfied(
    expr: &LabelSelectorRequirement,
    running_pods: &[Pod],
    node: &k8s_openapi::api::core::v1::Node,
    kind: Kind,
) -> bool {
    let operator = MatchOperator::parse(&expr.operator);
    if !matches!(operator, MatchOperator::In | MatchOperator::NotIn) {
        log::warn!(
            "{}",
            SchedulerError::MisconfiguredAffinity(format!(
                "operator {:?} is reserved and not implemented for pod affinity, rejecting node",
                expr.operator
            ))
        );
        return false;
    }

    let values = expr.values.clone().unwrap_or_default();
    let node_name = node.metadata.name.as_deref();

    // Anti-affinity must scan every running pod before concluding the node
    // is free of conflicts: stopping at the first non-matching pod would
    // miss a conflict surfaced by a later one.
    let mut suitable = kind == Kind::Affinity;

    for pod in running_pods {
        let labels = match &pod.metadata.labels {
            Some(l) => l,
            None => continue,
        };
        let matches = match operator {
            MatchOperator::In => labels.get(&expr.key).map(|v| values.contains(v)).unwrap_or(false),
            MatchOperator::NotIn => labels.get(&expr.key).map(|v| !values.contains(v)).unwrap_or(false),
            _ => unreachable!("checked above"),
        };

        if !matches {
            if kind == Kind::AntiAffinity {
                suitable = true;
            }
            continue;
        }

        let colocated = pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) == node_name;
        if colocated {
            match kind {
                Kind::AntiAffinity => return false,
                Kind::Affinity => return true,
            }
        } else if kind == Kind::AntiAffinity {
            suitable = true;
        }
    }

    suitable
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
    use std::collections::BTreeMap;

    fn node(name: &str) -> k8s_openapi::api::core::v1::Node {
        k8s_openapi::api::core::v1::Node {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn pod(name: &str, node_name: &str, labels: &[(&str, &str)]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.into()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(node_name.into()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn term(key: &str, operator: &str, values: &[&str]) -> PodAffinityTerm {
        PodAffinityTerm {
            topology_key: NODE_HOSTNAME_KEY.into(),
            label_selector: Some(LabelSelector {
                match_expressions: Some(vec![LabelSelectorRequirement {
                    key: key.into(),
                    operator: operator.into(),
                    values: Some(values.iter().map(|v| v.to_string()).collect()),
                }]),
                match_labels: None,
            }),
            namespaces: None,
            namespace_selector: None,
        }
    }

    #[test]
    fn anti_affinity_evicts_node_with_colocated_conflicting_pod() {
        let a = node("a");
        let b = node("b");
        let pods = vec![pod("existing", "a", &[("app", "mongo")])];
        let rule = term("app", "In", &["mongo"]);

        let result = filter_by_pod_affinity(vec![&a, &b], &[rule], &[], &pods);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].metadata.name.as_deref(), Some("b"));
    }

    #[test]
    fn anti_affinity_scans_all_pods_before_clearing_a_node() {
        // Node "a" hosts a non-matching pod first and a conflicting one
        // second; the full-pod-pool scan must still evict it.
        let a = node("a");
        let pods = vec![
            pod("other", "a", &[("app", "unrelated")]),
            pod("conflict", "a", &[("app", "mongo")]),
        ];
        let rule = term("app", "In", &["mongo"]);

        let result = filter_by_pod_affinity(vec![&a], &[rule], &[], &pods);

        assert!(result.is_empty());
    }

    #[test]
    fn required_affinity_keeps_only_colocated_node() {
        let a = node("a");
        let b = node("b");
        let pods = vec![pod("existing", "a", &[("app", "mongo")])];
        let rule = term("app", "In", &["mongo"]);

        let result = filter_by_pod_affinity(vec![&a, &b], &[], &[rule], &pods);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].metadata.name.as_deref(), Some("a"));
    }

    #[test]
    fn unsupported_operator_rejects_node() {
        let a = node("a");
        let pods = vec![pod("existing", "a", &[("app", "mongo")])];
        let rule = term("app", "Exists", &[]);

        let result = filter_by_pod_affinity(vec![&a], &[], &[rule], &pods);

        assert!(result.is_empty());
    }

    #[test]
    fn non_hostname_topology_key_is_skipped() {
        let mut rule = term("app", "In", &["mongo"]);
        rule.topology_key = "zone".into();
        let a = node("a");

        let result = filter_by_pod_affinity(vec![&a], &[rule], &[], &[]);

        assert_eq!(result.len(), 1);
    }
}
