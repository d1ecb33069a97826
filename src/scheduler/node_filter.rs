use k8s_openapi::api::core::v1::Node;

/// Returns the subset of `nodes` whose `data_centre_label` equals
/// `data_centre` and that carry a `Ready=True` condition. Builds a fresh
/// `Vec` rather than mutating the input in place while scanning it.
pub fn ready_nodes_in_data_centre<'a>(
    nodes: &'a [Node],
    data_centre_label: &str,
    data_centre: &str,
) -> Vec<&'a Node> {
    nodes
        .iter()
        .filter(|node| matches_data_centre(node, data_centre_label, data_centre))
        .filter(|node| is_ready(node))
        .collect()
}

fn matches_data_centre(node: &Node, data_centre_label: &str, data_centre: &str) -> bool {
    node.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(data_centre_label))
        .map(|value| value == data_centre)
        .unwrap_or(false)
}

fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn node(name: &str, dc: &str, ready: bool) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.into()),
                labels: Some(BTreeMap::from([("dc".to_string(), dc.to_string())])),
                ..Default::default()
            },
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".into(),
                    status: if ready { "True" } else { "False" }.into(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn keeps_only_ready_nodes_in_the_right_dc() {
        let nodes = vec![
            node("n1", "dc1", true),
            node("n2", "dc1", false),
            node("n3", "dc2", true),
        ];

        let filtered = ready_nodes_in_data_centre(&nodes, "dc", "dc1");

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].metadata.name.as_deref(), Some("n1"));
    }

    #[test]
    fn missing_label_excludes_node() {
        let mut n = node("n1", "dc1", true);
        n.metadata.labels = None;

        let filtered = ready_nodes_in_data_centre(&[n], "dc", "dc1");
        assert!(filtered.is_empty());
    }

    #[test]
    fn missing_conditions_excludes_node() {
        let mut n = node("n1", "dc1", true);
        n.status = None;

        let filtered = ready_nodes_in_data_centre(&[n], "dc", "dc1");
        assert!(filtered.is_empty());
    }
}
