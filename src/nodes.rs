//! Node readiness and grouping helpers.
//!
//! Rules that gather evidence on nodes usually pick one Ready node per
//! worker pool. Groups are kept in a `BTreeMap` so that results built by
//! iterating them come out in a stable, name-sorted order.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::Client;
use kube::api::{Api, ListParams};
use std::collections::BTreeMap;

/// Label that assigns a node to a worker pool.
pub const DEFAULT_GROUP_LABEL: &str = "worker.gardener.cloud/pool";

/// Whether the node reports `Ready=True`.
pub fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Whether pods may be placed on the node: Ready and not cordoned.
pub fn is_node_schedulable(node: &Node) -> bool {
    let cordoned = node
        .spec
        .as_ref()
        .and_then(|s| s.unschedulable)
        .unwrap_or(false);
    !cordoned && is_node_ready(node)
}

pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or_default()
}

/// Group nodes by the value of `label`. Nodes without the label are left out.
pub fn group_by_label<'a>(nodes: &'a [Node], label: &str) -> BTreeMap<String, Vec<&'a Node>> {
    let mut groups: BTreeMap<String, Vec<&Node>> = BTreeMap::new();
    for node in nodes {
        let value = node
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(label));
        if let Some(value) = value {
            groups.entry(value.clone()).or_default().push(node);
        }
    }
    groups
}

/// The first schedulable node of every group, `None` for groups without one.
pub fn ready_node_per_group<'a>(
    nodes: &'a [Node],
    label: &str,
) -> BTreeMap<String, Option<&'a Node>> {
    group_by_label(nodes, label)
        .into_iter()
        .map(|(group, members)| {
            let ready = members.into_iter().find(|n| is_node_schedulable(n));
            (group, ready)
        })
        .collect()
}

/// Source of the cluster's nodes.
#[async_trait]
pub trait NodeSource: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>, String>;
}

#[async_trait]
impl NodeSource for Client {
    async fn list_nodes(&self) -> Result<Vec<Node>, String> {
        let api: Api<Node> = Api::all(self.clone());
        api.list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl NodeSource for Vec<Node> {
    async fn list_nodes(&self) -> Result<Vec<Node>, String> {
        Ok(self.clone())
    }
}

/// Build a node fixture.
#[cfg(test)]
pub(crate) fn node(name: &str, labels: &[(&str, &str)], ready: bool) -> Node {
    serde_json::from_value(serde_json::json!({
        "metadata": {
            "name": name,
            "labels": labels.iter().cloned().collect::<BTreeMap<&str, &str>>(),
        },
        "status": {
            "conditions": [{
                "type": "Ready",
                "status": if ready { "True" } else { "False" },
            }],
        },
    }))
    .expect("node fixture")
}
