//! `balancectl nodes` — load and inspect the node snapshot.

use std::path::Path;

use anyhow::Context;
use balance_core::{NodeStatus, ResourceList, ResourceVector, parse_resource_list};
use balance_plugin::ClusterStateProvider;
use balance_state::{PodBinding, StateStore};
use serde::Deserialize;
use tracing::info;

use super::{load_config, open_store};

/// Cluster snapshot file.
#[derive(Debug, Deserialize)]
pub struct ClusterFile {
    #[serde(default)]
    pub nodes: Vec<NodeStatus>,
    #[serde(default)]
    pub bindings: Vec<BindingEntry>,
}

/// A pod already running on a node.
#[derive(Debug, Deserialize)]
pub struct BindingEntry {
    /// `namespace/name`.
    pub pod: String,
    pub node: String,
    #[serde(default)]
    pub requests: ResourceList,
}

impl ClusterFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading cluster file {}", path.display()))?;
        let file: ClusterFile = toml::from_str(&content)
            .with_context(|| format!("parsing cluster file {}", path.display()))?;
        for b in &file.bindings {
            if !file.nodes.iter().any(|n| n.name == b.node) {
                anyhow::bail!("binding {} refers to unknown node {}", b.pod, b.node);
            }
        }
        Ok(file)
    }
}

/// Write every node and binding in `file` to `store`.
pub fn apply(
    file: &ClusterFile,
    store: &StateStore,
    milli_resources: &[String],
) -> anyhow::Result<(usize, usize)> {
    for node in &file.nodes {
        store.put_node(node)?;
    }
    for entry in &file.bindings {
        let requests = parse_resource_list(&entry.requests, milli_resources)
            .with_context(|| format!("binding {}", entry.pod))?;
        store.put_binding(&PodBinding {
            pod: entry.pod.clone(),
            node: entry.node.clone(),
            requests,
            bound_at: 0,
        })?;
    }
    Ok((file.nodes.len(), file.bindings.len()))
}

pub fn load(db: &Path, file: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = open_store(db)?;
    let cluster = ClusterFile::from_file(file)?;

    let (nodes, bindings) = apply(&cluster, &store, &config.plugin.milli_resources)?;
    info!(nodes, bindings, "cluster snapshot loaded");
    println!("✓ Loaded {nodes} node(s) and {bindings} binding(s)");
    Ok(())
}

/// Stored nodes paired with their committed usage.
pub async fn usage_table(store: &StateStore) -> anyhow::Result<Vec<(NodeStatus, ResourceVector)>> {
    let mut rows = Vec::new();
    for node in store.list_nodes()? {
        let used = store.node_usage(&node.name).await?;
        rows.push((node, used));
    }
    Ok(rows)
}

pub async fn list(db: &Path) -> anyhow::Result<()> {
    let store = open_store(db)?;
    let rows = usage_table(&store).await?;

    if rows.is_empty() {
        println!("No nodes.");
        return Ok(());
    }
    for (node, used) in rows {
        println!("{}", node.name);
        println!("  capacity:    {}", format_list(&node.capacity));
        if !node.allocatable.is_empty() {
            println!("  allocatable: {}", format_list(&node.allocatable));
        }
        let used: Vec<String> = used.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("  used:        {}", used.join(", "));
    }
    Ok(())
}

fn format_list(list: &ResourceList) -> String {
    list.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}
