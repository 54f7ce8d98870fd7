use std::path::Path;

use anyhow::Context;
use balance_core::{BalanceConfig, Pod};
use balance_state::StateStore;

pub mod decisions;
pub mod nodes;
pub mod schedule;
pub mod score;

pub fn open_store(db: &Path) -> anyhow::Result<StateStore> {
    StateStore::open(db).with_context(|| format!("opening state store {}", db.display()))
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<BalanceConfig> {
    match path {
        Some(p) => BalanceConfig::from_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(BalanceConfig::default()),
    }
}

pub fn load_pod(path: &Path) -> anyhow::Result<Pod> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading pod manifest {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing pod manifest {}", path.display()))
}

/// Names of every stored node, in store order.
pub fn candidate_nodes(store: &StateStore) -> anyhow::Result<Vec<String>> {
    Ok(store.list_nodes()?.into_iter().map(|n| n.name).collect())
}

/// Cancellation signal that fires on Ctrl-C.
pub fn cancel_on_ctrl_c() -> tokio::sync::watch::Receiver<bool> {
    let (tx, rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; cancelling cycle");
            let _ = tx.send(true);
        }
    });
    rx
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use balance_core::ResourceList;
    use std::collections::HashMap;

    pub fn store_with(nodes: &[(&str, &[(&str, &str)])]) -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state.redb")).unwrap();
        for (name, capacity) in nodes {
            store
                .put_node(&balance_core::NodeStatus {
                    name: name.to_string(),
                    capacity: capacity
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect::<ResourceList>(),
                    allocatable: ResourceList::new(),
                    labels: HashMap::new(),
                })
                .unwrap();
        }
        (dir, store)
    }

    pub fn pod(toml_src: &str) -> Pod {
        toml::from_str(toml_src).unwrap()
    }
}
