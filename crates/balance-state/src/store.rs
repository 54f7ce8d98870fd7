//! StateStore — redb-backed cluster snapshot for balancegrid.
//!
//! Provides typed CRUD operations over node statuses, pod bindings, and
//! decision records. All values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(BINDINGS).map_err(map_err!(Table))?;
        txn.open_table(DECISIONS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node status.
    pub fn put_node(&self, node: &NodeStatus) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(node.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(node = %node.name, "node stored");
        Ok(())
    }

    /// Get a node by name.
    pub fn get_node(&self, name: &str) -> StateResult<Option<NodeStatus>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: NodeStatus =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all nodes, ordered by name.
    pub fn list_nodes(&self) -> StateResult<Vec<NodeStatus>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: NodeStatus =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(node);
        }
        Ok(results)
    }

    /// Delete a node by name. Returns true if it existed.
    pub fn delete_node(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(node = %name, existed, "node deleted");
        Ok(existed)
    }

    // ── Bindings ───────────────────────────────────────────────────

    /// Insert or update a pod binding.
    pub fn put_binding(&self, binding: &PodBinding) -> StateResult<()> {
        let key = binding.table_key();
        let value = serde_json::to_vec(binding).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(BINDINGS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "binding stored");
        Ok(())
    }

    /// Bind a pod, dropping any binding it already holds on another node.
    /// Returns the number of bindings displaced.
    pub fn rebind(&self, binding: &PodBinding) -> StateResult<u32> {
        let key = binding.table_key();
        let value = serde_json::to_vec(binding).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut displaced = 0u32;
        {
            let mut table = txn.open_table(BINDINGS).map_err(map_err!(Table))?;
            let mut stale = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (k, v) = entry.map_err(map_err!(Read))?;
                if k.value() == key {
                    continue;
                }
                let existing: PodBinding =
                    serde_json::from_slice(v.value()).map_err(map_err!(Deserialize))?;
                if existing.pod == binding.pod {
                    stale.push(k.value().to_string());
                }
            }
            for k in &stale {
                if table.remove(k.as_str()).map_err(map_err!(Write))?.is_some() {
                    displaced += 1;
                }
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, displaced, "pod rebound");
        Ok(displaced)
    }

    /// List all pods bound to `node`.
    pub fn list_bindings_for_node(&self, node: &str) -> StateResult<Vec<PodBinding>> {
        let prefix = format!("{node}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(BINDINGS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let binding: PodBinding =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(binding);
            }
        }
        Ok(results)
    }

    /// Delete a binding by its composite key. Returns true if it existed.
    pub fn delete_binding(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(BINDINGS).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    /// Delete every binding on `node`. Returns number deleted.
    pub fn delete_bindings_for_node(&self, node: &str) -> StateResult<u32> {
        let prefix = format!("{node}:");
        // Collect keys in a read transaction first.
        let keys: Vec<String> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(BINDINGS).map_err(map_err!(Table))?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                if key.value().starts_with(&prefix) {
                    keys.push(key.value().to_string());
                }
            }
            keys
        };

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut count = 0u32;
        {
            let mut table = txn.open_table(BINDINGS).map_err(map_err!(Table))?;
            for key in &keys {
                if table.remove(key.as_str()).map_err(map_err!(Write))?.is_some() {
                    count += 1;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%node, count, "bindings deleted");
        Ok(count)
    }

    // ── Decisions ──────────────────────────────────────────────────

    /// Insert a decision record. Re-recording the same id overwrites it.
    pub fn put_decision(&self, record: &DecisionRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(DECISIONS).map_err(map_err!(Table))?;
            table
                .insert(record.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a decision record by id.
    pub fn get_decision(&self, id: &str) -> StateResult<Option<DecisionRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DECISIONS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: DecisionRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Highest cycle id among recorded decisions, or 0 if none.
    pub fn last_cycle_id(&self) -> StateResult<u64> {
        Ok(self
            .list_decisions()?
            .iter()
            .map(|d| d.cycle_id)
            .max()
            .unwrap_or(0))
    }

    /// List all decision records, oldest first.
    pub fn list_decisions(&self) -> StateResult<Vec<DecisionRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DECISIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: DecisionRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        results.sort_by(|a, b| {
            a.decided_at
                .cmp(&b.decided_at)
                .then(a.cycle_id.cmp(&b.cycle_id))
        });
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balance_core::{ResourceList, ResourceVector};
    use std::collections::HashMap;

    fn test_node(name: &str) -> NodeStatus {
        let mut capacity = ResourceList::new();
        capacity.insert("cpu".to_string(), "4".to_string());
        capacity.insert("memory".to_string(), "8Gi".to_string());
        NodeStatus {
            name: name.to_string(),
            allocatable: capacity.clone(),
            capacity,
            labels: HashMap::new(),
        }
    }

    fn test_binding(node: &str, pod: &str) -> PodBinding {
        PodBinding {
            pod: format!("default/{pod}"),
            node: node.to_string(),
            requests: ResourceVector::from([("cpu", 500), ("memory", 1 << 30)]),
            bound_at: 1000,
        }
    }

    fn test_decision(id: &str, cycle_id: u64, decided_at: u64) -> DecisionRecord {
        DecisionRecord {
            id: id.to_string(),
            cycle_id,
            pod: "default/web".to_string(),
            node: "node-1".to_string(),
            demand: ResourceVector::from([("cpu", 500)]),
            decided_at,
        }
    }

    // ── Node CRUD ──────────────────────────────────────────────────

    #[test]
    fn node_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let node = test_node("node-1");

        store.put_node(&node).unwrap();
        let retrieved = store.get_node("node-1").unwrap();

        assert_eq!(retrieved, Some(node));
    }

    #[test]
    fn node_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_node("ghost").unwrap().is_none());
    }

    #[test]
    fn node_list_all_sorted() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&test_node("node-b")).unwrap();
        store.put_node(&test_node("node-a")).unwrap();

        let names: Vec<String> = store
            .list_nodes()
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["node-a", "node-b"]);
    }

    #[test]
    fn node_update_in_place() {
        let store = StateStore::open_in_memory().unwrap();
        let mut node = test_node("node-1");
        store.put_node(&node).unwrap();

        node.allocatable.insert("cpu".to_string(), "3500m".to_string());
        store.put_node(&node).unwrap();

        let retrieved = store.get_node("node-1").unwrap().unwrap();
        assert_eq!(retrieved.allocatable["cpu"], "3500m");
    }

    #[test]
    fn node_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&test_node("node-1")).unwrap();

        assert!(store.delete_node("node-1").unwrap());
        assert!(!store.delete_node("node-1").unwrap());
        assert!(store.get_node("node-1").unwrap().is_none());
    }

    // ── Binding CRUD ───────────────────────────────────────────────

    #[test]
    fn binding_list_for_node() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_binding(&test_binding("node-1", "a")).unwrap();
        store.put_binding(&test_binding("node-1", "b")).unwrap();
        store.put_binding(&test_binding("node-2", "c")).unwrap();

        assert_eq!(store.list_bindings_for_node("node-1").unwrap().len(), 2);
        assert_eq!(store.list_bindings_for_node("node-2").unwrap().len(), 1);
        assert!(store.list_bindings_for_node("node-3").unwrap().is_empty());
    }

    #[test]
    fn binding_prefix_does_not_leak_across_similar_names() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_binding(&test_binding("node-1", "a")).unwrap();
        store.put_binding(&test_binding("node-10", "b")).unwrap();

        assert_eq!(store.list_bindings_for_node("node-1").unwrap().len(), 1);
    }

    #[test]
    fn binding_delete_single() {
        let store = StateStore::open_in_memory().unwrap();
        let binding = test_binding("node-1", "a");
        store.put_binding(&binding).unwrap();

        assert!(store.delete_binding(&binding.table_key()).unwrap());
        assert!(store.list_bindings_for_node("node-1").unwrap().is_empty());
    }

    #[test]
    fn binding_delete_all_for_node() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_binding(&test_binding("node-1", "a")).unwrap();
        store.put_binding(&test_binding("node-1", "b")).unwrap();
        store.put_binding(&test_binding("node-2", "c")).unwrap();

        assert_eq!(store.delete_bindings_for_node("node-1").unwrap(), 2);
        assert!(store.list_bindings_for_node("node-1").unwrap().is_empty());
        // node-2 untouched
        assert_eq!(store.list_bindings_for_node("node-2").unwrap().len(), 1);
    }

    #[test]
    fn rebind_moves_pod_between_nodes() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_binding(&test_binding("node-1", "web")).unwrap();
        store.put_binding(&test_binding("node-1", "db")).unwrap();

        let displaced = store.rebind(&test_binding("node-2", "web")).unwrap();

        assert_eq!(displaced, 1);
        let on_1 = store.list_bindings_for_node("node-1").unwrap();
        assert_eq!(on_1.len(), 1);
        assert_eq!(on_1[0].pod, "default/db");
        assert_eq!(store.list_bindings_for_node("node-2").unwrap().len(), 1);
    }

    #[test]
    fn rebind_same_node_overwrites() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_binding(&test_binding("node-1", "web")).unwrap();

        assert_eq!(store.rebind(&test_binding("node-1", "web")).unwrap(), 0);
        assert_eq!(store.list_bindings_for_node("node-1").unwrap().len(), 1);
    }

    // ── Decision CRUD ──────────────────────────────────────────────

    #[test]
    fn last_cycle_id_tracks_highest() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.last_cycle_id().unwrap(), 0);

        store.put_decision(&test_decision("a", 7, 100)).unwrap();
        store.put_decision(&test_decision("b", 3, 200)).unwrap();
        assert_eq!(store.last_cycle_id().unwrap(), 7);
    }

    #[test]
    fn decision_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_decision("abc", 1, 1000);

        store.put_decision(&record).unwrap();
        assert_eq!(store.get_decision("abc").unwrap(), Some(record));
    }

    #[test]
    fn decisions_list_oldest_first() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_decision(&test_decision("zz", 2, 2000)).unwrap();
        store.put_decision(&test_decision("aa", 3, 3000)).unwrap();
        store.put_decision(&test_decision("mm", 1, 1000)).unwrap();

        let cycles: Vec<u64> = store
            .list_decisions()
            .unwrap()
            .into_iter()
            .map(|d| d.cycle_id)
            .collect();
        assert_eq!(cycles, vec![1, 2, 3]);
    }

    // ── Persistence ────────────────────────────────────────────────

    #[test]
    fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.redb");

        {
            let store = StateStore::open(&path).unwrap();
            store.put_node(&test_node("node-1")).unwrap();
            store.put_binding(&test_binding("node-1", "a")).unwrap();
        }

        let store = StateStore::open(&path).unwrap();
        assert!(store.get_node("node-1").unwrap().is_some());
        assert_eq!(store.list_bindings_for_node("node-1").unwrap().len(), 1);
    }
}
