//! End-to-end cycles: StateStore → DominantBalance → Scheduler → binding.

use std::collections::HashMap;
use std::sync::Arc;

use balance_core::{
    Container, FrameworkConfig, NodeStatus, PluginConfig, Pod, ResourceList, ResourceVector,
};
use balance_plugin::{
    ClusterStateProvider, CycleContext, CycleState, DominantBalance, ProviderError, ScorePlugin,
};
use balance_scheduler::{Scheduler, SchedulerError, bind};
use balance_state::{DecisionRecord, StateStore};
use tokio::sync::watch;

fn resources(pairs: &[(&str, &str)]) -> ResourceList {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn node(name: &str, capacity: &[(&str, &str)]) -> NodeStatus {
    NodeStatus {
        name: name.to_string(),
        capacity: resources(capacity),
        allocatable: ResourceList::new(),
        labels: HashMap::new(),
    }
}

fn pod(name: &str, requests: &[(&str, &str)]) -> Pod {
    Pod {
        name: name.to_string(),
        namespace: "default".to_string(),
        uid: None,
        containers: vec![Container {
            name: "app".to_string(),
            requests: resources(requests),
        }],
    }
}

fn names(nodes: &[&str]) -> Vec<String> {
    nodes.iter().map(|n| n.to_string()).collect()
}

fn live() -> watch::Receiver<bool> {
    watch::channel(false).1
}

fn persistent_store() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(&dir.path().join("balance.redb")).unwrap();
    (dir, store)
}

fn scheduler_for<P: ClusterStateProvider>(provider: P) -> Scheduler<DominantBalance<P>> {
    let plugin = DominantBalance::new(Arc::new(provider), &PluginConfig::default());
    Scheduler::new(Arc::new(plugin), &FrameworkConfig::default())
}

/// Delegates to a store but cannot reach one node.
#[derive(Clone)]
struct PartitionedStore {
    inner: StateStore,
    unreachable: String,
}

impl ClusterStateProvider for PartitionedStore {
    async fn node_status(&self, node: &str) -> Result<NodeStatus, ProviderError> {
        if node == self.unreachable {
            return Err(ProviderError::Unavailable("connection reset".to_string()));
        }
        self.inner.node_status(node).await
    }

    async fn node_usage(&self, node: &str) -> Result<ResourceVector, ProviderError> {
        self.inner.node_usage(node).await
    }

    async fn record_decision(&self, record: DecisionRecord) -> Result<(), ProviderError> {
        self.inner.record_decision(record).await
    }
}

#[tokio::test]
async fn balanced_node_wins_over_lopsided_one() {
    let (_dir, store) = persistent_store();
    store
        .put_node(&node("node-1", &[("cpu", "4"), ("memory", "8G")]))
        .unwrap();
    store
        .put_node(&node("node-2", &[("cpu", "4"), ("memory", "8G")]))
        .unwrap();
    // node-2 already carries a cpu-heavy pod.
    store
        .put_binding(&balance_state::PodBinding {
            pod: "default/batch".to_string(),
            node: "node-2".to_string(),
            requests: ResourceVector::from([("cpu", 3000)]),
            bound_at: 1,
        })
        .unwrap();
    store
        .put_binding(&balance_state::PodBinding {
            pod: "default/cache".to_string(),
            node: "node-1".to_string(),
            requests: ResourceVector::from([("cpu", 1000), ("memory", 2_000_000_000)]),
            bound_at: 1,
        })
        .unwrap();

    let sched = scheduler_for(store.clone());
    let web = pod("web", &[("cpu", "1"), ("memory", "1G")]);

    let decision = sched
        .schedule_one(&web, &names(&["node-1", "node-2"]), live())
        .await
        .unwrap();

    assert_eq!(decision.node, "node-1");
    assert_eq!(decision.score, 87);
    assert!(decision.commit_warning.is_none());

    let decisions = store.list_decisions().unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].node, "node-1");
    assert_eq!(decisions[0].pod, "default/web");
    assert_eq!(decisions[0].demand.get("cpu"), 1000);
}

#[tokio::test]
async fn missing_resource_rejects_with_named_reason() {
    let (_dir, store) = persistent_store();
    store
        .put_node(&node("node-1", &[("cpu", "4"), ("memory", "8G")]))
        .unwrap();
    let sched = scheduler_for(store.clone());

    let err = sched
        .schedule_one(&pod("trainer", &[("gpu", "1")]), &names(&["node-1"]), live())
        .await
        .unwrap_err();

    let SchedulerError::Unschedulable(fit) = err else {
        panic!("expected Unschedulable");
    };
    assert_eq!(
        fit.reasons["node-1"],
        "Insufficient gpu (requested 1, available 0)"
    );
    assert!(store.list_decisions().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_node_is_excluded_others_scored() {
    let (_dir, store) = persistent_store();
    for name in ["node-1", "node-2", "node-3"] {
        store
            .put_node(&node(name, &[("cpu", "4"), ("memory", "8G")]))
            .unwrap();
    }
    let provider = PartitionedStore {
        inner: store.clone(),
        unreachable: "node-3".to_string(),
    };
    let sched = scheduler_for(provider);
    // Requests nothing, so an unreadable node still passes filtering and
    // the failure surfaces at scoring.
    let best_effort = pod("sidecar", &[]);

    let decision = sched
        .schedule_one(&best_effort, &names(&["node-1", "node-2", "node-3"]), live())
        .await
        .unwrap();

    assert!(decision.excluded.contains_key("node-3"));
    assert_eq!(decision.scores.len(), 2);
    assert!(decision.scores.iter().all(|s| s.node != "node-3"));
    assert_eq!(decision.node, "node-1");
}

#[tokio::test]
async fn score_without_record_reports_lookup_error() {
    let store = StateStore::open_in_memory().unwrap();
    let provider = PartitionedStore {
        inner: store,
        unreachable: "node-9".to_string(),
    };
    let plugin = DominantBalance::new(Arc::new(provider), &PluginConfig::default());

    let outcome = plugin
        .score(
            &CycleContext::detached(1),
            &CycleState::new(1),
            None,
            &pod("web", &[("cpu", "1")]),
            "node-9",
        )
        .await;

    assert!(!outcome.status.is_success());
    assert_eq!(outcome.score, 0);
}

#[tokio::test]
async fn bindings_shift_later_placements() {
    let (_dir, store) = persistent_store();
    for name in ["node-a", "node-b"] {
        store
            .put_node(&node(name, &[("cpu", "4"), ("memory", "8G")]))
            .unwrap();
    }
    let sched = scheduler_for(store.clone());
    let demand = ResourceVector::from([("cpu", 2000), ("memory", 4_000_000_000)]);
    let nodes = names(&["node-a", "node-b"]);

    let first = sched
        .schedule_one(&pod("one", &[("cpu", "2"), ("memory", "4G")]), &nodes, live())
        .await
        .unwrap();
    bind(&first, demand.clone(), &store).unwrap();

    let second = sched
        .schedule_one(&pod("two", &[("cpu", "2"), ("memory", "4G")]), &nodes, live())
        .await
        .unwrap();
    bind(&second, demand, &store).unwrap();

    // Equal scores on empty nodes resolve by name; after binding, the
    // second pod prefers the node that is still less loaded.
    assert_eq!(first.node, "node-a");
    assert_eq!(second.node, "node-b");

    let third = sched
        .schedule_one(&pod("three", &[("cpu", "1")]), &nodes, live())
        .await;
    let Err(SchedulerError::Unschedulable(fit)) = third else {
        panic!("expected both nodes to be out of cpu");
    };
    assert_eq!(fit.reasons.len(), 2);
}

#[tokio::test]
async fn cancelled_cycle_writes_no_decision() {
    let (_dir, store) = persistent_store();
    store
        .put_node(&node("node-1", &[("cpu", "4"), ("memory", "8G")]))
        .unwrap();
    let sched = scheduler_for(store.clone());
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let err = sched
        .schedule_one(&pod("web", &[("cpu", "1")]), &names(&["node-1"]), rx)
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulerError::Cancelled(_)));
    assert!(store.list_decisions().unwrap().is_empty());
}

#[tokio::test]
async fn fit_error_keeps_rejections_alongside_filter_errors() {
    let (_dir, store) = persistent_store();
    store.put_node(&node("small", &[("cpu", "1")])).unwrap();
    store.put_node(&node("corrupt", &[("cpu", "lots")])).unwrap();
    let sched = scheduler_for(store.clone());

    let err = sched
        .schedule_one(&pod("big", &[("cpu", "2")]), &names(&["small", "corrupt"]), live())
        .await
        .unwrap_err();

    let SchedulerError::Unschedulable(fit) = err else {
        panic!("expected Unschedulable");
    };
    assert_eq!(
        fit.reasons["small"],
        "Insufficient cpu (requested 2000, available 1000)"
    );
    assert!(fit.reasons["corrupt"].contains("malformed resource quantity for cpu"));
    let message = SchedulerError::Unschedulable(fit).to_string();
    assert!(message.contains("small: Insufficient cpu"));
}

#[tokio::test]
async fn rescheduled_pod_holds_one_binding() {
    let (_dir, store) = persistent_store();
    for name in ["node-a", "node-b"] {
        store
            .put_node(&node(name, &[("cpu", "4"), ("memory", "8G")]))
            .unwrap();
    }
    let sched = scheduler_for(store.clone());
    let web = pod("web", &[("cpu", "3"), ("memory", "1G")]);
    let demand = ResourceVector::from([("cpu", 3000), ("memory", 1_000_000_000)]);
    let nodes = names(&["node-a", "node-b"]);

    let first = sched.schedule_one(&web, &nodes, live()).await.unwrap();
    bind(&first, demand.clone(), &store).unwrap();
    let second = sched.schedule_one(&web, &nodes, live()).await.unwrap();
    bind(&second, demand, &store).unwrap();

    assert_eq!(first.node, "node-a");
    assert_eq!(second.node, "node-b");
    assert!(store.list_bindings_for_node("node-a").unwrap().is_empty());
    assert_eq!(store.list_bindings_for_node("node-b").unwrap().len(), 1);
    assert!(store.node_usage("node-a").await.unwrap().is_empty());
}
