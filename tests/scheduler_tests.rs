//! Scheduler tests
//!
//! End-to-end runs against the in-memory cluster store: ordering, partial
//! readiness, failure propagation and status aggregation.

use std::sync::Arc;
use std::time::Duration;

use appcontroller::cluster::{ClusterStore, MemoryStore};
use appcontroller::scheduler::{
    GraphStatus, Scheduler, SchedulerConfig, VertexError, VertexStatus, build_dependency_graph,
    get_status,
};
use appcontroller::{DependencyGraph, Registry, ResourceKind};
use serde_json::{Value, json};

fn fast() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_millis(10),
        timeout: Duration::from_secs(2),
        concurrency: 0,
    }
}

fn manifest(kind: &str, name: &str) -> Value {
    match kind {
        "replicaset" => json!({
            "metadata": {"name": name},
            "spec": {"replicas": 10, "selector": {"matchLabels": {"app": name}}}
        }),
        "job" => json!({
            "metadata": {"name": name},
            "spec": {"template": {}}
        }),
        _ => json!({"metadata": {"name": name}}),
    }
}

fn definition(kind: &str, name: &str, meta: Value) -> Value {
    let mut def = json!({
        "apiVersion": "appcontroller.k8s/v1alpha1",
        "kind": "Definition",
        "metadata": {"name": format!("{}-{}", kind, name)},
        "meta": meta,
    });
    def[kind] = manifest(kind, name);
    def
}

fn dependency(parent: &str, child: &str, meta: Value) -> Value {
    json!({
        "apiVersion": "appcontroller.k8s/v1alpha1",
        "kind": "Dependency",
        "metadata": {"name": format!("{}-{}", parent, child).replace('/', "-")},
        "parent": parent,
        "child": child,
        "meta": meta,
    })
}

/// Store where pods and jobs finish as soon as they are created
fn cluster() -> MemoryStore {
    let store = MemoryStore::new();
    store.status_on_create(
        ResourceKind::Pod,
        json!({"phase": "Running", "conditions": [{"type": "Ready", "status": "True"}]}),
    );
    store.status_on_create(
        ResourceKind::Job,
        json!({"succeeded": 1, "conditions": [{"type": "Complete", "status": "True"}]}),
    );
    store.status_on_create(
        ResourceKind::ReplicaSet,
        json!({"replicas": 10, "readyReplicas": 6}),
    );
    store
}

async fn build(store: &MemoryStore) -> DependencyGraph {
    let store: Arc<dyn ClusterStore> = Arc::new(store.clone());
    build_dependency_graph(store, &Registry::new(), "")
        .await
        .expect("graph should build")
}

async fn deploy(store: &MemoryStore, config: SchedulerConfig) -> (GraphStatus, Scheduler) {
    let scheduler = Scheduler::new(build(store).await, config).expect("graph should be acyclic");
    let status = scheduler.run().await;
    (status, scheduler)
}

fn position(created: &[String], key: &str) -> usize {
    created
        .iter()
        .position(|k| k == key)
        .unwrap_or_else(|| panic!("{key} was never created: {created:?}"))
}

#[tokio::test]
async fn test_chain_is_created_in_dependency_order() {
    let store = cluster();
    store.add_definition(definition("configmap", "settings", json!({})));
    store.add_definition(definition("job", "migrate", json!({})));
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency("configmap/settings", "job/migrate", json!({})));
    store.add_dependency(dependency("job/migrate", "pod/app", json!({})));

    let (status, scheduler) = deploy(&store, fast()).await;

    assert_eq!(status, GraphStatus::Ready);
    let created = store.created();
    assert!(position(&created, "configmap/settings") < position(&created, "job/migrate"));
    assert!(position(&created, "job/migrate") < position(&created, "pod/app"));
    for vertex in scheduler.graph().vertices() {
        assert_eq!(vertex.status(), VertexStatus::Ready, "{}", vertex.key());
    }
}

#[tokio::test]
async fn test_success_factor_gates_dependents() {
    let store = cluster();
    store.add_definition(definition(
        "replicaset",
        "frontend",
        json!({"success_factor": "50"}),
    ));
    store.add_definition(definition("pod", "smoke", json!({})));
    store.add_dependency(dependency(
        "replicaset/frontend",
        "pod/smoke",
        json!({"success_factor": "50"}),
    ));

    let (status, scheduler) = deploy(&store, fast()).await;
    assert_eq!(status, GraphStatus::Ready);
    assert!(store.created().contains(&"pod/smoke".to_string()));

    let (_, report) = get_status(scheduler.graph()).await;
    let rs = report.find("replicaset/frontend").unwrap();
    assert_eq!((rs.percentage, rs.needed), (60, 50));
    assert!(!rs.blocks);
}

#[tokio::test]
async fn test_unmet_success_factor_times_out() {
    let store = cluster();
    store.add_definition(definition(
        "replicaset",
        "frontend",
        json!({"success_factor": 50}),
    ));
    store.add_definition(definition("pod", "smoke", json!({})));
    store.add_dependency(dependency(
        "replicaset/frontend",
        "pod/smoke",
        json!({"success_factor": 80, "timeout": 1}),
    ));

    let (status, scheduler) = deploy(&store, fast()).await;

    assert_eq!(status, GraphStatus::Error);
    assert!(!store.created().contains(&"pod/smoke".to_string()));
    let smoke = scheduler.graph().get("pod/smoke").unwrap().state();
    assert!(matches!(
        smoke.error,
        Some(VertexError::Timeout { ref waiting_for, .. }) if waiting_for == "replicaset/frontend"
    ));
    assert_eq!(
        scheduler.graph().get("replicaset/frontend").unwrap().status(),
        VertexStatus::Ready
    );
}

#[tokio::test]
async fn test_failure_blocks_only_descendants() {
    let store = cluster();
    store.add_definition(definition("secret", "creds", json!({})));
    store.add_definition(definition("job", "migrate", json!({})));
    store.add_definition(definition("pod", "app", json!({})));
    store.add_definition(definition("pod", "unrelated", json!({})));
    store.add_dependency(dependency("secret/creds", "job/migrate", json!({})));
    store.add_dependency(dependency("job/migrate", "pod/app", json!({})));
    store.fail_create("job/migrate");

    let (status, scheduler) = deploy(&store, fast()).await;
    let graph = scheduler.graph();

    assert_eq!(status, GraphStatus::Error);
    assert_eq!(graph.get("secret/creds").unwrap().status(), VertexStatus::Ready);
    assert_eq!(graph.get("pod/unrelated").unwrap().status(), VertexStatus::Ready);

    let migrate = graph.get("job/migrate").unwrap().state();
    assert!(matches!(migrate.error, Some(VertexError::Creation { .. })));

    let app = graph.get("pod/app").unwrap().state();
    assert_eq!(app.status, VertexStatus::Error);
    assert_eq!(
        app.error,
        Some(VertexError::Blocked {
            key: "pod/app".into(),
            dependency: "job/migrate".into()
        })
    );
    assert!(!store.created().contains(&"pod/app".to_string()));
}

#[tokio::test]
async fn test_non_blocking_edge_does_not_wait() {
    let store = cluster();
    store.add_definition(definition("job", "warmup", json!({})));
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency("job/warmup", "pod/app", json!({"blocks": false})));
    store.fail_create("job/warmup");

    let (status, scheduler) = deploy(&store, fast()).await;

    assert_eq!(status, GraphStatus::Error);
    assert_eq!(
        scheduler.graph().get("pod/app").unwrap().status(),
        VertexStatus::Ready
    );

    let (_, report) = get_status(scheduler.graph()).await;
    let warmup = report.find("job/warmup").unwrap();
    assert!(!warmup.blocks);
    assert!(warmup.message.starts_with("error: failed to create job/warmup"));
}

#[tokio::test]
async fn test_tolerated_failure_is_a_warning() {
    let store = cluster();
    store.add_definition(definition("job", "seed", json!({})));
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency("job/seed", "pod/app", json!({"on_error": "ignore"})));
    store.fail_create("job/seed");

    let (status, scheduler) = deploy(&store, fast()).await;

    assert_eq!(status, GraphStatus::Error);
    let app = scheduler.graph().get("pod/app").unwrap().state();
    assert_eq!(app.status, VertexStatus::Warning);
    assert_eq!(app.warnings.len(), 1);
    assert!(app.warnings[0].starts_with("job/seed failed"));
}

#[tokio::test]
async fn test_warning_propagates_to_dependents() {
    let store = cluster();
    store.add_definition(definition("job", "seed", json!({})));
    store.add_definition(definition("pod", "api", json!({})));
    store.add_definition(definition("pod", "web", json!({})));
    store.add_dependency(dependency("job/seed", "pod/api", json!({"on_error": "ignore"})));
    store.add_dependency(dependency("pod/api", "pod/web", json!({})));
    store.fail_create("job/seed");

    let (_, scheduler) = deploy(&store, fast()).await;

    let web = scheduler.graph().get("pod/web").unwrap().state();
    assert_eq!(web.status, VertexStatus::Warning);
    assert!(store.created().contains(&"pod/web".to_string()));
}

#[tokio::test]
async fn test_existing_reference() {
    let store = cluster();
    store.insert(
        ResourceKind::Secret,
        json!({"metadata": {"name": "registry-creds"}}),
    );
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency("secret/registry-creds", "pod/app", json!({})));

    let (status, scheduler) = deploy(&store, fast()).await;

    assert_eq!(status, GraphStatus::Ready);
    assert!(
        scheduler
            .graph()
            .get("secret/registry-creds")
            .unwrap()
            .resource()
            .is_existing()
    );
    assert_eq!(store.created(), vec!["pod/app".to_string()]);
}

#[tokio::test]
async fn test_redeploy_is_idempotent() {
    let store = cluster();
    store.add_definition(definition("configmap", "settings", json!({})));
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency("configmap/settings", "pod/app", json!({})));

    let (first, _) = deploy(&store, fast()).await;
    let (second, _) = deploy(&store, fast()).await;

    assert_eq!(first, GraphStatus::Ready);
    assert_eq!(second, GraphStatus::Ready);
    assert_eq!(store.created().len(), 2);
}

#[tokio::test]
async fn test_polls_until_ready() {
    let store = cluster();
    let mut api = definition("deployment", "api", json!({}));
    api["deployment"]["spec"] = json!({
        "replicas": 2,
        "selector": {"matchLabels": {"app": "api"}},
        "template": {}
    });
    store.add_definition(api);
    store.add_definition(definition("pod", "smoke", json!({})));
    store.add_dependency(dependency("deployment/api", "pod/smoke", json!({})));

    let rollout = store.clone();
    tokio::spawn(async move {
        while rollout.object(ResourceKind::Deployment, "api").is_none() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        rollout.set_status(
            ResourceKind::Deployment,
            "api",
            json!({"replicas": 2, "availableReplicas": 2}),
        );
    });

    let (status, _) = deploy(&store, fast()).await;

    assert_eq!(status, GraphStatus::Ready);
    let api_at = store.created_at("deployment/api").unwrap();
    let smoke_at = store.created_at("pod/smoke").unwrap();
    assert!(smoke_at.duration_since(api_at) >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_malformed_success_factor_fails_fast() {
    let store = cluster();
    store.add_definition(definition("pod", "app", json!({"success_factor": "most"})));

    let started = std::time::Instant::now();
    let (status, scheduler) = deploy(&store, fast()).await;

    assert_eq!(status, GraphStatus::Error);
    assert!(started.elapsed() < Duration::from_secs(1));
    let app = scheduler.graph().get("pod/app").unwrap().state();
    assert!(matches!(app.error, Some(VertexError::Status { .. })));
}

#[tokio::test]
async fn test_concurrency_limit_still_completes() {
    let store = cluster();
    for name in ["a", "b", "c", "d"] {
        store.add_definition(definition("configmap", name, json!({})));
    }
    let config = SchedulerConfig {
        concurrency: 1,
        ..fast()
    };

    let (status, _) = deploy(&store, config).await;
    assert_eq!(status, GraphStatus::Ready);
    assert_eq!(store.created().len(), 4);
}

#[tokio::test]
async fn test_cyclic_graph_is_rejected() {
    let store = cluster();
    store.add_definition(definition("pod", "a", json!({})));
    store.add_definition(definition("pod", "b", json!({})));
    store.add_dependency(dependency("pod/a", "pod/b", json!({})));
    store.add_dependency(dependency("pod/b", "pod/a", json!({})));

    let err = Scheduler::new(build(&store).await, fast())
        .err()
        .expect("cycle should be rejected");
    assert_eq!(err.cycles, vec![vec!["pod/a".to_string(), "pod/b".to_string()]]);
    assert!(store.created().is_empty());
}

#[tokio::test]
async fn test_status_of_unexecuted_graph_is_probed() {
    let store = cluster();
    store.add_definition(definition("configmap", "settings", json!({})));
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency("configmap/settings", "pod/app", json!({})));

    let (before, _) = get_status(&build(&store).await).await;
    assert_eq!(before, GraphStatus::NotStarted);

    deploy(&store, fast()).await;

    let (after, report) = get_status(&build(&store).await).await;
    assert_eq!(after, GraphStatus::Ready);
    assert_eq!(report.roots().len(), 1);
    assert_eq!(report.roots()[0].dependency, "pod/app");
    assert_eq!(report.roots()[0].children[0].dependency, "configmap/settings");
}

#[tokio::test]
async fn test_independent_root_does_not_wait_for_slow_branch() {
    let store = cluster();
    let mut api = definition("deployment", "api", json!({}));
    api["deployment"]["spec"] = json!({
        "replicas": 1,
        "selector": {"matchLabels": {"app": "api"}},
        "template": {}
    });
    store.add_definition(api);
    store.add_definition(definition("pod", "smoke", json!({})));
    store.add_definition(definition("configmap", "standalone", json!({})));
    store.add_dependency(dependency("deployment/api", "pod/smoke", json!({})));

    let rollout = store.clone();
    let rolled_out = tokio::spawn(async move {
        while rollout.object(ResourceKind::Deployment, "api").is_none() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        let at = std::time::Instant::now();
        rollout.set_status(
            ResourceKind::Deployment,
            "api",
            json!({"replicas": 1, "availableReplicas": 1}),
        );
        at
    });

    let (status, _) = deploy(&store, fast()).await;
    let rolled_out_at = rolled_out.await.unwrap();

    assert_eq!(status, GraphStatus::Ready);
    let standalone_at = store.created_at("configmap/standalone").unwrap();
    let smoke_at = store.created_at("pod/smoke").unwrap();
    assert!(standalone_at < rolled_out_at);
    assert!(smoke_at > rolled_out_at);
}
