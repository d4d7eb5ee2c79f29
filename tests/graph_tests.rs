//! Graph building tests
//!
//! Builds graphs from Definition and Dependency objects held in the in-memory
//! store and checks vertices, edges, existing references and cycle detection.

use std::sync::Arc;

use appcontroller::cluster::{ClusterStore, MemoryStore, StoreError};
use appcontroller::models::DefinitionError;
use appcontroller::scheduler::{BuildError, Scheduler, SchedulerConfig};
use appcontroller::{DependencyGraph, Registry, ResourceKind, build_dependency_graph, detect_cycles};
use serde_json::{Value, json};

fn definition(kind: &str, name: &str, labels: Value) -> Value {
    let mut def = json!({
        "apiVersion": "appcontroller.k8s/v1alpha1",
        "kind": "Definition",
        "metadata": {"name": format!("{}-{}", kind, name), "labels": labels},
    });
    def[kind] = json!({"metadata": {"name": name}});
    def
}

fn dependency(name: &str, parent: &str, child: &str, meta: Value) -> Value {
    json!({
        "apiVersion": "appcontroller.k8s/v1alpha1",
        "kind": "Dependency",
        "metadata": {"name": name},
        "parent": parent,
        "child": child,
        "meta": meta,
    })
}

async fn build(store: &MemoryStore, selector: &str) -> Result<DependencyGraph, BuildError> {
    let store: Arc<dyn ClusterStore> = Arc::new(store.clone());
    build_dependency_graph(store, &Registry::new(), selector).await
}

fn edges(graph: &DependencyGraph) -> Vec<(String, String)> {
    graph
        .edges()
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect()
}

#[tokio::test]
async fn test_edges_point_from_child_to_parent() {
    let store = MemoryStore::new();
    store.add_definition(definition("configmap", "settings", json!({})));
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency("d1", "configmap/settings", "pod/app", json!({})));

    let graph = build(&store, "").await.unwrap();

    assert_eq!(graph.len(), 2);
    assert_eq!(
        edges(&graph),
        vec![("pod/app".to_string(), "configmap/settings".to_string())]
    );
    let app = graph.get("pod/app").unwrap();
    assert_eq!(app.dependencies().len(), 1);
    assert!(app.dependents().is_empty());
    assert_eq!(
        graph.get("configmap/settings").unwrap().dependents(),
        ["pod/app".to_string()]
    );
    let roots: Vec<String> = graph.roots().map(|v| v.key()).collect();
    assert_eq!(roots, vec!["pod/app".to_string()]);
}

#[tokio::test]
async fn test_edge_carries_dependency_meta() {
    let store = MemoryStore::new();
    store.add_definition(definition("job", "migrate", json!({})));
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency(
        "d1",
        "job/migrate",
        "pod/app",
        json!({"blocks": false, "timeout": 30}),
    ));

    let graph = build(&store, "").await.unwrap();
    let edge = &graph.get("pod/app").unwrap().dependencies()[0];

    assert!(!edge.blocks());
    assert_eq!(edge.timeout(), Some(std::time::Duration::from_secs(30)));
    assert!(!edge.tolerates_errors());
}

#[tokio::test]
async fn test_existing_object_must_be_present() {
    let store = MemoryStore::new();
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency("needs-creds", "secret/creds", "pod/app", json!({})));

    let err = build(&store, "").await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::MissingExisting { ref dependency, ref key }
            if dependency == "needs-creds" && key == "secret/creds"
    ));

    store.insert(ResourceKind::Secret, json!({"metadata": {"name": "creds"}}));
    let graph = build(&store, "").await.unwrap();
    assert!(graph.get("secret/creds").unwrap().resource().is_existing());
    assert!(!graph.get("pod/app").unwrap().resource().is_existing());
}

#[tokio::test]
async fn test_unknown_kind_in_reference() {
    let store = MemoryStore::new();
    store.add_definition(definition("pod", "app", json!({})));
    store.add_dependency(dependency("bad", "widget/x", "pod/app", json!({})));

    let err = build(&store, "").await.unwrap_err();
    assert!(matches!(err, BuildError::Reference { ref dependency, .. } if dependency == "bad"));
}

#[tokio::test]
async fn test_definition_with_two_kinds() {
    let store = MemoryStore::new();
    store.add_definition(json!({
        "metadata": {"name": "greedy"},
        "pod": {"metadata": {"name": "a"}},
        "secret": {"metadata": {"name": "b"}}
    }));

    let err = build(&store, "").await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::Definition(DefinitionError::MultipleKinds { .. })
    ));
}

#[tokio::test]
async fn test_dependency_without_child() {
    let store = MemoryStore::new();
    store.add_dependency(json!({"metadata": {"name": "half"}, "parent": "pod/a"}));

    let err = build(&store, "").await.unwrap_err();
    assert!(matches!(err, BuildError::Dependency(_)));
}

#[tokio::test]
async fn test_missing_custom_resources() {
    let store = MemoryStore::new();
    store.without_schemas();

    let err = build(&store, "").await.unwrap_err();
    assert!(matches!(err, BuildError::Store(StoreError::SchemaMissing(_))));
}

#[tokio::test]
async fn test_selector_filters_definitions() {
    let store = MemoryStore::new();
    store.add_definition(definition("pod", "web", json!({"app": "web"})));
    store.add_definition(definition("pod", "batch", json!({"app": "batch"})));

    let graph = build(&store, "app=web").await.unwrap();
    assert_eq!(graph.keys().collect::<Vec<_>>(), vec!["pod/web"]);
}

#[tokio::test]
async fn test_cycle_is_reported() {
    let store = MemoryStore::new();
    for name in ["a", "b", "c"] {
        store.add_definition(definition("pod", name, json!({})));
    }
    store.add_dependency(dependency("ab", "pod/a", "pod/b", json!({})));
    store.add_dependency(dependency("bc", "pod/b", "pod/c", json!({})));
    store.add_dependency(dependency("ca", "pod/c", "pod/a", json!({})));

    let graph = build(&store, "").await.unwrap();
    let cycles = detect_cycles(&graph);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 3);
    assert_eq!(cycles[0][0], "pod/a");

    let err = Scheduler::new(graph, SchedulerConfig::default())
        .err()
        .expect("cyclic graph must be rejected");
    assert!(err.to_string().contains("1 cycle"));
}

#[tokio::test]
async fn test_build_is_independent_of_listing_order() {
    let forward = MemoryStore::new();
    let backward = MemoryStore::new();
    let defs = [
        definition("secret", "creds", json!({})),
        definition("job", "migrate", json!({})),
        definition("pod", "app", json!({})),
    ];
    let deps = [
        dependency("d1", "secret/creds", "job/migrate", json!({})),
        dependency("d2", "job/migrate", "pod/app", json!({})),
        dependency("d3", "secret/creds", "pod/app", json!({})),
    ];
    for def in &defs {
        forward.add_definition(def.clone());
    }
    for def in defs.iter().rev() {
        backward.add_definition(def.clone());
    }
    for dep in &deps {
        forward.add_dependency(dep.clone());
    }
    for dep in deps.iter().rev() {
        backward.add_dependency(dep.clone());
    }

    let a = build(&forward, "").await.unwrap();
    let b = build(&backward, "").await.unwrap();

    assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
    assert_eq!(edges(&a), edges(&b));
    assert!(detect_cycles(&a).is_empty());
}
