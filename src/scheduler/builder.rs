//! Dependency graph construction
//!
//! Every definition becomes a vertex. Every dependency becomes an edge from the
//! child (the dependent) to the parent. Endpoints not described by any
//! definition are taken to be existing objects, which must be present in the
//! cluster when the graph is built.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::graph::{DependencyEdge, DependencyGraph};
use crate::cluster::{ClusterStore, StoreError};
use crate::models::{
    Dependency, DependencyParseError, DefinitionError, ResourceDefinition, ResourceKind,
};
use crate::resources::{Registry, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Dependency(#[from] DependencyParseError),

    #[error("definition {definition}: {source}")]
    Registry {
        definition: String,
        #[source]
        source: RegistryError,
    },

    #[error("dependency {dependency}: {source}")]
    Reference {
        dependency: String,
        #[source]
        source: RegistryError,
    },

    #[error("definitions {first} and {second} both describe {key}")]
    DuplicateKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("dependency {dependency} refers to {key}, which has no definition and does not exist")]
    MissingExisting { dependency: String, key: String },
}

/// Read definitions and dependencies from the store and build the graph
pub async fn build_dependency_graph(
    store: Arc<dyn ClusterStore>,
    registry: &Registry,
    selector: &str,
) -> Result<DependencyGraph, BuildError> {
    let definitions = store
        .list_definitions(selector)
        .await?
        .iter()
        .map(ResourceDefinition::from_value)
        .collect::<Result<Vec<_>, _>>()?;
    let dependencies = store
        .list_dependencies(selector)
        .await?
        .iter()
        .map(Dependency::from_value)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        "Building graph from {} definition(s) and {} dependency(ies)",
        definitions.len(),
        dependencies.len()
    );

    let (graph, existing) = from_parts(&definitions, &dependencies, registry, store.clone())?;

    for (key, dependency) in existing {
        let Some((kind, name)) = ResourceKind::split_key(&key) else {
            continue;
        };
        if store.get(kind, name).await?.is_none() {
            return Err(BuildError::MissingExisting { dependency, key });
        }
    }

    tracing::info!(
        "Built dependency graph with {} vertices and {} edges",
        graph.len(),
        graph.edges().count()
    );
    Ok(graph)
}

/// Assemble a graph from already parsed records
///
/// Also returns every existing-object reference (key mapped to the first
/// dependency naming it) so the caller can check the cluster for them.
pub fn from_parts(
    definitions: &[ResourceDefinition],
    dependencies: &[Dependency],
    registry: &Registry,
    store: Arc<dyn ClusterStore>,
) -> Result<(DependencyGraph, BTreeMap<String, String>), BuildError> {
    let mut graph = DependencyGraph::new();
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();

    for def in definitions {
        let key = def.key();
        if let Some(first) = owners.get(&key) {
            let (first, second) = if *first <= def.name.as_str() {
                (first.to_string(), def.name.clone())
            } else {
                (def.name.clone(), first.to_string())
            };
            return Err(BuildError::DuplicateKey { key, first, second });
        }
        let resource = registry
            .build(def, store.clone())
            .map_err(|source| BuildError::Registry {
                definition: def.name.clone(),
                source,
            })?;
        graph.add_vertex(resource);
        owners.insert(key, &def.name);
    }

    let mut existing = BTreeMap::new();
    for dep in dependencies {
        let child = resolve(&dep.child, dep, definitions, registry, &store, &mut graph)?;
        let parent = resolve(&dep.parent, dep, definitions, registry, &store, &mut graph)?;
        for key in [&child, &parent] {
            if graph.get(key).is_some_and(|v| v.resource().is_existing()) {
                existing.entry(key.clone()).or_insert_with(|| dep.name.clone());
            }
        }
        graph.add_edge(DependencyEdge::new(child, parent, dep.meta.clone()));
    }

    Ok((graph, existing))
}

/// Resolve one endpoint to a vertex key, adding an existing reference if needed
fn resolve(
    reference: &str,
    dep: &Dependency,
    definitions: &[ResourceDefinition],
    registry: &Registry,
    store: &Arc<dyn ClusterStore>,
    graph: &mut DependencyGraph,
) -> Result<String, BuildError> {
    let reference_error = |source| BuildError::Reference {
        dependency: dep.name.clone(),
        source,
    };
    let (kind, name) = registry.parse_reference(reference).map_err(reference_error)?;
    let key = kind.key(name);

    let defined = registry
        .find_definition(kind, name, definitions)
        .map_err(reference_error)?
        .is_some();
    if !defined && !graph.contains(&key) {
        tracing::debug!("{} has no definition, treating it as existing", key);
        let resource = registry
            .existing(kind, name, store.clone())
            .map_err(reference_error)?;
        graph.add_vertex(resource);
    }
    Ok(key)
}
