//! Graph-wide status and reports
//!
//! After a run the per-vertex states are authoritative. On a graph that was
//! only built in this process the state of each vertex is probed live instead.

use std::collections::HashSet;
use std::fmt;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;

use super::graph::{DependencyGraph, Vertex, VertexStatus};
use crate::models::Meta;
use crate::report::{DependencyReport, DeploymentReport};
use crate::resources::{ReadinessState, ResourceError};

/// Status of the whole deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphStatus {
    NotStarted,
    Processing,
    Warning,
    Ready,
    Error,
}

impl GraphStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphStatus::NotStarted => "not started",
            GraphStatus::Processing => "processing",
            GraphStatus::Warning => "warning",
            GraphStatus::Ready => "ready",
            GraphStatus::Error => "error",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, GraphStatus::Ready)
    }
}

impl fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fold vertex statuses into one; an empty graph is trivially ready
pub fn fold_statuses(statuses: impl IntoIterator<Item = VertexStatus>) -> GraphStatus {
    let statuses: Vec<VertexStatus> = statuses.into_iter().collect();
    let any = |s: VertexStatus| statuses.contains(&s);

    if any(VertexStatus::Error) {
        GraphStatus::Error
    } else if any(VertexStatus::Warning) {
        GraphStatus::Warning
    } else if statuses.iter().all(|s| *s == VertexStatus::Ready) {
        GraphStatus::Ready
    } else if statuses.iter().all(|s| *s == VertexStatus::NotStarted) {
        GraphStatus::NotStarted
    } else {
        GraphStatus::Processing
    }
}

/// Live probe of a vertex that was not executed in this process
async fn probe(vertex: &Vertex) -> VertexStatus {
    let resource = vertex.resource();
    match resource.status(resource.meta()).await {
        Ok(ReadinessState::Ready) => VertexStatus::Ready,
        Ok(ReadinessState::NotReady) => VertexStatus::Creating,
        Err(ResourceError::NotFound(_)) => VertexStatus::NotStarted,
        Err(e) => {
            tracing::debug!("Status probe of {} failed: {}", vertex.key(), e);
            VertexStatus::Error
        }
    }
}

/// Report tree for one vertex, evaluated against `meta`
///
/// `path` holds the keys above this node so a cyclic graph cannot recurse
/// forever.
fn vertex_report<'a>(
    graph: &'a DependencyGraph,
    vertex: &'a Vertex,
    meta: &'a Meta,
    path: HashSet<String>,
) -> BoxFuture<'a, DependencyReport> {
    async move {
        let key = vertex.key();
        let state = vertex.state();
        let measured = vertex.resource().dependency_report(meta).await;
        let node = match &state.error {
            Some(error) => measured.failed_with(error),
            None => measured,
        };

        let mut path = path;
        path.insert(key);
        let mut children = Vec::new();
        for edge in vertex.dependencies() {
            if path.contains(&edge.to) {
                continue;
            }
            let Some(dependency) = graph.get(&edge.to) else {
                continue;
            };
            let child = vertex_report(graph, dependency, &edge.meta, path.clone()).await;
            children.push(if edge.blocks() {
                child
            } else {
                child.non_blocking()
            });
        }
        node.with_children(children)
    }
    .boxed()
}

/// Report rooted at a single vertex, using that vertex's own meta
pub async fn report_for(graph: &DependencyGraph, key: &str) -> Option<DependencyReport> {
    let vertex = graph.get(key)?;
    Some(vertex_report(graph, vertex, vertex.resource().meta(), HashSet::new()).await)
}

/// Overall status plus a report per root vertex
pub async fn get_status(graph: &DependencyGraph) -> (GraphStatus, DeploymentReport) {
    let status = if graph.has_run() {
        fold_statuses(graph.vertices().map(Vertex::status))
    } else {
        let mut statuses = Vec::with_capacity(graph.len());
        for vertex in graph.vertices() {
            statuses.push(probe(vertex).await);
        }
        fold_statuses(statuses)
    };

    let mut roots = Vec::new();
    for root in graph.roots() {
        roots.push(vertex_report(graph, root, root.resource().meta(), HashSet::new()).await);
    }

    (status, DeploymentReport(roots))
}
