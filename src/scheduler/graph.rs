//! Dependency graph data structures
//!
//! Vertices are keyed by `<kind>/<name>` and kept in a `BTreeMap` so every walk
//! over the graph is deterministic. Each vertex publishes its runtime state on
//! its own `watch` channel; the vertex's task is the only writer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::models::Meta;
use crate::models::dependency;
use crate::resources::{Resource, ResourceError};

/// Runtime status of a single vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStatus {
    NotStarted,
    Creating,
    Ready,
    Warning,
    Error,
}

impl VertexStatus {
    /// Terminal statuses never change again within a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VertexStatus::Ready | VertexStatus::Warning | VertexStatus::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VertexStatus::NotStarted => "not started",
            VertexStatus::Creating => "creating",
            VertexStatus::Ready => "ready",
            VertexStatus::Warning => "warning",
            VertexStatus::Error => "error",
        }
    }
}

impl fmt::Display for VertexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a vertex ended up in `Error`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VertexError {
    #[error("failed to create {key}: {source}")]
    Creation {
        key: String,
        #[source]
        source: ResourceError,
    },

    #[error("status check of {key} failed: {source}")]
    Status {
        key: String,
        #[source]
        source: ResourceError,
    },

    #[error("{key}: checking dependency {dependency} failed: {source}")]
    DependencyStatus {
        key: String,
        dependency: String,
        #[source]
        source: ResourceError,
    },

    #[error("{key}: timed out after {}s waiting for {waiting_for}", .after.as_secs())]
    Timeout {
        key: String,
        waiting_for: String,
        after: Duration,
    },

    #[error("{key} blocked by {dependency}")]
    Blocked { key: String, dependency: String },
}

/// Observable state of a vertex
#[derive(Debug, Clone, PartialEq)]
pub struct VertexState {
    pub status: VertexStatus,
    pub error: Option<VertexError>,
    /// Failures of tolerated dependencies
    pub warnings: Vec<String>,
}

impl Default for VertexState {
    fn default() -> Self {
        Self {
            status: VertexStatus::NotStarted,
            error: None,
            warnings: Vec::new(),
        }
    }
}

impl VertexState {
    pub fn creating() -> Self {
        Self {
            status: VertexStatus::Creating,
            ..Self::default()
        }
    }

    /// `Ready`, or `Warning` when any warnings were collected on the way
    pub fn finished(warnings: Vec<String>) -> Self {
        let status = if warnings.is_empty() {
            VertexStatus::Ready
        } else {
            VertexStatus::Warning
        };
        Self {
            status,
            error: None,
            warnings,
        }
    }

    pub fn failed(error: VertexError) -> Self {
        Self {
            status: VertexStatus::Error,
            error: Some(error),
            warnings: Vec::new(),
        }
    }
}

/// `from` waits for `to`
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyEdge {
    /// Dependent
    pub from: String,
    /// Dependency
    pub to: String,
    pub meta: Meta,
}

impl DependencyEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, meta: Meta) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            meta,
        }
    }

    pub fn blocks(&self) -> bool {
        dependency::blocks(&self.meta)
    }

    pub fn tolerates_errors(&self) -> bool {
        dependency::tolerates_errors(&self.meta)
    }

    pub fn timeout(&self) -> Option<Duration> {
        dependency::timeout(&self.meta)
    }
}

/// One resource plus its edges and runtime state
pub struct Vertex {
    resource: Arc<dyn Resource>,
    dependencies: Vec<DependencyEdge>,
    dependents: Vec<String>,
    state: watch::Sender<VertexState>,
}

impl fmt::Debug for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vertex")
            .field("key", &self.key())
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl Vertex {
    fn new(resource: Arc<dyn Resource>) -> Self {
        Self {
            resource,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            state: watch::Sender::new(VertexState::default()),
        }
    }

    pub fn key(&self) -> String {
        self.resource.key()
    }

    pub fn resource(&self) -> &Arc<dyn Resource> {
        &self.resource
    }

    /// Outgoing edges, sorted by dependency key
    pub fn dependencies(&self) -> &[DependencyEdge] {
        &self.dependencies
    }

    /// Keys of vertices that depend on this one, sorted
    pub fn dependents(&self) -> &[String] {
        &self.dependents
    }

    pub fn state(&self) -> VertexState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> VertexStatus {
        self.state.borrow().status
    }

    pub fn subscribe(&self) -> watch::Receiver<VertexState> {
        self.state.subscribe()
    }

    /// Publish a new state; terminal states are final
    ///
    /// Returns whether the state changed.
    pub fn transition(&self, next: VertexState) -> bool {
        let key = self.key();
        self.state.send_if_modified(|current| {
            if current.status.is_terminal() {
                tracing::warn!(
                    "Ignoring {} -> {} for {}: vertex already finished",
                    current.status,
                    next.status,
                    key
                );
                return false;
            }
            if *current == next {
                return false;
            }
            tracing::debug!("{}: {} -> {}", key, current.status, next.status);
            *current = next;
            true
        })
    }
}

/// Resources keyed by `<kind>/<name>`, plus the edges between them
#[derive(Debug, Default)]
pub struct DependencyGraph {
    vertices: BTreeMap<String, Vertex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vertex; `false` if the key is already taken
    pub fn add_vertex(&mut self, resource: Arc<dyn Resource>) -> bool {
        let key = resource.key();
        if self.vertices.contains_key(&key) {
            return false;
        }
        self.vertices.insert(key, Vertex::new(resource));
        true
    }

    /// Insert an edge; `false` if either endpoint is missing
    pub fn add_edge(&mut self, edge: DependencyEdge) -> bool {
        if !self.vertices.contains_key(&edge.to) {
            return false;
        }
        let (from, to) = (edge.from.clone(), edge.to.clone());
        let Some(dependent) = self.vertices.get_mut(&from) else {
            return false;
        };
        let pos = dependent
            .dependencies
            .partition_point(|existing| existing.to <= edge.to);
        dependent.dependencies.insert(pos, edge);

        if let Some(dependency) = self.vertices.get_mut(&to) {
            if let Err(pos) = dependency.dependents.binary_search(&from) {
                dependency.dependents.insert(pos, from);
            }
        }
        true
    }

    pub fn get(&self, key: &str) -> Option<&Vertex> {
        self.vertices.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vertices.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vertices.keys().map(String::as_str)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.vertices.values().flat_map(|v| v.dependencies.iter())
    }

    /// Vertices nothing depends on
    pub fn roots(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values().filter(|v| v.dependents.is_empty())
    }

    /// Whether any vertex has left `NotStarted` in this process
    pub fn has_run(&self) -> bool {
        self.vertices
            .values()
            .any(|v| v.status() != VertexStatus::NotStarted)
    }
}
