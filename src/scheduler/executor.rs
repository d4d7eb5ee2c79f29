//! Concurrent graph execution
//!
//! One task per vertex. A task waits until every dependency edge is satisfied,
//! creates its resource and then polls it until ready. Tasks only talk to each
//! other through the per-vertex `watch` channels, so a failure stops exactly
//! the vertices that block on it.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::cycles::{CycleError, ensure_acyclic};
use super::graph::{DependencyEdge, DependencyGraph, VertexError, VertexState, VertexStatus};
use super::status::{GraphStatus, fold_statuses};
use crate::models::dependency;
use crate::resources::ReadinessState;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Delay between readiness checks
    pub poll_interval: Duration,
    /// How long to wait for a resource to become ready
    pub timeout: Duration,
    /// Maximum simultaneous `create()` calls; 0 means unlimited
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            concurrency: 0,
        }
    }
}

/// Runs an acyclic dependency graph to completion
pub struct Scheduler {
    graph: Arc<DependencyGraph>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Fails if the graph has cycles; a cyclic graph would wait forever
    pub fn new(graph: DependencyGraph, config: SchedulerConfig) -> Result<Self, CycleError> {
        ensure_acyclic(&graph)?;
        Ok(Self {
            graph: Arc::new(graph),
            config,
        })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Execute every vertex and return the folded status
    pub async fn run(&self) -> GraphStatus {
        let permits = (self.config.concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.config.concurrency)));

        let mut tasks = JoinSet::new();
        for key in self.graph.keys() {
            let task = VertexTask {
                graph: self.graph.clone(),
                key: key.to_string(),
                config: self.config.clone(),
                permits: permits.clone(),
            };
            tasks.spawn(task.run());
        }

        tracing::info!("Scheduling {} resource(s)", self.graph.len());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Vertex task aborted: {}", e);
            }
        }

        let status = fold_statuses(self.graph.vertices().map(|v| v.status()));
        tracing::info!("Deployment finished: {}", status);
        status
    }
}

/// How a satisfied edge was satisfied
enum Satisfied {
    Clean,
    WithWarning(String),
}

struct VertexTask {
    graph: Arc<DependencyGraph>,
    key: String,
    config: SchedulerConfig,
    permits: Option<Arc<Semaphore>>,
}

impl VertexTask {
    async fn run(self) {
        let Some(vertex) = self.graph.get(&self.key) else {
            return;
        };

        let waits = vertex.dependencies().iter().map(|edge| self.wait_for(edge));
        let warnings: Vec<String> = match try_join_all(waits).await {
            Ok(outcomes) => outcomes
                .into_iter()
                .filter_map(|outcome| match outcome {
                    Satisfied::Clean => None,
                    Satisfied::WithWarning(w) => Some(w),
                })
                .collect(),
            Err(e) => {
                tracing::warn!("{}", e);
                vertex.transition(VertexState::failed(e));
                return;
            }
        };

        vertex.transition(VertexState::creating());
        let next = match self.create_and_wait().await {
            Ok(()) => VertexState::finished(warnings),
            Err(e) => {
                tracing::warn!("{}", e);
                VertexState::failed(e)
            }
        };
        vertex.transition(next);
    }

    async fn create_and_wait(&self) -> Result<(), VertexError> {
        let Some(vertex) = self.graph.get(&self.key) else {
            return Ok(());
        };
        let resource = vertex.resource();

        {
            let _permit = match &self.permits {
                Some(permits) => permits.clone().acquire_owned().await.ok(),
                None => None,
            };
            resource
                .create()
                .await
                .map_err(|source| VertexError::Creation {
                    key: self.key.clone(),
                    source,
                })?;
        }

        let meta = resource.meta();
        let timeout = dependency::timeout(meta).unwrap_or(self.config.timeout);
        let deadline = Instant::now() + timeout;
        loop {
            match resource.status(meta).await {
                Ok(ReadinessState::Ready) => {
                    tracing::info!("{} is ready", self.key);
                    return Ok(());
                }
                Ok(ReadinessState::NotReady) => {
                    tracing::debug!("{} not ready yet", self.key);
                }
                Err(source) if source.is_fatal() => {
                    return Err(VertexError::Status {
                        key: self.key.clone(),
                        source,
                    });
                }
                Err(e) => tracing::debug!("Transient status error for {}: {}", self.key, e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(VertexError::Timeout {
                    key: self.key.clone(),
                    waiting_for: self.key.clone(),
                    after: timeout,
                });
            }
            tokio::time::sleep_until(deadline.min(now + self.config.poll_interval)).await;
        }
    }

    /// Wait until `edge` is satisfied, or fail with the reason it never will be
    async fn wait_for(&self, edge: &DependencyEdge) -> Result<Satisfied, VertexError> {
        if !edge.blocks() {
            tracing::debug!("{}: {} is non-blocking", self.key, edge.to);
            return Ok(Satisfied::Clean);
        }
        let Some(upstream) = self.graph.get(&edge.to) else {
            return Ok(Satisfied::Clean);
        };

        let mut updates = upstream.subscribe();
        // The deadline starts once the dependency starts
        let started = updates
            .wait_for(|s| s.status != VertexStatus::NotStarted)
            .await
            .is_ok();
        if !started {
            return Err(self.blocked_by(edge));
        }

        let timeout = edge.timeout().unwrap_or(self.config.timeout);
        let deadline = Instant::now() + timeout;
        loop {
            let state = updates.borrow_and_update().clone();
            if state.status == VertexStatus::Error {
                return self.dependency_failed(edge, &state);
            }

            match upstream.resource().status(&edge.meta).await {
                Ok(ReadinessState::Ready) if state.status == VertexStatus::Warning => {
                    return Ok(Satisfied::WithWarning(format!(
                        "{} finished with warnings: {}",
                        edge.to,
                        state.warnings.join("; ")
                    )));
                }
                Ok(ReadinessState::Ready) => {
                    tracing::debug!("{}: dependency {} satisfied", self.key, edge.to);
                    return Ok(Satisfied::Clean);
                }
                Ok(ReadinessState::NotReady) => {
                    tracing::debug!("{}: waiting for {}", self.key, edge.to);
                }
                Err(source) if source.is_fatal() => {
                    return Err(VertexError::DependencyStatus {
                        key: self.key.clone(),
                        dependency: edge.to.clone(),
                        source,
                    });
                }
                Err(e) => tracing::debug!("{}: transient error checking {}: {}", self.key, edge.to, e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(VertexError::Timeout {
                    key: self.key.clone(),
                    waiting_for: edge.to.clone(),
                    after: timeout,
                });
            }
            let wake = deadline.min(now + self.config.poll_interval);
            tokio::select! {
                _ = tokio::time::sleep_until(wake) => {}
                changed = updates.changed() => {
                    if changed.is_err() {
                        tokio::time::sleep_until(wake).await;
                    }
                }
            }
        }
    }

    fn dependency_failed(
        &self,
        edge: &DependencyEdge,
        state: &VertexState,
    ) -> Result<Satisfied, VertexError> {
        if !edge.tolerates_errors() {
            return Err(self.blocked_by(edge));
        }
        let cause = state
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown error".to_string());
        tracing::warn!(
            "{}: ignoring failure of {} ({})",
            self.key,
            edge.to,
            cause
        );
        Ok(Satisfied::WithWarning(format!("{} failed: {}", edge.to, cause)))
    }

    fn blocked_by(&self, edge: &DependencyEdge) -> VertexError {
        VertexError::Blocked {
            key: self.key.clone(),
            dependency: edge.to.clone(),
        }
    }
}
