//! appcontroller library
//!
//! Deploys interdependent Kubernetes resources in an order that respects their
//! declared dependencies. The binary is a thin CLI over this library; tests use
//! it directly with an in-memory cluster store.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod models;
pub mod report;
pub mod resources;
pub mod scheduler;

// Re-export commonly used types for convenience
pub use cluster::{ClusterStore, KubeStore, MemoryStore, StoreError};
pub use models::{Dependency, ResourceDefinition, ResourceKind};
pub use report::{DependencyReport, DeploymentReport};
pub use resources::{ReadinessState, Registry, Resource, ResourceError};
pub use scheduler::{
    BuildError, CycleError, DependencyGraph, GraphStatus, Scheduler, SchedulerConfig,
    build_dependency_graph, detect_cycles, get_status,
};
