//! Dependency graph scheduling
//!
//! Build a graph from the cluster's definitions and dependencies, reject
//! cycles, then create every resource as soon as what it depends on is ready.
//!
//! ```text
//! builder ──► graph ──► cycles ──► executor ──► status
//! ```

pub mod builder;
pub mod cycles;
pub mod executor;
pub mod graph;
pub mod status;

pub use builder::{BuildError, build_dependency_graph, from_parts};
pub use cycles::{CycleError, detect_cycles, ensure_acyclic};
pub use executor::{Scheduler, SchedulerConfig};
pub use graph::{DependencyEdge, DependencyGraph, Vertex, VertexError, VertexState, VertexStatus};
pub use status::{GraphStatus, fold_statuses, get_status, report_for};
