//! Declarative model layer
//!
//! Structure:
//! - `resource_kind.rs` - the closed set of deployable kinds
//! - `definition.rs` - `Definition` objects (one embedded manifest plus meta)
//! - `dependency.rs` - `Dependency` objects and the edge meta convention

pub mod definition;
pub mod dependency;
pub mod resource_kind;

pub use definition::{DefinedKind, DefinitionBody, DefinitionError, Meta, ResourceDefinition};
pub use dependency::{Dependency, DependencyParseError, MetaError};
pub use resource_kind::ResourceKind;
