//! Resource abstraction
//!
//! Every deployable object, whether described by a `Definition` or merely
//! referenced by name, is a [`Resource`]. The scheduler only ever sees this
//! trait; kind-specific readiness lives in [`readiness`] and construction in
//! [`registry`].

pub mod kinds;
pub mod readiness;
pub mod registry;

pub use kinds::{Existing, Managed};
pub use readiness::{Evaluation, Observation, Readiness};
pub use registry::{KindFactory, Registry, RegistryError, ResourceFactory};

use async_trait::async_trait;
use std::fmt;

use crate::cluster::StoreError;
use crate::models::{Meta, MetaError, ResourceKind};
use crate::report::DependencyReport;

/// Coarse readiness returned by [`Resource::status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Ready,
    NotReady,
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessState::Ready => write!(f, "ready"),
            ReadinessState::NotReady => write!(f, "not ready"),
        }
    }
}

/// Errors from resource operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{key}: {source}")]
    Threshold {
        key: String,
        #[source]
        source: MetaError,
    },

    #[error("{key} failed: {message}")]
    Failed { key: String, message: String },

    #[error("{key}: cannot decode object: {message}")]
    Decode { key: String, message: String },
}

impl ResourceError {
    /// Fatal errors end polling immediately; the rest may clear up on retry
    pub fn is_fatal(&self) -> bool {
        match self {
            ResourceError::NotFound(_) => false,
            ResourceError::Store(StoreError::Api { .. }) => false,
            ResourceError::Store(_) => true,
            ResourceError::Threshold { .. }
            | ResourceError::Failed { .. }
            | ResourceError::Decode { .. } => true,
        }
    }
}

/// Contract shared by every resource kind
#[async_trait]
pub trait Resource: Send + Sync + fmt::Debug {
    fn kind(&self) -> ResourceKind;

    fn name(&self) -> &str;

    /// Stable graph identity, `<kind>/<name>`
    fn key(&self) -> String {
        self.kind().key(self.name())
    }

    /// Meta of the definition this resource came from; empty for existing references
    fn meta(&self) -> &Meta;

    /// True for references to objects created out-of-band
    fn is_existing(&self) -> bool;

    /// Create the object unless it is already there
    async fn create(&self) -> Result<(), ResourceError>;

    async fn delete(&self) -> Result<(), ResourceError>;

    /// Readiness against the `success_factor` in `meta`
    async fn status(&self, meta: &Meta) -> Result<ReadinessState, ResourceError>;

    /// Same computation as [`Resource::status`], reported in full
    async fn dependency_report(&self, meta: &Meta) -> DependencyReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(!ResourceError::NotFound("pod/a".into()).is_fatal());
        assert!(
            !ResourceError::Store(StoreError::Api {
                key: "pod/a".into(),
                message: "timeout".into()
            })
            .is_fatal()
        );
        assert!(
            ResourceError::Threshold {
                key: "pod/a".into(),
                source: MetaError::InvalidSuccessFactor("x".into())
            }
            .is_fatal()
        );
        assert!(
            ResourceError::Failed {
                key: "job/a".into(),
                message: "BackoffLimitExceeded".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_readiness_display() {
        assert_eq!(ReadinessState::Ready.to_string(), "ready");
        assert_eq!(ReadinessState::NotReady.to_string(), "not ready");
    }
}
