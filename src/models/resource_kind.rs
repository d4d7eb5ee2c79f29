//! Resource kind definitions
//!
//! A closed enum of every Kubernetes kind the controller knows how to deploy.
//! The lowercase name doubles as the key prefix (`pod/web`) and as the field
//! name inside a `Definition` object.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, PersistentVolumeClaim, Pod, Secret, Service, ServiceAccount,
};
use kube::core::ApiResource;

/// Enumeration of all deployable resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Pod,
    Job,
    ReplicaSet,
    Deployment,
    StatefulSet,
    DaemonSet,
    Service,
    ConfigMap,
    Secret,
    PersistentVolumeClaim,
    ServiceAccount,
}

impl ResourceKind {
    /// Lowercase name used as key prefix and definition field
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Job => "job",
            ResourceKind::ReplicaSet => "replicaset",
            ResourceKind::Deployment => "deployment",
            ResourceKind::StatefulSet => "statefulset",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::Service => "service",
            ResourceKind::ConfigMap => "configmap",
            ResourceKind::Secret => "secret",
            ResourceKind::PersistentVolumeClaim => "persistentvolumeclaim",
            ResourceKind::ServiceAccount => "serviceaccount",
        }
    }

    /// Kubernetes `kind` as it appears in object manifests
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "Pod",
            ResourceKind::Job => "Job",
            ResourceKind::ReplicaSet => "ReplicaSet",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Service => "Service",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Secret => "Secret",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::ServiceAccount => "ServiceAccount",
        }
    }

    /// Get all resource kinds
    pub fn all() -> &'static [Self] {
        &[
            ResourceKind::Pod,
            ResourceKind::Job,
            ResourceKind::ReplicaSet,
            ResourceKind::Deployment,
            ResourceKind::StatefulSet,
            ResourceKind::DaemonSet,
            ResourceKind::Service,
            ResourceKind::ConfigMap,
            ResourceKind::Secret,
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::ServiceAccount,
        ]
    }

    /// Try to parse a string into a ResourceKind, returning None if invalid
    pub fn parse_optional(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// API coordinates used when talking to the cluster through `DynamicObject`
    pub fn api_resource(&self) -> ApiResource {
        match self {
            ResourceKind::Pod => ApiResource::erase::<Pod>(&()),
            ResourceKind::Job => ApiResource::erase::<Job>(&()),
            ResourceKind::ReplicaSet => ApiResource::erase::<ReplicaSet>(&()),
            ResourceKind::Deployment => ApiResource::erase::<Deployment>(&()),
            ResourceKind::StatefulSet => ApiResource::erase::<StatefulSet>(&()),
            ResourceKind::DaemonSet => ApiResource::erase::<DaemonSet>(&()),
            ResourceKind::Service => ApiResource::erase::<Service>(&()),
            ResourceKind::ConfigMap => ApiResource::erase::<ConfigMap>(&()),
            ResourceKind::Secret => ApiResource::erase::<Secret>(&()),
            ResourceKind::PersistentVolumeClaim => ApiResource::erase::<PersistentVolumeClaim>(&()),
            ResourceKind::ServiceAccount => ApiResource::erase::<ServiceAccount>(&()),
        }
    }

    /// Build a graph key (`<kind>/<name>`)
    pub fn key(&self, name: &str) -> String {
        format!("{}/{}", self.as_str(), name)
    }

    /// Split a `<kind>/<name>` reference into its parts
    ///
    /// Returns `None` when the reference has no `/` or names an unknown kind.
    pub fn split_key(reference: &str) -> Option<(Self, &str)> {
        let (kind, name) = reference.split_once('/')?;
        if name.is_empty() {
            return None;
        }
        Some((Self::parse_optional(kind)?, name))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    /// Accepts the lowercase key prefix, the manifest kind, and `pvc`/`sa` shorthands
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pod" => Ok(ResourceKind::Pod),
            "job" => Ok(ResourceKind::Job),
            "replicaset" => Ok(ResourceKind::ReplicaSet),
            "deployment" => Ok(ResourceKind::Deployment),
            "statefulset" | "petset" => Ok(ResourceKind::StatefulSet),
            "daemonset" => Ok(ResourceKind::DaemonSet),
            "service" => Ok(ResourceKind::Service),
            "configmap" => Ok(ResourceKind::ConfigMap),
            "secret" => Ok(ResourceKind::Secret),
            "persistentvolumeclaim" | "pvc" => Ok(ResourceKind::PersistentVolumeClaim),
            "serviceaccount" | "sa" => Ok(ResourceKind::ServiceAccount),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}
