//! Kubernetes client module
//!
//! Connection setup plus the [`ClusterStore`] abstraction the rest of the
//! crate talks to. Production code uses [`KubeStore`]; tests and dry runs use
//! [`MemoryStore`].

pub mod bootstrap;
pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{ClusterStore, KubeStore, StoreError};

use anyhow::{Context, Result};
use kube::{Client, Config};

/// API group of the `Definition` and `Dependency` custom resources
pub const API_GROUP: &str = "appcontroller.k8s";
/// Served version of both custom resources
pub const API_VERSION: &str = "v1alpha1";

/// Create a Kubernetes client
///
/// With an explicit cluster URL the client talks to that endpoint directly
/// (the `KUBERNETES_CLUSTER_URL` convention); otherwise the default loading
/// strategy applies:
/// 1. In-cluster config (if running in a pod)
/// 2. KUBECONFIG environment variable
/// 3. ~/.kube/config
pub async fn create_client(cluster_url: Option<&str>) -> Result<Client> {
    let config = match cluster_url.filter(|u| !u.is_empty()) {
        Some(url) => {
            let uri = url
                .parse()
                .with_context(|| format!("Invalid cluster URL: {}", url))?;
            tracing::debug!("Using explicit cluster URL {}", url);
            Config::new(uri)
        }
        None => Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };

    let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
    Ok(client)
}

/// Resolve the namespace to deploy into
///
/// An explicit value wins; otherwise the namespace of the active kubeconfig
/// context (or the pod's own namespace in-cluster) is used.
pub fn resolve_namespace(explicit: Option<&str>, client: &Client) -> String {
    match explicit.filter(|ns| !ns.is_empty()) {
        Some(ns) => ns.to_string(),
        None => client.default_namespace().to_string(),
    }
}
