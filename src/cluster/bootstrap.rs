//! One-time cluster bootstrap
//!
//! Registers the `Definition` and `Dependency` custom resource definitions.
//! Meant to run from an init container before the controller itself; safe to
//! repeat since existing definitions are left alone.

use anyhow::{Context, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::PostParams;
use kube::{Api, Client};
use serde_json::json;

use super::store::Collection;
use super::{API_GROUP, API_VERSION};

/// Oldest server version with `apiextensions.k8s.io/v1`
pub const REQUIRED_MAJOR_VERSION: u32 = 1;
pub const REQUIRED_MINOR_VERSION: u32 = 16;

/// What happened to a single custom resource definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created(String),
    AlreadyExists(String),
}

/// Build the CRD manifest for one of the controller's collections
///
/// The schema keeps unknown fields: definitions embed arbitrary manifests and
/// both kinds carry a free-form `meta` map.
pub fn custom_resource_definition(collection: Collection) -> Result<CustomResourceDefinition> {
    let plural = collection.plural();
    let kind = collection.kind();
    let manifest = json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {"name": format!("{}.{}", plural, API_GROUP)},
        "spec": {
            "group": API_GROUP,
            "scope": "Namespaced",
            "names": {
                "plural": plural,
                "singular": kind.to_lowercase(),
                "kind": kind,
            },
            "versions": [{
                "name": API_VERSION,
                "served": true,
                "storage": true,
                "schema": {
                    "openAPIV3Schema": {
                        "type": "object",
                        "x-kubernetes-preserve-unknown-fields": true
                    }
                }
            }]
        }
    });

    serde_json::from_value(manifest)
        .with_context(|| format!("Failed to build CustomResourceDefinition for {}", kind))
}

/// Parse the leading digits of a version component (`"31+"` → 31)
pub fn parse_version_component(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Whether a server version satisfies the minimum
pub fn version_supported(major: &str, minor: &str) -> bool {
    match (parse_version_component(major), parse_version_component(minor)) {
        (Some(major), Some(minor)) => {
            major > REQUIRED_MAJOR_VERSION
                || (major == REQUIRED_MAJOR_VERSION && minor >= REQUIRED_MINOR_VERSION)
        }
        _ => false,
    }
}

async fn check_version(client: &Client) -> Result<()> {
    let info = client
        .apiserver_version()
        .await
        .context("Failed to query server version")?;

    if !version_supported(&info.major, &info.minor) {
        anyhow::bail!(
            "appcontroller is not compatible with Kubernetes older than {}.{} (server is {}.{})",
            REQUIRED_MAJOR_VERSION,
            REQUIRED_MINOR_VERSION,
            info.major,
            info.minor
        );
    }
    tracing::debug!("Server version {}.{} is supported", info.major, info.minor);
    Ok(())
}

async fn create_if_not_exists(
    api: &Api<CustomResourceDefinition>,
    crd: CustomResourceDefinition,
) -> Result<BootstrapOutcome> {
    let name = crd.metadata.name.clone().unwrap_or_default();
    match api.create(&PostParams::default(), &crd).await {
        Ok(_) => {
            tracing::info!("Created {}", name);
            Ok(BootstrapOutcome::Created(name))
        }
        Err(kube::Error::Api(resp)) if resp.code == 409 => {
            tracing::info!("{} already exists, skipping", name);
            Ok(BootstrapOutcome::AlreadyExists(name))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to create {}", name)),
    }
}

/// Register both custom resources
pub async fn bootstrap(client: &Client) -> Result<Vec<BootstrapOutcome>> {
    check_version(client).await?;

    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let mut outcomes = Vec::new();
    for collection in [Collection::Dependencies, Collection::Definitions] {
        let crd = custom_resource_definition(collection)?;
        outcomes.push(create_if_not_exists(&api, crd).await?);
    }
    Ok(outcomes)
}
