//! Cluster store abstraction
//!
//! Everything the controller reads from or writes to the cluster goes through
//! [`ClusterStore`]: the `Definition`/`Dependency` collections and plain
//! get/create/delete of objects by kind and name. Objects cross this boundary
//! as JSON so one trait covers every kind.

use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client};
use serde_json::Value;

use super::{API_GROUP, API_VERSION};
use crate::models::ResourceKind;

/// Errors returned by a [`ClusterStore`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(
        "the {0} collection is not available in the cluster (run `appcontroller bootstrap` first)"
    )]
    SchemaMissing(String),

    #[error("invalid object for {key}: {message}")]
    InvalidObject { key: String, message: String },

    #[error("cluster API error for {key}: {message}")]
    Api { key: String, message: String },
}

/// Generic access to the cluster's declarative store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// All `Definition` objects matching the label selector (empty selects all)
    async fn list_definitions(&self, selector: &str) -> Result<Vec<Value>, StoreError>;

    /// All `Dependency` objects matching the label selector (empty selects all)
    async fn list_dependencies(&self, selector: &str) -> Result<Vec<Value>, StoreError>;

    /// Fetch an object; `Ok(None)` when it does not exist
    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Option<Value>, StoreError>;

    /// Create an object from its full manifest
    async fn create(&self, kind: ResourceKind, object: Value) -> Result<(), StoreError>;

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), StoreError>;
}

/// The two custom resource collections the controller reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Definitions,
    Dependencies,
}

impl Collection {
    pub fn kind(&self) -> &'static str {
        match self {
            Collection::Definitions => "Definition",
            Collection::Dependencies => "Dependency",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            Collection::Definitions => "definitions",
            Collection::Dependencies => "dependencies",
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(API_GROUP, API_VERSION, self.kind());
        ApiResource::from_gvk_with_plural(&gvk, self.plural())
    }
}

/// [`ClusterStore`] backed by the Kubernetes API, scoped to one namespace
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    namespace: String,
}

impl KubeStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn api(&self, resource: &ApiResource) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, resource)
    }

    async fn list(&self, collection: Collection, selector: &str) -> Result<Vec<Value>, StoreError> {
        let api = self.api(&collection.api_resource());
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(selector);
        }

        let list = api.list(&params).await.map_err(|e| match classify(e, collection.plural()) {
            StoreError::NotFound(_) => StoreError::SchemaMissing(format!(
                "{}.{}",
                collection.plural(),
                API_GROUP
            )),
            other => other,
        })?;

        tracing::debug!(
            "Listed {} {} in namespace {}",
            list.items.len(),
            collection.plural(),
            self.namespace
        );

        list.items
            .iter()
            .map(|obj| {
                serde_json::to_value(obj).map_err(|e| StoreError::InvalidObject {
                    key: collection.plural().to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn list_definitions(&self, selector: &str) -> Result<Vec<Value>, StoreError> {
        self.list(Collection::Definitions, selector).await
    }

    async fn list_dependencies(&self, selector: &str) -> Result<Vec<Value>, StoreError> {
        self.list(Collection::Dependencies, selector).await
    }

    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Option<Value>, StoreError> {
        let key = kind.key(name);
        let obj = self
            .api(&kind.api_resource())
            .get_opt(name)
            .await
            .map_err(|e| classify(e, &key))?;

        obj.map(|o| serde_json::to_value(&o))
            .transpose()
            .map_err(|e| StoreError::InvalidObject {
                key,
                message: e.to_string(),
            })
    }

    async fn create(&self, kind: ResourceKind, object: Value) -> Result<(), StoreError> {
        let name = object
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let key = kind.key(&name);

        let obj: DynamicObject =
            serde_json::from_value(object).map_err(|e| StoreError::InvalidObject {
                key: key.clone(),
                message: e.to_string(),
            })?;

        self.api(&kind.api_resource())
            .create(&PostParams::default(), &obj)
            .await
            .map_err(|e| classify(e, &key))?;
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), StoreError> {
        let key = kind.key(name);
        self.api(&kind.api_resource())
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| classify(e, &key))?;
        Ok(())
    }
}

/// Map a kube error onto the store taxonomy
pub(crate) fn classify(err: kube::Error, key: &str) -> StoreError {
    match err {
        kube::Error::Api(resp) if resp.code == 409 => StoreError::AlreadyExists(key.to_string()),
        kube::Error::Api(resp) if resp.code == 404 => StoreError::NotFound(key.to_string()),
        other => StoreError::Api {
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}
