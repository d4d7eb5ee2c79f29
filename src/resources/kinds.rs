//! Concrete resources
//!
//! [`Managed`] wraps a manifest taken from a definition and creates it.
//! [`Existing`] wraps only a name and refers to an object created out-of-band.
//! Both are generic over the kind, so readiness logic is written once per kind
//! in [`super::readiness`] and shared by both variants.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use super::readiness::{Evaluation, Readiness, evaluate};
use super::{ReadinessState, Resource, ResourceError};
use crate::cluster::{ClusterStore, StoreError};
use crate::models::dependency::success_factor;
use crate::models::{Meta, ResourceKind};
use crate::report::DependencyReport;

/// Fetch the live object and score it against the factor in `meta`
async fn evaluate_live<K: Readiness>(
    store: &dyn ClusterStore,
    name: &str,
    meta: &Meta,
) -> Result<Evaluation, ResourceError> {
    let key = K::KIND.key(name);
    // A bad threshold is reported before touching the cluster
    let factor = success_factor(meta).map_err(|source| ResourceError::Threshold {
        key: key.clone(),
        source,
    })?;

    let value = store
        .get(K::KIND, name)
        .await?
        .ok_or_else(|| ResourceError::NotFound(key.clone()))?;
    let object: K = serde_json::from_value(value).map_err(|e| ResourceError::Decode {
        key: key.clone(),
        message: e.to_string(),
    })?;

    evaluate(object.observe(), factor).map_err(|message| ResourceError::Failed { key, message })
}

async fn live_status<K: Readiness>(
    store: &dyn ClusterStore,
    name: &str,
    meta: &Meta,
) -> Result<ReadinessState, ResourceError> {
    let eval = evaluate_live::<K>(store, name, meta).await?;
    tracing::debug!(
        "{} is {}% ready (needed {}%)",
        K::KIND.key(name),
        eval.percentage,
        eval.needed
    );
    Ok(if eval.is_ready() {
        ReadinessState::Ready
    } else {
        ReadinessState::NotReady
    })
}

async fn live_report<K: Readiness>(
    store: &dyn ClusterStore,
    name: &str,
    meta: &Meta,
) -> DependencyReport {
    let key = K::KIND.key(name);
    match evaluate_live::<K>(store, name, meta).await {
        Ok(eval) => DependencyReport::new(key, eval.percentage, eval.needed, eval.message),
        Err(e) => DependencyReport::error(key, e),
    }
}

async fn delete_object(
    store: &dyn ClusterStore,
    kind: ResourceKind,
    name: &str,
) -> Result<(), ResourceError> {
    match store.delete(kind, name).await {
        Ok(()) => {
            tracing::info!("Deleted {}", kind.key(name));
            Ok(())
        }
        Err(StoreError::NotFound(key)) => Err(ResourceError::NotFound(key)),
        Err(e) => Err(e.into()),
    }
}

/// A resource created from a definition's manifest
pub struct Managed<K: Readiness> {
    name: String,
    object: K,
    meta: Meta,
    store: Arc<dyn ClusterStore>,
}

impl<K: Readiness> Managed<K> {
    pub fn new(name: impl Into<String>, object: K, meta: Meta, store: Arc<dyn ClusterStore>) -> Self {
        Self {
            name: name.into(),
            object,
            meta,
            store,
        }
    }
}

impl<K: Readiness> fmt::Debug for Managed<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managed")
            .field("key", &self.key())
            .field("meta", &self.meta)
            .finish()
    }
}

#[async_trait]
impl<K: Readiness> Resource for Managed<K> {
    fn kind(&self) -> ResourceKind {
        K::KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn is_existing(&self) -> bool {
        false
    }

    async fn create(&self) -> Result<(), ResourceError> {
        let key = self.key();
        if self.store.get(K::KIND, &self.name).await?.is_some() {
            tracing::info!("{} already exists, not creating", key);
            return Ok(());
        }

        let manifest = serde_json::to_value(&self.object).map_err(|e| ResourceError::Decode {
            key: key.clone(),
            message: e.to_string(),
        })?;

        match self.store.create(K::KIND, manifest).await {
            Ok(()) => {
                tracing::info!("Created {}", key);
                Ok(())
            }
            // Lost a race with someone else creating the same object
            Err(StoreError::AlreadyExists(_)) => {
                tracing::info!("{} already exists, not creating", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self) -> Result<(), ResourceError> {
        delete_object(self.store.as_ref(), K::KIND, &self.name).await
    }

    async fn status(&self, meta: &Meta) -> Result<ReadinessState, ResourceError> {
        live_status::<K>(self.store.as_ref(), &self.name, meta).await
    }

    async fn dependency_report(&self, meta: &Meta) -> DependencyReport {
        live_report::<K>(self.store.as_ref(), &self.name, meta).await
    }
}

/// A reference to an object that was created out-of-band
pub struct Existing<K: Readiness> {
    name: String,
    meta: Meta,
    store: Arc<dyn ClusterStore>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Readiness> Existing<K> {
    pub fn new(name: impl Into<String>, store: Arc<dyn ClusterStore>) -> Self {
        Self {
            name: name.into(),
            meta: Meta::new(),
            store,
            _kind: PhantomData,
        }
    }
}

impl<K: Readiness> fmt::Debug for Existing<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Existing")
            .field("key", &self.key())
            .finish()
    }
}

#[async_trait]
impl<K: Readiness> Resource for Existing<K> {
    fn kind(&self) -> ResourceKind {
        K::KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn is_existing(&self) -> bool {
        true
    }

    async fn create(&self) -> Result<(), ResourceError> {
        match self.store.get(K::KIND, &self.name).await? {
            Some(_) => {
                tracing::debug!("Found existing {}", self.key());
                Ok(())
            }
            None => Err(ResourceError::NotFound(self.key())),
        }
    }

    async fn delete(&self) -> Result<(), ResourceError> {
        delete_object(self.store.as_ref(), K::KIND, &self.name).await
    }

    async fn status(&self, meta: &Meta) -> Result<ReadinessState, ResourceError> {
        live_status::<K>(self.store.as_ref(), &self.name, meta).await
    }

    async fn dependency_report(&self, meta: &Meta) -> DependencyReport {
        live_report::<K>(self.store.as_ref(), &self.name, meta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryStore;
    use crate::cluster::store::MockClusterStore;
    use crate::models::MetaError;
    use k8s_openapi::api::apps::v1::ReplicaSet;
    use k8s_openapi::api::core::v1::{ConfigMap, Pod};
    use serde_json::json;

    fn meta(factor: &str) -> Meta {
        Meta::from([("success_factor".to_string(), factor.to_string())])
    }

    fn replica_set_with(store: &MemoryStore, desired: i32, ready: i32) -> Existing<ReplicaSet> {
        store.insert(
            ResourceKind::ReplicaSet,
            json!({
                "apiVersion": "apps/v1",
                "kind": "ReplicaSet",
                "metadata": {"name": "frontend"},
                "spec": {"replicas": desired, "selector": {}},
                "status": {"replicas": desired, "readyReplicas": ready}
            }),
        );
        Existing::new("frontend", Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_success_factor_scales_replicas() {
        let store = MemoryStore::new();
        let rs = replica_set_with(&store, 10, 6);

        assert_eq!(rs.status(&meta("50")).await, Ok(ReadinessState::Ready));
        let report = rs.dependency_report(&meta("50")).await;
        assert_eq!((report.percentage, report.needed), (60, 50));
        assert!(!report.blocks);

        assert_eq!(rs.status(&meta("80")).await, Ok(ReadinessState::NotReady));
        assert!(rs.dependency_report(&meta("80")).await.blocks);
        assert_eq!(rs.status(&Meta::new()).await, Ok(ReadinessState::NotReady));
    }

    #[tokio::test]
    async fn test_malformed_success_factor_is_fatal() {
        let store = MemoryStore::new();
        let rs = replica_set_with(&store, 10, 10);

        let err = rs.status(&meta("lots")).await.unwrap_err();
        assert_eq!(
            err,
            ResourceError::Threshold {
                key: "replicaset/frontend".into(),
                source: MetaError::InvalidSuccessFactor("lots".into())
            }
        );
        assert!(err.is_fatal());
        assert!(rs.status(&meta("101")).await.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_double_create_is_idempotent() {
        let store = MemoryStore::new();
        let pod: Pod = serde_json::from_value(json!({"metadata": {"name": "web"}})).unwrap();
        let managed = Managed::new("web", pod, Meta::new(), Arc::new(store.clone()));

        managed.create().await.unwrap();
        managed.create().await.unwrap();
        assert_eq!(store.created(), vec!["pod/web".to_string()]);
    }

    #[tokio::test]
    async fn test_already_exists_reply_is_success() {
        let mut mock = MockClusterStore::new();
        mock.expect_get().returning(|_, _| Ok(None));
        mock.expect_create()
            .times(1)
            .returning(|kind, _| Err(StoreError::AlreadyExists(kind.key("cfg"))));

        let cm: ConfigMap = serde_json::from_value(json!({"metadata": {"name": "cfg"}})).unwrap();
        let managed = Managed::new("cfg", cm, Meta::new(), Arc::new(mock));
        assert_eq!(managed.create().await, Ok(()));
    }

    #[tokio::test]
    async fn test_create_error_propagates() {
        let mut mock = MockClusterStore::new();
        mock.expect_get().returning(|_, _| Ok(None));
        mock.expect_create().returning(|kind, _| {
            Err(StoreError::Api {
                key: kind.key("cfg"),
                message: "forbidden".into(),
            })
        });

        let cm: ConfigMap = serde_json::from_value(json!({"metadata": {"name": "cfg"}})).unwrap();
        let managed = Managed::new("cfg", cm, Meta::new(), Arc::new(mock));
        assert!(matches!(
            managed.create().await,
            Err(ResourceError::Store(StoreError::Api { .. }))
        ));
    }

    #[tokio::test]
    async fn test_existing_create_only_verifies() {
        let store = MemoryStore::new();
        let missing: Existing<ConfigMap> = Existing::new("absent", Arc::new(store.clone()));
        assert_eq!(
            missing.create().await,
            Err(ResourceError::NotFound("configmap/absent".into()))
        );

        store.insert(ResourceKind::ConfigMap, json!({"metadata": {"name": "present"}}));
        let present: Existing<ConfigMap> = Existing::new("present", Arc::new(store.clone()));
        present.create().await.unwrap();
        assert!(store.created().is_empty());
        assert!(present.is_existing());
    }

    #[tokio::test]
    async fn test_missing_object_is_transient() {
        let store = MemoryStore::new();
        let pod: Existing<Pod> = Existing::new("later", Arc::new(store));
        let err = pod.status(&Meta::new()).await.unwrap_err();
        assert!(!err.is_fatal());

        let report = pod.dependency_report(&Meta::new()).await;
        assert!(report.blocks);
        assert!(report.message.starts_with("error: "));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.insert(ResourceKind::ConfigMap, json!({"metadata": {"name": "cfg"}}));
        let cm: Existing<ConfigMap> = Existing::new("cfg", Arc::new(store.clone()));

        cm.delete().await.unwrap();
        assert!(store.object(ResourceKind::ConfigMap, "cfg").is_none());
        assert_eq!(
            cm.delete().await,
            Err(ResourceError::NotFound("configmap/cfg".into()))
        );
    }
}
