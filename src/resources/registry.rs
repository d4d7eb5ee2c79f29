//! Resource registry
//!
//! A table of per-kind factories. The graph builder asks the registry to turn a
//! definition into a [`Resource`], or to wrap a bare name as a reference to an
//! existing object. Kind dispatch happens here, once, at build time.
//!
//! To support a new kind:
//! 1. Add it to `ResourceKind` and the `definition_kinds!` list
//! 2. Implement `Readiness` for its manifest type
//! 3. Register it in [`Registry::new`]

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, PersistentVolumeClaim, Pod, Secret, Service, ServiceAccount,
};

use super::kinds::{Existing, Managed};
use super::readiness::Readiness;
use super::Resource;
use crate::cluster::ClusterStore;
use crate::models::{ResourceDefinition, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid resource reference {0:?}: expected <kind>/<name> with a known kind")]
    InvalidReference(String),

    #[error("no factory registered for kind {0}")]
    NotRegistered(ResourceKind),

    #[error("definition {definition} does not carry a {kind} manifest")]
    KindMismatch {
        definition: String,
        kind: ResourceKind,
    },
}

/// Per-kind construction capabilities
pub trait ResourceFactory: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Whether `def` describes the object called `name` of this kind
    fn name_matches(&self, def: &ResourceDefinition, name: &str) -> bool;

    /// Build a managed resource; `None` if `def` holds another kind
    fn new_resource(
        &self,
        def: &ResourceDefinition,
        store: Arc<dyn ClusterStore>,
    ) -> Option<Arc<dyn Resource>>;

    /// Build a reference to an object created out-of-band
    fn new_existing(&self, name: &str, store: Arc<dyn ClusterStore>) -> Arc<dyn Resource>;
}

/// The factory every [`Readiness`] kind gets for free
pub struct KindFactory<K>(PhantomData<fn() -> K>);

impl<K> Default for KindFactory<K> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<K: Readiness> ResourceFactory for KindFactory<K> {
    fn kind(&self) -> ResourceKind {
        K::KIND
    }

    fn name_matches(&self, def: &ResourceDefinition, name: &str) -> bool {
        def.kind() == K::KIND && def.resource_name() == name
    }

    fn new_resource(
        &self,
        def: &ResourceDefinition,
        store: Arc<dyn ClusterStore>,
    ) -> Option<Arc<dyn Resource>> {
        let object = K::from_body(&def.body)?;
        Some(Arc::new(Managed::new(
            def.resource_name(),
            object.clone(),
            def.meta.clone(),
            store,
        )))
    }

    fn new_existing(&self, name: &str, store: Arc<dyn ClusterStore>) -> Arc<dyn Resource> {
        Arc::new(Existing::<K>::new(name, store))
    }
}

/// Factory table keyed by kind
pub struct Registry {
    factories: BTreeMap<ResourceKind, Box<dyn ResourceFactory>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry with every supported kind
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register::<Pod>();
        registry.register::<Job>();
        registry.register::<ReplicaSet>();
        registry.register::<Deployment>();
        registry.register::<StatefulSet>();
        registry.register::<DaemonSet>();
        registry.register::<Service>();
        registry.register::<ConfigMap>();
        registry.register::<Secret>();
        registry.register::<PersistentVolumeClaim>();
        registry.register::<ServiceAccount>();
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register<K: Readiness>(&mut self) {
        self.register_factory(Box::new(KindFactory::<K>::default()));
    }

    pub fn register_factory(&mut self, factory: Box<dyn ResourceFactory>) {
        self.factories.insert(factory.kind(), factory);
    }

    pub fn factory(&self, kind: ResourceKind) -> Result<&dyn ResourceFactory, RegistryError> {
        self.factories
            .get(&kind)
            .map(|factory| factory.as_ref())
            .ok_or(RegistryError::NotRegistered(kind))
    }

    /// Registered kinds in a stable order
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.factories.keys().copied().collect()
    }

    /// Split a `<kind>/<name>` reference, rejecting unregistered kinds
    pub fn parse_reference<'a>(
        &self,
        reference: &'a str,
    ) -> Result<(ResourceKind, &'a str), RegistryError> {
        let (kind, name) = ResourceKind::split_key(reference)
            .ok_or_else(|| RegistryError::InvalidReference(reference.to_string()))?;
        self.factory(kind)?;
        Ok((kind, name))
    }

    /// Construct the managed resource a definition describes
    pub fn build(
        &self,
        def: &ResourceDefinition,
        store: Arc<dyn ClusterStore>,
    ) -> Result<Arc<dyn Resource>, RegistryError> {
        self.factory(def.kind())?
            .new_resource(def, store)
            .ok_or_else(|| RegistryError::KindMismatch {
                definition: def.name.clone(),
                kind: def.kind(),
            })
    }

    /// Find the definition describing `name` of `kind`, if any
    pub fn find_definition<'d>(
        &self,
        kind: ResourceKind,
        name: &str,
        definitions: &'d [ResourceDefinition],
    ) -> Result<Option<&'d ResourceDefinition>, RegistryError> {
        let factory = self.factory(kind)?;
        Ok(definitions.iter().find(|def| factory.name_matches(def, name)))
    }

    pub fn existing(
        &self,
        kind: ResourceKind,
        name: &str,
        store: Arc<dyn ClusterStore>,
    ) -> Result<Arc<dyn Resource>, RegistryError> {
        Ok(self.factory(kind)?.new_existing(name, store))
    }
}
