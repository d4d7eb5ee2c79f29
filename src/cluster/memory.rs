//! In-memory cluster store
//!
//! Thread-safe [`ClusterStore`] used by tests and for offline experiments.
//! Besides plain storage it can stamp a status onto freshly created objects,
//! inject create/read failures, and records the order objects were created in.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use super::store::{ClusterStore, StoreError};
use crate::models::ResourceKind;

#[derive(Default)]
struct Inner {
    objects: HashMap<String, Value>,
    definitions: Vec<Value>,
    dependencies: Vec<Value>,
    status_on_create: HashMap<ResourceKind, Value>,
    failing_creates: HashSet<String>,
    failing_reads: HashMap<String, usize>,
    created: Vec<(String, Instant)>,
    schemas_missing: bool,
}

/// Thread-safe in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put an object into the store as if it had been created out-of-band
    pub fn insert(&self, kind: ResourceKind, object: Value) {
        let name = object_name(&object);
        self.write().objects.insert(kind.key(&name), object);
    }

    /// Replace the `status` section of a stored object
    pub fn set_status(&self, kind: ResourceKind, name: &str, status: Value) {
        if let Some(obj) = self.write().objects.get_mut(&kind.key(name)) {
            obj["status"] = status;
        }
    }

    pub fn add_definition(&self, definition: Value) {
        self.write().definitions.push(definition);
    }

    pub fn add_dependency(&self, dependency: Value) {
        self.write().dependencies.push(dependency);
    }

    /// Objects of `kind` created through the store get this `status`
    pub fn status_on_create(&self, kind: ResourceKind, status: Value) {
        self.write().status_on_create.insert(kind, status);
    }

    /// Every create of `key` fails with an API error
    pub fn fail_create(&self, key: &str) {
        self.write().failing_creates.insert(key.to_string());
    }

    /// The next `times` reads of `key` fail with an API error
    pub fn fail_reads(&self, key: &str, times: usize) {
        self.write().failing_reads.insert(key.to_string(), times);
    }

    /// Simulate a cluster where the custom resources were never registered
    pub fn without_schemas(&self) {
        self.write().schemas_missing = true;
    }

    pub fn object(&self, kind: ResourceKind, name: &str) -> Option<Value> {
        self.read().objects.get(&kind.key(name)).cloned()
    }

    /// Keys of objects created through the store, in creation order
    pub fn created(&self) -> Vec<String> {
        self.read().created.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn created_at(&self, key: &str) -> Option<Instant> {
        self.read()
            .created
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, at)| *at)
    }

    fn list(&self, items: &[Value], selector: &str, plural: &str) -> Result<Vec<Value>, StoreError> {
        if self.read().schemas_missing {
            return Err(StoreError::SchemaMissing(format!(
                "{}.{}",
                plural,
                super::API_GROUP
            )));
        }
        Ok(items
            .iter()
            .filter(|item| selector_matches(selector, item))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn list_definitions(&self, selector: &str) -> Result<Vec<Value>, StoreError> {
        let items = self.read().definitions.clone();
        self.list(&items, selector, "definitions")
    }

    async fn list_dependencies(&self, selector: &str) -> Result<Vec<Value>, StoreError> {
        let items = self.read().dependencies.clone();
        self.list(&items, selector, "dependencies")
    }

    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Option<Value>, StoreError> {
        let key = kind.key(name);
        let mut inner = self.write();
        if let Some(remaining) = inner.failing_reads.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Api {
                    key,
                    message: "injected read failure".to_string(),
                });
            }
        }
        Ok(inner.objects.get(&key).cloned())
    }

    async fn create(&self, kind: ResourceKind, mut object: Value) -> Result<(), StoreError> {
        let key = kind.key(&object_name(&object));
        let mut inner = self.write();

        if inner.failing_creates.contains(&key) {
            return Err(StoreError::Api {
                key,
                message: "injected create failure".to_string(),
            });
        }
        if inner.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }

        if let Some(status) = inner.status_on_create.get(&kind) {
            object["status"] = status.clone();
        }
        inner.created.push((key.clone(), Instant::now()));
        inner.objects.insert(key, object);
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), StoreError> {
        let key = kind.key(name);
        match self.write().objects.remove(&key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key)),
        }
    }
}

fn object_name(object: &Value) -> String {
    object
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Equality-based label selector: `a=b,c!=d`
fn selector_matches(selector: &str, object: &Value) -> bool {
    let labels = object.pointer("/metadata/labels");
    let label = |k: &str| labels.and_then(|l| l.get(k)).and_then(Value::as_str);

    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((k, v)) = term.split_once("!=") {
                label(k.trim()) != Some(v.trim())
            } else if let Some((k, v)) = term.split_once('=') {
                let v = v.trim_start_matches('=');
                label(k.trim()) == Some(v.trim())
            } else {
                label(term).is_some()
            }
        })
}
