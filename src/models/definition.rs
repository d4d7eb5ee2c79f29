//! Resource definitions
//!
//! A `Definition` object carries exactly one embedded manifest, stored under a
//! field named after its kind (`pod`, `job`, `replicaset`, ...), plus a flat
//! `meta` map. Parsing validates the "exactly one kind" rule up front and
//! produces a typed [`DefinitionBody`] so nothing downstream has to inspect
//! empty fields.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, PersistentVolumeClaim, Pod, Secret, Service, ServiceAccount,
};
use serde_json::Value;

use super::ResourceKind;

/// Free-form string configuration attached to definitions and dependencies
pub type Meta = BTreeMap<String, String>;

/// Errors raised while parsing a `Definition` object
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("definition {definition} does not embed any known resource kind")]
    NoKind { definition: String },

    #[error("definition {definition} embeds more than one resource kind: {kinds}")]
    MultipleKinds { definition: String, kinds: String },

    #[error("definition {definition} has a malformed {kind} manifest: {source}")]
    Malformed {
        definition: String,
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("definition {definition}: embedded {kind} has no metadata.name")]
    MissingName {
        definition: String,
        kind: ResourceKind,
    },
}

/// Implemented by every manifest type a definition can carry
pub trait DefinedKind: Sized {
    const KIND: ResourceKind;

    /// Borrow this kind's manifest out of a body, if the body holds this kind
    fn from_body(body: &DefinitionBody) -> Option<&Self>;
}

macro_rules! definition_kinds {
    ($($variant:ident),* $(,)?) => {
        /// The single manifest embedded in a definition
        #[derive(Debug, Clone, PartialEq)]
        pub enum DefinitionBody {
            $($variant(Box<$variant>),)*
        }

        impl DefinitionBody {
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(DefinitionBody::$variant(_) => ResourceKind::$variant,)*
                }
            }

            /// `metadata.name` of the embedded manifest
            pub fn object_name(&self) -> Option<&str> {
                match self {
                    $(DefinitionBody::$variant(obj) => obj.metadata.name.as_deref(),)*
                }
            }

            fn decode(kind: ResourceKind, value: Value) -> Result<Self, serde_json::Error> {
                match kind {
                    $(ResourceKind::$variant => {
                        Ok(DefinitionBody::$variant(Box::new(serde_json::from_value(value)?)))
                    })*
                }
            }
        }

        $(
            impl DefinedKind for $variant {
                const KIND: ResourceKind = ResourceKind::$variant;

                fn from_body(body: &DefinitionBody) -> Option<&Self> {
                    match body {
                        DefinitionBody::$variant(obj) => Some(obj),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl From<$variant> for DefinitionBody {
                fn from(obj: $variant) -> Self {
                    DefinitionBody::$variant(Box::new(obj))
                }
            }
        )*
    };
}

definition_kinds!(
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
);

/// A parsed `Definition` object
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    /// Name of the `Definition` object itself
    pub name: String,
    pub meta: Meta,
    pub body: DefinitionBody,
}

impl ResourceDefinition {
    pub fn new(name: impl Into<String>, body: impl Into<DefinitionBody>) -> Self {
        Self {
            name: name.into(),
            meta: Meta::new(),
            body: body.into(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: &str) -> Self {
        self.meta.insert(key.to_string(), value.to_string());
        self
    }

    /// Parse a `Definition` object as returned by the cluster
    pub fn from_value(value: &Value) -> Result<Self, DefinitionError> {
        let name = value
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();

        let populated: Vec<(ResourceKind, &Value)> = ResourceKind::all()
            .iter()
            .filter_map(|kind| {
                value
                    .get(kind.as_str())
                    .filter(|v| !v.is_null())
                    .map(|v| (*kind, v))
            })
            .collect();

        let (kind, manifest) = match populated.as_slice() {
            [] => return Err(DefinitionError::NoKind { definition: name }),
            [single] => *single,
            many => {
                let kinds = many
                    .iter()
                    .map(|(k, _)| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(DefinitionError::MultipleKinds {
                    definition: name,
                    kinds,
                });
            }
        };

        let body = DefinitionBody::decode(kind, manifest.clone()).map_err(|source| {
            DefinitionError::Malformed {
                definition: name.clone(),
                kind,
                source,
            }
        })?;

        if body.object_name().is_none_or(str::is_empty) {
            return Err(DefinitionError::MissingName {
                definition: name,
                kind,
            });
        }

        Ok(Self {
            meta: parse_meta(value.get("meta")),
            name,
            body,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.body.kind()
    }

    /// Name of the embedded manifest; validated non-empty at parse time
    pub fn resource_name(&self) -> &str {
        self.body.object_name().unwrap_or_default()
    }

    /// Graph key of the resource this definition describes
    pub fn key(&self) -> String {
        self.kind().key(self.resource_name())
    }
}

/// Flatten a JSON object into string metadata
///
/// Scalars are stringified so `success_factor: 50` and `success_factor: "50"`
/// mean the same thing. Nested values are ignored.
pub fn parse_meta(value: Option<&Value>) -> Meta {
    let Some(Value::Object(map)) = value else {
        return Meta::new();
    };

    map.iter()
        .filter_map(|(k, v)| {
            let s = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k.clone(), s))
        })
        .collect()
}
