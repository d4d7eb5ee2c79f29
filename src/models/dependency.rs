//! Dependency records and the edge metadata convention
//!
//! A `Dependency` object says that `child` must wait for `parent`. Both ends
//! are `<kind>/<name>` references. The `meta` map is flat; the keys below are
//! the only ones the scheduler reads, everything else is ignored.

use std::time::Duration;

use serde_json::Value;

use super::definition::{Meta, parse_meta};

/// Readiness percentage the dependency has to reach
pub const SUCCESS_FACTOR: &str = "success_factor";
/// Whether the dependent waits for the dependency at all
pub const BLOCKS: &str = "blocks";
/// `ignore` lets the dependent proceed (with a warning) when the dependency fails
pub const ON_ERROR: &str = "on_error";
/// Per-edge readiness timeout in seconds
pub const TIMEOUT: &str = "timeout";

const DEFAULT_SUCCESS_FACTOR: u8 = 100;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MetaError {
    #[error("invalid success_factor {0:?}: expected an integer between 0 and 100")]
    InvalidSuccessFactor(String),
}

/// A parsed `Dependency` object
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub name: String,
    /// The resource that has to become ready first
    pub parent: String,
    /// The resource that waits
    pub child: String,
    pub meta: Meta,
}

#[derive(Debug, thiserror::Error)]
#[error("dependency {name} is missing the {field} field")]
pub struct DependencyParseError {
    pub name: String,
    pub field: &'static str,
}

impl Dependency {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        let parent = parent.into();
        let child = child.into();
        Self {
            name: format!("{}-{}", parent.replace('/', "-"), child.replace('/', "-")),
            parent,
            child,
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: &str) -> Self {
        self.meta.insert(key.to_string(), value.to_string());
        self
    }

    pub fn from_value(value: &Value) -> Result<Self, DependencyParseError> {
        let name = value
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();

        let field = |field: &'static str| {
            value
                .get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| DependencyParseError {
                    name: name.clone(),
                    field,
                })
        };

        Ok(Self {
            parent: field("parent")?,
            child: field("child")?,
            meta: parse_meta(value.get("meta")),
            name,
        })
    }
}

/// Required readiness percentage; absent or empty means 100
pub fn success_factor(meta: &Meta) -> Result<u8, MetaError> {
    let Some(raw) = meta.get(SUCCESS_FACTOR).map(|s| s.trim()) else {
        return Ok(DEFAULT_SUCCESS_FACTOR);
    };
    if raw.is_empty() {
        return Ok(DEFAULT_SUCCESS_FACTOR);
    }
    match raw.parse::<u8>() {
        Ok(v) if v <= 100 => Ok(v),
        _ => Err(MetaError::InvalidSuccessFactor(raw.to_string())),
    }
}

/// Blocking unless explicitly set to `false`
pub fn blocks(meta: &Meta) -> bool {
    meta.get(BLOCKS)
        .and_then(|v| v.trim().parse::<bool>().ok())
        .unwrap_or(true)
}

pub fn tolerates_errors(meta: &Meta) -> bool {
    meta.get(ON_ERROR)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("ignore"))
}

pub fn timeout(meta: &Meta) -> Option<Duration> {
    meta.get(TIMEOUT)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
