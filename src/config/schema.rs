//! Configuration schema definitions
//!
//! Defines the structure of the configuration file using serde for serialization.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scheduler::SchedulerConfig;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Namespace holding definitions, dependencies and the deployed objects;
    /// the client's default namespace when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Label selector applied when listing definitions and dependencies
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selector: String,

    /// API server URL; kubeconfig / in-cluster inference when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_url: Option<String>,

    /// Scheduler timing
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Seconds between readiness checks
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Seconds to wait for a resource before giving up
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum simultaneous creates, 0 for no limit
    #[serde(default)]
    pub concurrency: usize,
}

impl SchedulerSettings {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
            timeout: Duration::from_secs(self.timeout_seconds),
            concurrency: self.concurrency,
        }
    }
}

// Default value functions
fn default_poll_interval_seconds() -> u64 {
    crate::scheduler::executor::DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_timeout_seconds() -> u64 {
    crate::scheduler::executor::DEFAULT_TIMEOUT.as_secs()
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval_seconds(),
            timeout_seconds: default_timeout_seconds(),
            concurrency: 0,
        }
    }
}
