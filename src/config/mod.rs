//! Configuration system for appcontroller
//!
//! A single YAML file layered over built-in defaults, with environment
//! variable overrides on top.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{Config, SchedulerSettings};

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    match key {
        "namespace" => Ok(config.namespace.clone().unwrap_or_default()),
        "selector" => Ok(config.selector.clone()),
        "clusterUrl" => Ok(config.cluster_url.clone().unwrap_or_default()),
        "scheduler.pollIntervalSeconds" => Ok(config.scheduler.poll_interval_seconds.to_string()),
        "scheduler.timeoutSeconds" => Ok(config.scheduler.timeout_seconds.to_string()),
        "scheduler.concurrency" => Ok(config.scheduler.concurrency.to_string()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}
