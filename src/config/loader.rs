//! Configuration loading and merging logic
//!
//! Precedence order (highest to lowest):
//! 1. Command line flags (applied by the CLI)
//! 2. Environment variable overrides
//! 3. Config file
//! 4. Built-in defaults

use super::{defaults, paths, schema::Config};
use anyhow::{Context, Result};
use std::path::Path;

pub const NAMESPACE_ENV: &str = "APPCONTROLLER_NAMESPACE";
pub const TIMEOUT_ENV: &str = "APPCONTROLLER_TIMEOUT";
pub const POLL_INTERVAL_ENV: &str = "APPCONTROLLER_POLL_INTERVAL";
pub const CONCURRENCY_ENV: &str = "APPCONTROLLER_CONCURRENCY";
pub const CLUSTER_URL_ENV: &str = "KUBERNETES_CLUSTER_URL";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// A missing config file is fine; an unreadable or invalid one is an error.
    pub fn load() -> Result<Config> {
        let mut config = Self::load_defaults();

        let path = paths::config_path();
        if path.exists() {
            config = Self::merge_config(config, Self::load_file(&path)?);
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
        }

        config = Self::apply_env_overrides(config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    /// Check values serde cannot rule out on its own
    pub fn validate(config: &Config) -> Result<()> {
        if config.scheduler.poll_interval_seconds == 0 {
            anyhow::bail!("scheduler.pollIntervalSeconds must be greater than 0");
        }
        if config.scheduler.timeout_seconds == 0 {
            anyhow::bail!("scheduler.timeoutSeconds must be greater than 0");
        }
        if let Some(url) = &config.cluster_url {
            url::Url::parse(url).with_context(|| format!("clusterUrl {:?} is not a valid URL", url))?;
        }
        Ok(())
    }

    /// Merge two configurations, with `other` taking precedence
    fn merge_config(base: Config, other: Config) -> Config {
        Config {
            namespace: other.namespace.or(base.namespace),
            selector: if other.selector.is_empty() {
                base.selector
            } else {
                other.selector
            },
            cluster_url: other.cluster_url.or(base.cluster_url),
            scheduler: other.scheduler,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable numbers are ignored with a warning.
    fn apply_env_overrides(mut config: Config) -> Config {
        if let Ok(namespace) = std::env::var(NAMESPACE_ENV) {
            config.namespace = Some(namespace);
        }

        if let Ok(url) = std::env::var(CLUSTER_URL_ENV) {
            config.cluster_url = Some(url);
        }

        if let Some(timeout) = env_number(TIMEOUT_ENV) {
            config.scheduler.timeout_seconds = timeout;
        }

        if let Some(interval) = env_number(POLL_INTERVAL_ENV) {
            config.scheduler.poll_interval_seconds = interval;
        }

        if let Some(concurrency) = env_number(CONCURRENCY_ENV) {
            config.scheduler.concurrency = concurrency;
        }

        config
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}
