//! CLI command handlers

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cluster::{self, ClusterStore, KubeStore};
use crate::config::{Config, ConfigLoader, get_config_value, paths};
use crate::report::{DependencyReport, DeploymentReport};
use crate::resources::Registry;
use crate::scheduler::{
    DependencyGraph, GraphStatus, Scheduler, SchedulerConfig, build_dependency_graph,
    ensure_acyclic, get_status, report_for,
};

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Show configuration file path
    Path,
    /// Show the effective configuration, or a single value
    Show {
        /// Configuration key (e.g., "namespace", "scheduler.timeoutSeconds")
        key: Option<String>,
    },
    /// Validate configuration
    Validate,
}

/// Scheduler flags shared by commands that deploy
#[derive(clap::Args, Debug, Default)]
pub struct SchedulerArgs {
    /// Seconds between readiness checks
    #[arg(long)]
    pub poll_interval: Option<u64>,
    /// Seconds to wait for each resource
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Maximum simultaneous creates (0 for no limit)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl SchedulerArgs {
    fn apply(&self, base: SchedulerConfig) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self
                .poll_interval
                .map(Duration::from_secs)
                .unwrap_or(base.poll_interval),
            timeout: self.timeout.map(Duration::from_secs).unwrap_or(base.timeout),
            concurrency: self.concurrency.unwrap_or(base.concurrency),
        }
    }
}

/// Connection to one namespace of one cluster
pub struct Session {
    store: Arc<dyn ClusterStore>,
    registry: Registry,
    namespace: String,
}

impl Session {
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = cluster::create_client(config.cluster_url.as_deref()).await?;
        let namespace = cluster::resolve_namespace(config.namespace.as_deref(), &client);
        tracing::debug!("Using namespace {}", namespace);

        Ok(Self {
            store: Arc::new(KubeStore::new(client, namespace.clone())),
            registry: Registry::new(),
            namespace,
        })
    }

    async fn graph(&self, selector: &str) -> Result<DependencyGraph> {
        build_dependency_graph(self.store.clone(), &self.registry, selector)
            .await
            .with_context(|| {
                format!(
                    "Failed to build dependency graph in namespace {}",
                    self.namespace
                )
            })
    }
}

fn exit_code(ready: bool) -> ExitCode {
    if ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_report(report: &DeploymentReport) {
    for line in report.as_text(0) {
        println!("{}", line);
    }
}

/// Register the custom resources
pub async fn handle_bootstrap(config: &Config) -> Result<ExitCode> {
    let client = cluster::create_client(config.cluster_url.as_deref()).await?;
    let outcomes = cluster::bootstrap::bootstrap(&client)
        .await
        .context("Bootstrap failed")?;
    for outcome in outcomes {
        match outcome {
            cluster::bootstrap::BootstrapOutcome::Created(name) => println!("created {}", name),
            cluster::bootstrap::BootstrapOutcome::AlreadyExists(name) => {
                println!("{} already exists", name)
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Build, check and run the dependency graph
pub async fn handle_deploy(
    config: &Config,
    selector: &str,
    flags: &SchedulerArgs,
    show_report: bool,
) -> Result<ExitCode> {
    let session = Session::connect(config).await?;
    let graph = session.graph(selector).await?;
    let scheduler_config = flags.apply(config.scheduler.to_scheduler_config());
    tracing::debug!("Scheduler settings: {:?}", scheduler_config);

    let scheduler = Scheduler::new(graph, scheduler_config).context("Refusing to deploy")?;
    let status = scheduler.run().await;
    let (_, report) = get_status(scheduler.graph()).await;

    println!("deployment status: {}", status);
    if show_report || !status.is_ready() {
        print_report(&report);
    }
    Ok(exit_code(status.is_ready()))
}

/// Print the status of the whole deployment
pub async fn handle_get_status(
    config: &Config,
    selector: &str,
    json: bool,
    show_report: bool,
) -> Result<ExitCode> {
    let session = Session::connect(config).await?;
    let graph = session.graph(selector).await?;
    let (status, report) = get_status(&graph).await;

    if json {
        let mut out = serde_json::json!({ "status": status });
        if show_report {
            out["report"] = serde_json::to_value(&report).context("Failed to serialize report")?;
        }
        println!("{}", out);
    } else {
        println!("deployment status: {}", status);
        if show_report {
            print_report(&report);
        }
    }
    Ok(exit_code(status == GraphStatus::Ready))
}

/// Print the report of a single resource and everything it depends on
pub async fn handle_object_status(config: &Config, key: &str, json: bool) -> Result<ExitCode> {
    let session = Session::connect(config).await?;
    let graph = session.graph(&config.selector).await?;
    let report = object_report(&graph, key).await?;

    if json {
        println!("{}", report.as_json().context("Failed to serialize report")?);
    } else {
        for line in report.as_text(0) {
            println!("{}", line);
        }
    }
    Ok(exit_code(!report.any_blocking()))
}

/// Report for one vertex; a cyclic graph is refused with its cycle paths
async fn object_report(graph: &DependencyGraph, key: &str) -> Result<DependencyReport> {
    ensure_acyclic(graph).context("Cannot report on a cyclic graph")?;
    report_for(graph, key)
        .await
        .with_context(|| format!("{} is not part of the deployment", key))
}

/// Delete a single object by `<kind>/<name>`
pub async fn handle_delete(config: &Config, key: &str) -> Result<ExitCode> {
    let session = Session::connect(config).await?;
    let (kind, name) = session.registry.parse_reference(key)?;
    let resource = session
        .registry
        .existing(kind, name, session.store.clone())?;
    resource
        .delete()
        .await
        .with_context(|| format!("Failed to delete {}", key))?;
    println!("deleted {}", key);
    Ok(ExitCode::SUCCESS)
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: &ConfigSubcommand) -> Result<ExitCode> {
    match cmd {
        ConfigSubcommand::Path => {
            println!("{}", paths::config_path().display());
        }
        ConfigSubcommand::Show { key } => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            if let Some(key) = key {
                println!("{}", get_config_value(&config, key)?);
            } else {
                let yaml =
                    serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
                print!("{}", yaml);
            }
        }
        ConfigSubcommand::Validate => match ConfigLoader::load() {
            Ok(_) => println!("Configuration is valid"),
            Err(e) => {
                eprintln!("Configuration validation failed: {:#}", e);
                return Ok(ExitCode::FAILURE);
            }
        },
    }
    Ok(ExitCode::SUCCESS)
}
