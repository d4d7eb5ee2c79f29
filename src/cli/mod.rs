//! CLI command handling module
//!
//! Handles all CLI subcommands and argument parsing.

mod commands;
mod logging;
mod version;

pub use commands::{ConfigSubcommand, SchedulerArgs, Session, handle_config_command};
pub use logging::init_logging;
pub use version::display_version;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::{Config, ConfigLoader};

/// Deploy interdependent Kubernetes resources in dependency order
#[derive(Parser, Debug)]
#[command(name = "appcontroller")]
#[command(about = "Deploy interdependent Kubernetes resources in dependency order", long_about = None)]
pub struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Namespace to work in (overrides config)
    #[arg(long, short = 'n', global = true)]
    pub namespace: Option<String>,

    /// API server URL (overrides config and KUBERNETES_CLUSTER_URL)
    #[arg(long, global = true)]
    pub cluster_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register the Definition and Dependency custom resources
    Bootstrap,
    /// Create every defined resource in dependency order
    Deploy {
        /// Only use definitions and dependencies matching this label selector
        #[arg(long, short = 'l')]
        selector: Option<String>,
        /// Always print the dependency report
        #[arg(long)]
        report: bool,
        #[command(flatten)]
        scheduler: SchedulerArgs,
    },
    /// Show the status of the deployment
    GetStatus {
        /// Only use definitions and dependencies matching this label selector
        #[arg(long, short = 'l')]
        selector: Option<String>,
        /// Print JSON
        #[arg(long, short = 'j')]
        json: bool,
        /// Include the dependency report
        #[arg(long, short = 'r')]
        report: bool,
    },
    /// Show the report of one resource, e.g. `replicaset/frontend`
    ObjectStatus {
        key: String,
        /// Print JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
    /// Delete one resource, e.g. `pod/migrate`
    Delete { key: String },
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Show version information
    Version,
}

impl Args {
    /// Effective configuration: file and environment, then flags
    fn config(&self) -> Result<Config> {
        let mut config = ConfigLoader::load().context("Failed to load configuration")?;
        if let Some(namespace) = &self.namespace {
            config.namespace = Some(namespace.clone());
        }
        if let Some(url) = &self.cluster_url {
            config.cluster_url = Some(url.clone());
        }
        Ok(config)
    }
}

/// Dispatch a parsed command line
pub async fn run(args: Args) -> Result<ExitCode> {
    match &args.command {
        Command::Version => {
            display_version();
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { subcommand } => handle_config_command(subcommand),
        Command::Bootstrap => commands::handle_bootstrap(&args.config()?).await,
        Command::Deploy {
            selector,
            report,
            scheduler,
        } => {
            let config = args.config()?;
            let selector = selector.as_deref().unwrap_or(&config.selector);
            commands::handle_deploy(&config, selector, scheduler, *report).await
        }
        Command::GetStatus {
            selector,
            json,
            report,
        } => {
            let config = args.config()?;
            let selector = selector.as_deref().unwrap_or(&config.selector);
            commands::handle_get_status(&config, selector, *json, *report).await
        }
        Command::ObjectStatus { key, json } => {
            commands::handle_object_status(&args.config()?, key, *json).await
        }
        Command::Delete { key } => commands::handle_delete(&args.config()?, key).await,
    }
}
