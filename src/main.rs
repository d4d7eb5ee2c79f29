//! appcontroller - dependency-aware deployment of Kubernetes resources
//!
//! Reads `Definition` and `Dependency` objects from the cluster, builds the
//! dependency graph and creates every resource once what it depends on is
//! ready.

use clap::Parser;
use std::process::ExitCode;

use appcontroller::cli::{self, Args};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = cli::init_logging(args.debug, args.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    if args.debug {
        tracing::debug!("Debug logging enabled");
    }

    match cli::run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
