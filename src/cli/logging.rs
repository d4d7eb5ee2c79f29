//! Logging initialization

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize logging
///
/// `RUST_LOG` wins when set. Otherwise this crate logs at `debug` with
/// `--debug` and at `info` without; everything else stays at `warn`. Logs go to
/// stderr so stdout stays clean for reports, or to `log_file` without colours.
pub fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,appcontroller={}", level)));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_writer(file)
                .with_env_filter(filter)
                .with_ansi(false) // No ANSI codes in log file
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .with_target(debug)
                .init();
        }
    }

    Ok(())
}
