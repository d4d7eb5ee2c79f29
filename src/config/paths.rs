//! Configuration path resolution
//!
//! `$APPCONTROLLER_CONFIG_DIR` wins. Otherwise the platform config home is
//! used: `$XDG_CONFIG_HOME` or `~/.config` on Unix, the roaming AppData
//! folder on Windows.

use std::ffi::OsString;
use std::path::PathBuf;

/// Directory name under the platform config home
const APP_DIR: &str = env!("CARGO_PKG_NAME");

const CONFIG_FILE: &str = "config.yaml";

pub const CONFIG_DIR_ENV: &str = "APPCONTROLLER_CONFIG_DIR";

pub fn config_dir() -> PathBuf {
    resolve_config_dir(std::env::var_os(CONFIG_DIR_ENV), platform_config_home())
}

pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// An explicit directory is used as is; a config home gets the app directory appended
fn resolve_config_dir(explicit: Option<OsString>, home: Option<PathBuf>) -> PathBuf {
    match explicit.filter(|dir| !dir.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => home.unwrap_or_else(|| PathBuf::from(".config")).join(APP_DIR),
    }
}

#[cfg(windows)]
fn platform_config_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(not(windows))]
fn platform_config_home() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".config")))
}
