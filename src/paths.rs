//! Path resolution for stmtctl
//!
//! # Environment Variables
//!
//! - `STMTCTL_CONFIG_DIR` - Override config directory
//! - `STMTCTL_STATE_DIR` - Override state directory (stored objects)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `STMTCTL_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/stmtctl` (if set)
//! 3. `~/.config/stmtctl`
//!
//! For state_dir():
//! 1. `STMTCTL_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/stmtctl` (if set)
//! 3. `~/.local/state/stmtctl`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "STMTCTL_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "STMTCTL_STATE_DIR";

const APP: &str = "stmtctl";

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "stmtctl.toml";

/// Get the stmtctl config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve(ENV_CONFIG_DIR, "XDG_CONFIG_HOME", &[".config"])
}

/// Get the stmtctl state directory path
pub fn state_dir() -> Result<PathBuf> {
    resolve(ENV_STATE_DIR, "XDG_STATE_HOME", &[".local", "state"])
}

/// Path of the settings file
pub fn settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

fn resolve(override_var: &str, xdg_var: &str, home_default: &[&str]) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(override_var) {
        let path = expand_path(&dir);
        log::debug!("Using {} from environment: {}", override_var, path.display());
        return Ok(path);
    }

    if let Ok(xdg) = std::env::var(xdg_var) {
        if !xdg.is_empty() {
            let path = PathBuf::from(xdg).join(APP);
            log::debug!("Using {}: {}", xdg_var, path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home_default
        .iter()
        .fold(home, |acc, part| acc.join(part))
        .join(APP);
    log::debug!("Using default directory: {}", path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
    PathBuf::from(expanded)
}

/// Format a path for display, replacing the home directory with `~`
pub fn display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}
