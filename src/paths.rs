//! Path resolution for sentryctl
//!
//! # Environment Variables
//!
//! - `SENTRYCTL_STATE_DIR` - Override the state directory
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `SENTRYCTL_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/sentryctl` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\sentryctl`
//!    - macOS/Linux: `~/.local/state/sentryctl`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "SENTRYCTL_STATE_DIR";

/// File name of the state file inside the state directory
pub const STATE_FILE: &str = "state.toml";

/// Get the sentryctl state directory path
pub fn state_dir() -> Result<PathBuf> {
    state_dir_with(|name| std::env::var(name).ok())
}

/// [`state_dir`] with environment lookups going through `env`.
pub fn state_dir_with<E>(env: E) -> Result<PathBuf>
where
    E: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env(ENV_STATE_DIR).filter(|d| !d.is_empty()) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Some(xdg_state) = env("XDG_STATE_HOME").filter(|d| !d.is_empty()) {
        let path = PathBuf::from(xdg_state).join("sentryctl");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join("sentryctl");
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join("sentryctl");
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Default state file location
pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join(STATE_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
