//! Persisted identifiers
//!
//! The state file only remembers which remote object each manifest address
//! is bound to. Attributes are never stored; they are read fresh from
//! Sentry on every plan and apply.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Binding of one manifest address to a remote object
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tracked {
    /// Resource kind name, e.g. "team"
    pub kind: String,
    /// Encoded composite identifier
    pub id: String,
    /// Last time the binding was written
    pub updated_at: DateTime<Utc>,
}

/// Everything sentryctl tracks between runs
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StateFile {
    /// Bindings keyed by address ("team.core")
    #[serde(default)]
    pub resources: BTreeMap<String, Tracked>,

    /// Last time the state was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl StateFile {
    /// Load state from disk, or return an empty state if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!(
            "Loaded {} tracked resource(s) from {}",
            state.resources.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to disk, stamping `last_updated`
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Some(Utc::now());
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&Tracked> {
        self.resources.get(address)
    }

    /// Bind `address` to `id`, replacing any previous binding
    pub fn track(&mut self, address: &str, kind: &str, id: &str) {
        self.resources.insert(
            address.to_string(),
            Tracked {
                kind: kind.to_string(),
                id: id.to_string(),
                updated_at: Utc::now(),
            },
        );
    }

    /// Drop the binding for `address`
    pub fn forget(&mut self, address: &str) -> Option<Tracked> {
        self.resources.remove(address)
    }

    /// Bindings of one kind, in address order
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = (&'a str, &'a Tracked)> {
        self.resources
            .iter()
            .filter(move |(_, t)| t.kind == kind)
            .map(|(address, t)| (address.as_str(), t))
    }
}
