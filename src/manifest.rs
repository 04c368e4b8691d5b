//! Manifest loading
//!
//! A manifest declares resources as TOML tables keyed by kind, then by a
//! local name. The pair forms the address used in plans and in the state
//! file:
//!
//! ```toml
//! [team.core]
//! organization = "acme"
//! name = "core-team"
//! ```
//!
//! is the instance `team.core`. Tokens never go in a manifest.

use anyhow::{Context, Result, bail};
use sentry_provider::{
    CodeMappingState, DashboardState, MemberState, MetricAlertState, OrganizationState,
    PluginState, ProjectState, RepositoryState, TeamState,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::kinds::ResourceType;

/// Connection settings that may live next to the resources
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    /// API base URL ending in `/api/`
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub organization: BTreeMap<String, OrganizationState>,
    #[serde(default)]
    pub team: BTreeMap<String, TeamState>,
    #[serde(default)]
    pub project: BTreeMap<String, ProjectState>,
    #[serde(default)]
    pub member: BTreeMap<String, MemberState>,
    #[serde(default)]
    pub repository_github: BTreeMap<String, RepositoryState>,
    #[serde(default)]
    pub code_mapping: BTreeMap<String, CodeMappingState>,
    #[serde(default)]
    pub dashboard: BTreeMap<String, DashboardState>,
    #[serde(default)]
    pub metric_alert: BTreeMap<String, MetricAlertState>,
    #[serde(default)]
    pub plugin: BTreeMap<String, PluginState>,
}

impl Manifest {
    /// Load and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Local names declared for `kind`, sorted
    pub fn names(&self, kind: ResourceType) -> Vec<&str> {
        fn keys<S>(map: &BTreeMap<String, S>) -> Vec<&str> {
            map.keys().map(String::as_str).collect()
        }

        match kind {
            ResourceType::Organization => keys(&self.organization),
            ResourceType::Team => keys(&self.team),
            ResourceType::Project => keys(&self.project),
            ResourceType::Member => keys(&self.member),
            ResourceType::RepositoryGithub => keys(&self.repository_github),
            ResourceType::CodeMapping => keys(&self.code_mapping),
            ResourceType::Dashboard => keys(&self.dashboard),
            ResourceType::MetricAlert => keys(&self.metric_alert),
            ResourceType::Plugin => keys(&self.plugin),
        }
    }

    /// Number of declared instances across all kinds
    pub fn count(&self) -> usize {
        ResourceType::ALL
            .iter()
            .map(|kind| self.names(*kind).len())
            .sum()
    }

    fn validate(&self) -> Result<()> {
        for kind in ResourceType::ALL {
            for name in self.names(kind) {
                if name.is_empty() || name.contains('.') {
                    bail!("{kind} name {name:?} must be non-empty and must not contain '.'");
                }
            }
        }
        Ok(())
    }
}
