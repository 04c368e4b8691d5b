//! Legacy project plugins
//!
//! A plugin always exists on the remote; "creating" one enables it and
//! writes its configuration, "deleting" disables it. A disabled plugin is
//! reported as absent.

use super::fixed_fields;
use crate::client::SentryClient;
use crate::transport::Method;
use reconcile::{
    CallContext, Cursor, Gateway, Page, ProjectScopedKey, ResourceKind, Result, Translator,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginState {
    pub organization: String,
    pub project: String,
    /// Plugin id, e.g. "webhooks"
    pub plugin: String,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigField {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePlugin {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub config: Vec<ConfigField>,
}

/// Configuration values keyed by field name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PluginPayload(pub BTreeMap<String, Value>);

/// Where a plugin is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginTarget {
    pub organization: String,
    pub project: String,
    pub plugin: String,
}

pub struct PluginKind<'c> {
    client: &'c SentryClient,
}

impl<'c> PluginKind<'c> {
    pub fn new(client: &'c SentryClient) -> Self {
        Self { client }
    }

    fn plugin_url(&self, organization: &str, project: &str, plugin: &str) -> Result<url::Url> {
        self.client
            .url(&["projects", organization, project, "plugins", plugin])
    }
}

impl Gateway for PluginKind<'_> {
    type Key = ProjectScopedKey;
    type Parent = PluginTarget;
    type Remote = RemotePlugin;
    type Payload = PluginPayload;

    fn fetch(&self, ctx: &CallContext, key: &ProjectScopedKey) -> Result<Option<RemotePlugin>> {
        let url = self.plugin_url(&key.organization, &key.project, &key.key)?;
        let plugin: Option<RemotePlugin> = self.client.get(ctx, &url)?;
        Ok(plugin.filter(|p| p.enabled))
    }

    /// Every plugin available to the project, enabled or not.
    fn list(
        &self,
        ctx: &CallContext,
        parent: &PluginTarget,
        cursor: Option<&Cursor>,
    ) -> Result<Page<RemotePlugin>> {
        let url = self
            .client
            .url(&["projects", &parent.organization, &parent.project, "plugins"])?;
        self.client.list_page(ctx, &url, cursor)
    }

    fn create(
        &self,
        ctx: &CallContext,
        parent: &PluginTarget,
        payload: &PluginPayload,
    ) -> Result<RemotePlugin> {
        let url = self.plugin_url(&parent.organization, &parent.project, &parent.plugin)?;
        self.client.send(ctx, Method::Post, &url, None)?;

        // Once enabled the plugin must be tracked even if its configuration
        // was rejected; the next plan reports the configuration as drift.
        match self.client.put(ctx, &url, payload) {
            Ok(configured) => Ok(configured),
            Err(e) => {
                let enabled: Option<RemotePlugin> = self.client.get(ctx, &url)?;
                match enabled.filter(|p| p.enabled) {
                    Some(plugin) => {
                        log::warn!(
                            "plugin {} was enabled on {}/{} but not configured: {e}",
                            parent.plugin,
                            parent.organization,
                            parent.project
                        );
                        Ok(plugin)
                    }
                    None => Err(e),
                }
            }
        }
    }

    fn update(
        &self,
        ctx: &CallContext,
        key: &ProjectScopedKey,
        payload: &PluginPayload,
    ) -> Result<RemotePlugin> {
        let url = self.plugin_url(&key.organization, &key.project, &key.key)?;
        self.client.put(ctx, &url, payload)
    }

    fn delete(&self, ctx: &CallContext, key: &ProjectScopedKey) -> Result<()> {
        let url = self.plugin_url(&key.organization, &key.project, &key.key)?;
        self.client.delete(ctx, &url)
    }
}

impl Translator for PluginKind<'_> {
    type State = PluginState;

    fn to_payload(state: &PluginState) -> PluginPayload {
        PluginPayload(state.config.clone())
    }

    fn from_remote(key: &ProjectScopedKey, remote: &RemotePlugin) -> Result<PluginState> {
        let config = remote
            .config
            .iter()
            .filter(|f| !f.value.is_null())
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect();

        Ok(PluginState {
            organization: key.organization.clone(),
            project: key.project.clone(),
            plugin: remote.id.clone(),
            config,
        })
    }

    fn apply_defaults(desired: &PluginState, current: &PluginState) -> PluginState {
        let mut filled = desired.clone();
        for (name, value) in &current.config {
            filled
                .config
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        filled
    }

    fn fixed_changes(desired: &PluginState, current: &PluginState) -> Vec<&'static str> {
        fixed_fields(&[
            ("organization", &desired.organization, &current.organization),
            ("project", &desired.project, &current.project),
            ("plugin", &desired.plugin, &current.plugin),
        ])
    }
}

impl ResourceKind for PluginKind<'_> {
    const NAME: &'static str = "plugin";

    fn parent_of(desired: &PluginState) -> PluginTarget {
        PluginTarget {
            organization: desired.organization.clone(),
            project: desired.project.clone(),
            plugin: desired.plugin.clone(),
        }
    }

    fn key_of(parent: &PluginTarget, remote: &RemotePlugin) -> Result<ProjectScopedKey> {
        Ok(ProjectScopedKey::new(
            parent.organization.clone(),
            parent.project.clone(),
            remote.id.clone(),
        ))
    }
}
