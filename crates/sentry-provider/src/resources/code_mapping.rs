//! Code mappings
//!
//! Link stack trace paths in a project to source paths in a repository.
//! The API has no detail endpoint, so a mapping is read by scanning the
//! organization's listing for its id.

use super::{fixed_fields, id_string, or_current};
use crate::client::SentryClient;
use reconcile::{
    CallContext, Cursor, Gateway, OrgKey, OrgScopedKey, Page, ResourceKind, Result, Translator,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMappingState {
    pub organization: String,
    pub integration_id: String,
    pub repository_id: String,
    pub project_id: String,
    /// Path prefix as it appears in stack traces
    pub stack_root: String,
    /// Path prefix inside the repository
    pub source_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCodeMapping {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub project_id: String,
    #[serde(deserialize_with = "id_string")]
    pub repo_id: String,
    #[serde(deserialize_with = "id_string")]
    pub integration_id: String,
    pub stack_root: String,
    pub source_root: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeMappingPayload {
    pub integration_id: String,
    pub repository_id: String,
    pub project_id: String,
    pub stack_root: String,
    pub source_root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

pub struct CodeMappingKind<'c> {
    client: &'c SentryClient,
}

impl<'c> CodeMappingKind<'c> {
    pub fn new(client: &'c SentryClient) -> Self {
        Self { client }
    }
}

impl Gateway for CodeMappingKind<'_> {
    type Key = OrgScopedKey;
    type Parent = OrgKey;
    type Remote = RemoteCodeMapping;
    type Payload = CodeMappingPayload;

    fn fetch(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<Option<RemoteCodeMapping>> {
        self.find(ctx, &key.org(), |m| m.id == key.key)
    }

    fn list(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        cursor: Option<&Cursor>,
    ) -> Result<Page<RemoteCodeMapping>> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "code-mappings"])?;
        self.client.list_page(ctx, &url, cursor)
    }

    fn create(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        payload: &CodeMappingPayload,
    ) -> Result<RemoteCodeMapping> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "code-mappings"])?;
        self.client.post(ctx, &url, payload)
    }

    fn update(
        &self,
        ctx: &CallContext,
        key: &OrgScopedKey,
        payload: &CodeMappingPayload,
    ) -> Result<RemoteCodeMapping> {
        let url = self
            .client
            .url(&["organizations", &key.organization, "code-mappings", &key.key])?;
        self.client.put(ctx, &url, payload)
    }

    fn delete(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<()> {
        let url = self
            .client
            .url(&["organizations", &key.organization, "code-mappings", &key.key])?;
        self.client.delete(ctx, &url)
    }
}

impl Translator for CodeMappingKind<'_> {
    type State = CodeMappingState;

    fn to_payload(state: &CodeMappingState) -> CodeMappingPayload {
        CodeMappingPayload {
            integration_id: state.integration_id.clone(),
            repository_id: state.repository_id.clone(),
            project_id: state.project_id.clone(),
            stack_root: state.stack_root.clone(),
            source_root: state.source_root.clone(),
            default_branch: state.default_branch.clone(),
        }
    }

    fn from_remote(key: &OrgScopedKey, remote: &RemoteCodeMapping) -> Result<CodeMappingState> {
        Ok(CodeMappingState {
            organization: key.organization.clone(),
            integration_id: remote.integration_id.clone(),
            repository_id: remote.repo_id.clone(),
            project_id: remote.project_id.clone(),
            stack_root: remote.stack_root.clone(),
            source_root: remote.source_root.clone(),
            default_branch: remote.default_branch.clone(),
        })
    }

    fn apply_defaults(desired: &CodeMappingState, current: &CodeMappingState) -> CodeMappingState {
        CodeMappingState {
            default_branch: or_current(&desired.default_branch, &current.default_branch),
            ..desired.clone()
        }
    }

    fn fixed_changes(desired: &CodeMappingState, current: &CodeMappingState) -> Vec<&'static str> {
        fixed_fields(&[("organization", &desired.organization, &current.organization)])
    }
}

impl ResourceKind for CodeMappingKind<'_> {
    const NAME: &'static str = "code_mapping";

    fn parent_of(desired: &CodeMappingState) -> OrgKey {
        OrgKey::new(desired.organization.clone())
    }

    fn key_of(parent: &OrgKey, remote: &RemoteCodeMapping) -> Result<OrgScopedKey> {
        Ok(OrgScopedKey::new(
            parent.organization.clone(),
            remote.id.clone(),
        ))
    }
}
