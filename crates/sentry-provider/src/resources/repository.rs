//! GitHub repositories connected through an installed integration
//!
//! Repositories are immutable once connected; changing any attribute
//! means removing the repository and connecting it again. Deleting only
//! schedules removal, so repositories in a deletion state are treated as
//! gone.

use super::{id_string, opt_id_string};
use crate::client::SentryClient;
use reconcile::{
    CallContext, Cursor, Error, Gateway, OrgKey, OrgScopedKey, Page, ResourceKind, Result,
    Translator,
};
use serde::{Deserialize, Serialize};

/// Provider id the API expects for GitHub integrations.
pub const GITHUB_PROVIDER: &str = "integrations:github";

const GONE_STATUSES: &[&str] = &["pending_deletion", "deletion_in_progress", "hidden"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    pub organization: String,
    /// Id of the installed GitHub integration
    pub integration_id: String,
    /// "owner/repo"
    pub identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRepository {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// "owner/repo"
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub integration_id: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderRef>,
}

impl RemoteRepository {
    /// Whether removal has been requested.
    pub fn is_going(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| GONE_STATUSES.contains(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryPayload {
    pub provider: &'static str,
    pub installation: String,
    pub identifier: String,
}

pub struct RepositoryKind<'c> {
    client: &'c SentryClient,
}

impl<'c> RepositoryKind<'c> {
    pub fn new(client: &'c SentryClient) -> Self {
        Self { client }
    }
}

impl Gateway for RepositoryKind<'_> {
    type Key = OrgScopedKey;
    type Parent = OrgKey;
    type Remote = RemoteRepository;
    type Payload = RepositoryPayload;

    fn fetch(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<Option<RemoteRepository>> {
        self.find(ctx, &key.org(), |r| r.id == key.key && !r.is_going())
    }

    fn list(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        cursor: Option<&Cursor>,
    ) -> Result<Page<RemoteRepository>> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "repos"])?;
        self.client.list_page(ctx, &url, cursor)
    }

    fn create(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        payload: &RepositoryPayload,
    ) -> Result<RemoteRepository> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "repos"])?;
        self.client.post(ctx, &url, payload)
    }

    fn update(
        &self,
        _: &CallContext,
        _: &OrgScopedKey,
        _: &RepositoryPayload,
    ) -> Result<RemoteRepository> {
        Err(Error::Unsupported {
            kind: Self::NAME,
            operation: "update",
        })
    }

    fn delete(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<()> {
        let url = self
            .client
            .url(&["organizations", &key.organization, "repos", &key.key])?;
        self.client.delete(ctx, &url)
    }
}

impl Translator for RepositoryKind<'_> {
    type State = RepositoryState;

    fn to_payload(state: &RepositoryState) -> RepositoryPayload {
        RepositoryPayload {
            provider: GITHUB_PROVIDER,
            installation: state.integration_id.clone(),
            identifier: state.identifier.clone(),
        }
    }

    fn from_remote(key: &OrgScopedKey, remote: &RemoteRepository) -> Result<RepositoryState> {
        let integration_id = remote.integration_id.clone().ok_or_else(|| {
            Error::UnexpectedShape(format!("repository {} has no integration", remote.name))
        })?;

        Ok(RepositoryState {
            organization: key.organization.clone(),
            integration_id,
            identifier: remote.name.clone(),
        })
    }
}

impl ResourceKind for RepositoryKind<'_> {
    const NAME: &'static str = "repository_github";

    fn parent_of(desired: &RepositoryState) -> OrgKey {
        OrgKey::new(desired.organization.clone())
    }

    fn key_of(parent: &OrgKey, remote: &RemoteRepository) -> Result<OrgScopedKey> {
        Ok(OrgScopedKey::new(
            parent.organization.clone(),
            remote.id.clone(),
        ))
    }
}
