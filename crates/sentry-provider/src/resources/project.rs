//! Projects
//!
//! A project is created under its owning team, then its settings are
//! written in a second request when they cannot be sent on creation. The
//! owning team is fixed at creation; declaring another team is refused
//! rather than moving the project.

use super::{fixed_fields, or_current};
use crate::client::SentryClient;
use reconcile::{
    CallContext, Cursor, Error, Gateway, OrgScopedKey, Page, ResourceKind, Result,
    Translator,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    pub organization: String,
    /// Slug of the team the project is created under
    pub team: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Hours after which issues auto-resolve, 0 disables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_age: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRef {
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProject {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub resolve_age: Option<u32>,
    #[serde(default)]
    pub team: Option<TeamRef>,
    #[serde(default)]
    pub teams: Vec<TeamRef>,
}

impl RemoteProject {
    /// The owning team, preferring the primary one.
    pub fn owner(&self) -> Option<&str> {
        self.team
            .as_ref()
            .or_else(|| self.teams.first())
            .map(|t| t.slug.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve_age: Option<u32>,
}

/// Fields accepted by the create endpoint.
#[derive(Serialize)]
struct CreateProject<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    slug: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<&'a str>,
}

/// Where a project is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectParent {
    pub organization: String,
    pub team: String,
}

pub struct ProjectKind<'c> {
    client: &'c SentryClient,
}

impl<'c> ProjectKind<'c> {
    pub fn new(client: &'c SentryClient) -> Self {
        Self { client }
    }
}

impl Gateway for ProjectKind<'_> {
    type Key = OrgScopedKey;
    type Parent = ProjectParent;
    type Remote = RemoteProject;
    type Payload = ProjectPayload;

    fn fetch(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<Option<RemoteProject>> {
        let url = self.client.url(&["projects", &key.organization, &key.key])?;
        self.client.get(ctx, &url)
    }

    fn list(
        &self,
        ctx: &CallContext,
        parent: &ProjectParent,
        cursor: Option<&Cursor>,
    ) -> Result<Page<RemoteProject>> {
        let url = self
            .client
            .url(&["teams", &parent.organization, &parent.team, "projects"])?;
        self.client.list_page(ctx, &url, cursor)
    }

    fn create(
        &self,
        ctx: &CallContext,
        parent: &ProjectParent,
        payload: &ProjectPayload,
    ) -> Result<RemoteProject> {
        let url = self
            .client
            .url(&["teams", &parent.organization, &parent.team, "projects"])?;
        let body = CreateProject {
            name: &payload.name,
            slug: payload.slug.as_deref(),
            platform: payload.platform.as_deref(),
        };
        let created: RemoteProject = self.client.post(ctx, &url, &body)?;

        if payload.resolve_age.is_none() {
            return Ok(created);
        }

        // Settings can only be written once the project exists. The project
        // is returned either way so it gets tracked; unapplied settings show
        // up as drift on the next plan.
        let key = OrgScopedKey::new(parent.organization.clone(), created.slug.clone());
        match self.update(ctx, &key, payload) {
            Ok(updated) => Ok(updated),
            Err(e) => {
                log::warn!(
                    "project {}/{} was created but its settings were not applied: {e}",
                    parent.organization,
                    created.slug
                );
                Ok(created)
            }
        }
    }

    fn update(
        &self,
        ctx: &CallContext,
        key: &OrgScopedKey,
        payload: &ProjectPayload,
    ) -> Result<RemoteProject> {
        let url = self.client.url(&["projects", &key.organization, &key.key])?;
        self.client.put(ctx, &url, payload)
    }

    fn delete(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<()> {
        let url = self.client.url(&["projects", &key.organization, &key.key])?;
        self.client.delete(ctx, &url)
    }
}

impl Translator for ProjectKind<'_> {
    type State = ProjectState;

    fn to_payload(state: &ProjectState) -> ProjectPayload {
        ProjectPayload {
            name: state.name.clone(),
            slug: state.slug.clone(),
            platform: state.platform.clone(),
            resolve_age: state.resolve_age,
        }
    }

    fn from_remote(key: &OrgScopedKey, remote: &RemoteProject) -> Result<ProjectState> {
        let team = remote.owner().ok_or_else(|| {
            Error::UnexpectedShape(format!("project {} has no team", remote.slug))
        })?;

        Ok(ProjectState {
            organization: key.organization.clone(),
            team: team.to_string(),
            name: remote.name.clone(),
            slug: Some(remote.slug.clone()),
            platform: remote.platform.clone(),
            resolve_age: remote.resolve_age,
        })
    }

    fn apply_defaults(desired: &ProjectState, current: &ProjectState) -> ProjectState {
        ProjectState {
            slug: or_current(&desired.slug, &current.slug),
            platform: or_current(&desired.platform, &current.platform),
            resolve_age: desired.resolve_age.or(current.resolve_age),
            ..desired.clone()
        }
    }


    fn fixed_changes(desired: &ProjectState, current: &ProjectState) -> Vec<&'static str> {
        fixed_fields(&[
            ("organization", &desired.organization, &current.organization),
            ("team", &desired.team, &current.team),
        ])
    }
}

impl ResourceKind for ProjectKind<'_> {
    const NAME: &'static str = "project";

    fn parent_of(desired: &ProjectState) -> ProjectParent {
        ProjectParent {
            organization: desired.organization.clone(),
            team: desired.team.clone(),
        }
    }

    fn key_of(parent: &ProjectParent, remote: &RemoteProject) -> Result<OrgScopedKey> {
        Ok(OrgScopedKey::new(
            parent.organization.clone(),
            remote.slug.clone(),
        ))
    }
}
