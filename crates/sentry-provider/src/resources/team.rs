//! Teams

use super::{fixed_fields, or_current};
use crate::client::SentryClient;
use reconcile::{
    CallContext, Cursor, Gateway, OrgKey, OrgScopedKey, Page, ResourceKind, Result, Translator,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamState {
    pub organization: String,
    pub name: String,
    /// Assigned from the name when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTeam {
    pub id: String,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

pub struct TeamKind<'c> {
    client: &'c SentryClient,
}

impl<'c> TeamKind<'c> {
    pub fn new(client: &'c SentryClient) -> Self {
        Self { client }
    }
}

impl Gateway for TeamKind<'_> {
    type Key = OrgScopedKey;
    type Parent = OrgKey;
    type Remote = RemoteTeam;
    type Payload = TeamPayload;

    fn fetch(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<Option<RemoteTeam>> {
        let url = self.client.url(&["teams", &key.organization, &key.key])?;
        self.client.get(ctx, &url)
    }

    fn list(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        cursor: Option<&Cursor>,
    ) -> Result<Page<RemoteTeam>> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "teams"])?;
        self.client.list_page(ctx, &url, cursor)
    }

    fn create(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        payload: &TeamPayload,
    ) -> Result<RemoteTeam> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "teams"])?;
        self.client.post(ctx, &url, payload)
    }

    fn update(
        &self,
        ctx: &CallContext,
        key: &OrgScopedKey,
        payload: &TeamPayload,
    ) -> Result<RemoteTeam> {
        let url = self.client.url(&["teams", &key.organization, &key.key])?;
        self.client.put(ctx, &url, payload)
    }

    fn delete(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<()> {
        let url = self.client.url(&["teams", &key.organization, &key.key])?;
        self.client.delete(ctx, &url)
    }
}

impl Translator for TeamKind<'_> {
    type State = TeamState;

    fn to_payload(state: &TeamState) -> TeamPayload {
        TeamPayload {
            name: state.name.clone(),
            slug: state.slug.clone(),
        }
    }

    fn from_remote(key: &OrgScopedKey, remote: &RemoteTeam) -> Result<TeamState> {
        Ok(TeamState {
            organization: key.organization.clone(),
            name: remote.name.clone(),
            slug: Some(remote.slug.clone()),
        })
    }

    fn apply_defaults(desired: &TeamState, current: &TeamState) -> TeamState {
        TeamState {
            slug: or_current(&desired.slug, &current.slug),
            ..desired.clone()
        }
    }

    fn fixed_changes(desired: &TeamState, current: &TeamState) -> Vec<&'static str> {
        fixed_fields(&[("organization", &desired.organization, &current.organization)])
    }
}

impl ResourceKind for TeamKind<'_> {
    const NAME: &'static str = "team";

    fn parent_of(desired: &TeamState) -> OrgKey {
        OrgKey::new(desired.organization.clone())
    }

    fn key_of(parent: &OrgKey, remote: &RemoteTeam) -> Result<OrgScopedKey> {
        Ok(OrgScopedKey::new(
            parent.organization.clone(),
            remote.slug.clone(),
        ))
    }
}
