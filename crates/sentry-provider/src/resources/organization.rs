//! Organizations
//!
//! Creating organizations is only possible on self-hosted installs; the
//! kind is mostly used to import and rename existing ones.

use super::or_current;
use crate::client::SentryClient;
use reconcile::{
    CallContext, CompositeKey, Cursor, Gateway, OrgKey, Page, ResourceKind, Result, Translator,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationState {
    pub name: String,
    /// Assigned from the name when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteOrganization {
    pub id: String,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// Create request; terms must be accepted to create an organization.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrganization<'a> {
    #[serde(flatten)]
    payload: &'a OrganizationPayload,
    agree_terms: bool,
}

pub struct OrganizationKind<'c> {
    client: &'c SentryClient,
}

impl<'c> OrganizationKind<'c> {
    pub fn new(client: &'c SentryClient) -> Self {
        Self { client }
    }
}

impl Gateway for OrganizationKind<'_> {
    type Key = OrgKey;
    type Parent = ();
    type Remote = RemoteOrganization;
    type Payload = OrganizationPayload;

    fn fetch(&self, ctx: &CallContext, key: &OrgKey) -> Result<Option<RemoteOrganization>> {
        let url = self.client.url(&["organizations", &key.organization])?;
        self.client.get(ctx, &url)
    }

    fn list(
        &self,
        ctx: &CallContext,
        _parent: &(),
        cursor: Option<&Cursor>,
    ) -> Result<Page<RemoteOrganization>> {
        let url = self.client.url(&["organizations"])?;
        self.client.list_page(ctx, &url, cursor)
    }

    fn create(
        &self,
        ctx: &CallContext,
        _parent: &(),
        payload: &OrganizationPayload,
    ) -> Result<RemoteOrganization> {
        let url = self.client.url(&["organizations"])?;
        let body = CreateOrganization {
            payload,
            agree_terms: true,
        };
        self.client.post(ctx, &url, &body)
    }

    fn update(
        &self,
        ctx: &CallContext,
        key: &OrgKey,
        payload: &OrganizationPayload,
    ) -> Result<RemoteOrganization> {
        let url = self.client.url(&["organizations", &key.organization])?;
        self.client.put(ctx, &url, payload)
    }

    fn delete(&self, ctx: &CallContext, key: &OrgKey) -> Result<()> {
        let url = self.client.url(&["organizations", &key.organization])?;
        self.client.delete(ctx, &url)
    }
}

impl Translator for OrganizationKind<'_> {
    type State = OrganizationState;

    fn to_payload(state: &OrganizationState) -> OrganizationPayload {
        OrganizationPayload {
            name: state.name.clone(),
            slug: state.slug.clone(),
        }
    }

    fn from_remote(_key: &OrgKey, remote: &RemoteOrganization) -> Result<OrganizationState> {
        Ok(OrganizationState {
            name: remote.name.clone(),
            slug: Some(remote.slug.clone()),
        })
    }

    fn apply_defaults(
        desired: &OrganizationState,
        current: &OrganizationState,
    ) -> OrganizationState {
        OrganizationState {
            slug: or_current(&desired.slug, &current.slug),
            ..desired.clone()
        }
    }
}

impl ResourceKind for OrganizationKind<'_> {
    const NAME: &'static str = "organization";

    fn parent_of(_desired: &OrganizationState) {}

    fn key_of(_parent: &(), remote: &RemoteOrganization) -> Result<OrgKey> {
        let key = OrgKey::new(remote.slug.clone());
        key.encode()?;
        Ok(key)
    }
}
