//! Organization members
//!
//! Team memberships are a set on the remote; they are kept sorted and
//! deduplicated so ordering never shows up as drift.

use super::{fixed_fields, id_string};
use crate::client::SentryClient;
use reconcile::{
    CallContext, Cursor, Error, Gateway, OrgKey, OrgScopedKey, Page, ResourceKind, Result,
    Translator,
};
use serde::{Deserialize, Serialize};

/// Role given to members when none is declared.
pub const DEFAULT_ROLE: &str = "member";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberState {
    pub organization: String,
    /// Fixed once the invite is sent
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub teams: Vec<String>,
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMember {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub org_role: Option<String>,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub expired: bool,
}

impl RemoteMember {
    /// Organization role, preferring the current field name.
    pub fn effective_role(&self) -> Option<&str> {
        self.org_role.as_deref().or(self.role.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPayload {
    pub email: String,
    pub role: String,
    /// Sorted, without duplicates
    pub teams: Vec<String>,
}

#[derive(Serialize)]
struct InviteMember<'a> {
    email: &'a str,
    role: &'a str,
    teams: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMember<'a> {
    org_role: &'a str,
    teams: &'a [String],
}

pub struct MemberKind<'c> {
    client: &'c SentryClient,
}

impl<'c> MemberKind<'c> {
    pub fn new(client: &'c SentryClient) -> Self {
        Self { client }
    }

    fn member_url(&self, key: &OrgScopedKey) -> Result<url::Url> {
        self.client
            .url(&["organizations", &key.organization, "members", &key.key])
    }
}

impl Gateway for MemberKind<'_> {
    type Key = OrgScopedKey;
    type Parent = OrgKey;
    type Remote = RemoteMember;
    type Payload = MemberPayload;

    fn fetch(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<Option<RemoteMember>> {
        self.client.get(ctx, &self.member_url(key)?)
    }

    fn list(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        cursor: Option<&Cursor>,
    ) -> Result<Page<RemoteMember>> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "members"])?;
        self.client.list_page(ctx, &url, cursor)
    }

    fn create(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        payload: &MemberPayload,
    ) -> Result<RemoteMember> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "members"])?;
        let body = InviteMember {
            email: &payload.email,
            role: &payload.role,
            teams: &payload.teams,
        };
        self.client.post(ctx, &url, &body)
    }

    fn update(
        &self,
        ctx: &CallContext,
        key: &OrgScopedKey,
        payload: &MemberPayload,
    ) -> Result<RemoteMember> {
        let body = UpdateMember {
            org_role: &payload.role,
            teams: &payload.teams,
        };
        self.client.put(ctx, &self.member_url(key)?, &body)
    }

    fn delete(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<()> {
        self.client.delete(ctx, &self.member_url(key)?)
    }
}

fn normalize_teams(teams: &[String]) -> Vec<String> {
    let mut teams = teams.to_vec();
    teams.sort();
    teams.dedup();
    teams
}

impl Translator for MemberKind<'_> {
    type State = MemberState;

    fn to_payload(state: &MemberState) -> MemberPayload {
        MemberPayload {
            email: state.email.clone(),
            role: state.role.clone(),
            teams: normalize_teams(&state.teams),
        }
    }

    fn from_remote(key: &OrgScopedKey, remote: &RemoteMember) -> Result<MemberState> {
        let role = remote.effective_role().ok_or_else(|| {
            Error::UnexpectedShape(format!("member {} has no role", remote.id))
        })?;

        Ok(MemberState {
            organization: key.organization.clone(),
            email: remote.email.clone(),
            role: role.to_string(),
            teams: normalize_teams(&remote.teams),
        })
    }


    fn fixed_changes(desired: &MemberState, current: &MemberState) -> Vec<&'static str> {
        fixed_fields(&[
            ("organization", &desired.organization, &current.organization),
            ("email", &desired.email, &current.email),
        ])
    }
}

impl ResourceKind for MemberKind<'_> {
    const NAME: &'static str = "member";

    fn parent_of(desired: &MemberState) -> OrgKey {
        OrgKey::new(desired.organization.clone())
    }

    fn key_of(parent: &OrgKey, remote: &RemoteMember) -> Result<OrgScopedKey> {
        Ok(OrgScopedKey::new(
            parent.organization.clone(),
            remote.id.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{client, ctx};
    use crate::transport::{HttpResponse, Method, MockTransport};
    use reconcile::{Action, Reconciler};
    use serde_json::json;

    const MEMBER: &str = "0/organizations/acme/members/57/";

    fn jane(teams: &[&str]) -> serde_json::Value {
        json!({
            "id": "57",
            "email": "jane@acme.io",
            "role": "member",
            "orgRole": "admin",
            "teams": teams,
            "pending": true,
            "expired": false
        })
    }

    fn desired(teams: &[&str]) -> MemberState {
        MemberState {
            organization: "acme".into(),
            email: "jane@acme.io".into(),
            role: "admin".into(),
            teams: teams.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    #[test]
    fn test_invite() {
        let mock = MockTransport::new();
        mock.on(
            Method::Post,
            "0/organizations/acme/members/",
            HttpResponse::json(201, jane(&["core", "web"])),
        );
        let client = client(&mock);
        let kind = MemberKind::new(&client);

        let created = Reconciler::new(&kind, ctx())
            .create(&desired(&["web", "core", "web"]))
            .unwrap();

        assert_eq!(created.id, "acme/57");
        assert_eq!(created.state.role, "admin");
        assert_eq!(
            mock.requests()[0].body,
            Some(json!({"email": "jane@acme.io", "role": "admin", "teams": ["core", "web"]}))
        );
    }

    #[test]
    fn test_team_order_is_not_drift() {
        let mock = MockTransport::new();
        mock.on(Method::Get, MEMBER, HttpResponse::json(200, jane(&["web", "core"])));
        let client = client(&mock);
        let kind = MemberKind::new(&client);

        let applied = Reconciler::new(&kind, ctx())
            .update("acme/57", &desired(&["core", "web"]))
            .unwrap();
        assert_eq!(applied.action, Action::Unchanged);
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn test_team_change_updates() {
        let mock = MockTransport::new();
        mock.on(Method::Get, MEMBER, HttpResponse::json(200, jane(&["core"])));
        mock.on(Method::Put, MEMBER, HttpResponse::json(200, jane(&["core", "web"])));
        let client = client(&mock);
        let kind = MemberKind::new(&client);

        let applied = Reconciler::new(&kind, ctx())
            .update("acme/57", &desired(&["core", "web"]))
            .unwrap();
        assert_eq!(applied.action, Action::Updated);
        assert_eq!(
            mock.requests()[1].body,
            Some(json!({"orgRole": "admin", "teams": ["core", "web"]}))
        );
    }

    #[test]
    fn test_email_change_is_refused_without_writing() {
        let mock = MockTransport::new();
        mock.on(Method::Get, MEMBER, HttpResponse::json(200, jane(&[])));
        let client = client(&mock);
        let kind = MemberKind::new(&client);
        let reconciler = Reconciler::new(&kind, ctx());

        let moved = MemberState {
            email: "new@acme.io".into(),
            ..desired(&[])
        };
        for _ in 0..3 {
            let err = reconciler.update("acme/57", &moved).unwrap_err();
            assert!(matches!(err.root(), Error::Immutable { kind: "member", .. }));
        }
        assert!(reconciler.plan("acme/57", &moved).is_err());
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn test_numeric_id_accepted() {
        let remote: RemoteMember = serde_json::from_value(json!({
            "id": 57,
            "email": "jane@acme.io",
            "role": "member"
        }))
        .unwrap();
        assert_eq!(remote.id, "57");
        assert_eq!(remote.effective_role(), Some("member"));
    }
}
