//! Dashboards
//!
//! A dashboard owns an ordered list of widgets, each owning an ordered list
//! of queries. Order is significant and kept as the remote reports it.
//! Widgets and queries are matched by position when filling in the ids and
//! defaults the server assigns.

use super::{fixed_fields, id_string, opt_id_string, or_current};
use crate::client::SentryClient;
use reconcile::{
    CallContext, Cursor, Gateway, OrgKey, OrgScopedKey, Page, ResourceKind, Result, Translator,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardState {
    pub organization: String,
    pub title: String,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    /// Assigned by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    /// e.g. "line", "area", "table", "big_number"
    pub display_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// e.g. "discover", "issue"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<String>,
    #[serde(default)]
    pub queries: Vec<WidgetQuery>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub aggregates: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub order_by: String,
}

/// Widget as sent and received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWidget {
    #[serde(
        default,
        deserialize_with = "opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub title: String,
    pub display_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<String>,
    pub queries: Vec<WireQuery>,
}

/// Widget query as sent and received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireQuery {
    #[serde(
        default,
        deserialize_with = "opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub aggregates: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub orderby: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDashboard {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub title: String,
    /// Absent from listings, which only carry summaries
    #[serde(default)]
    pub widgets: Vec<WireWidget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardPayload {
    pub title: String,
    pub widgets: Vec<WireWidget>,
}

pub struct DashboardKind<'c> {
    client: &'c SentryClient,
}

impl<'c> DashboardKind<'c> {
    pub fn new(client: &'c SentryClient) -> Self {
        Self { client }
    }

    fn dashboard_url(&self, key: &OrgScopedKey) -> Result<url::Url> {
        self.client
            .url(&["organizations", &key.organization, "dashboards", &key.key])
    }
}

impl Gateway for DashboardKind<'_> {
    type Key = OrgScopedKey;
    type Parent = OrgKey;
    type Remote = RemoteDashboard;
    type Payload = DashboardPayload;

    fn fetch(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<Option<RemoteDashboard>> {
        self.client.get(ctx, &self.dashboard_url(key)?)
    }

    fn list(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        cursor: Option<&Cursor>,
    ) -> Result<Page<RemoteDashboard>> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "dashboards"])?;
        self.client.list_page(ctx, &url, cursor)
    }

    fn create(
        &self,
        ctx: &CallContext,
        parent: &OrgKey,
        payload: &DashboardPayload,
    ) -> Result<RemoteDashboard> {
        let url = self
            .client
            .url(&["organizations", &parent.organization, "dashboards"])?;
        self.client.post(ctx, &url, payload)
    }

    fn update(
        &self,
        ctx: &CallContext,
        key: &OrgScopedKey,
        payload: &DashboardPayload,
    ) -> Result<RemoteDashboard> {
        self.client.put(ctx, &self.dashboard_url(key)?, payload)
    }

    fn delete(&self, ctx: &CallContext, key: &OrgScopedKey) -> Result<()> {
        self.client.delete(ctx, &self.dashboard_url(key)?)
    }
}

impl From<&Widget> for WireWidget {
    fn from(w: &Widget) -> Self {
        Self {
            id: w.id.clone(),
            title: w.title.clone(),
            display_type: w.display_type.clone(),
            interval: w.interval.clone(),
            widget_type: w.widget_type.clone(),
            queries: w.queries.iter().map(WireQuery::from).collect(),
        }
    }
}

impl From<&WidgetQuery> for WireQuery {
    fn from(q: &WidgetQuery) -> Self {
        Self {
            id: q.id.clone(),
            name: q.name.clone(),
            fields: q.fields.clone(),
            aggregates: q.aggregates.clone(),
            columns: q.columns.clone(),
            conditions: q.conditions.clone(),
            orderby: q.order_by.clone(),
        }
    }
}

impl From<&WireWidget> for Widget {
    fn from(w: &WireWidget) -> Self {
        Self {
            id: w.id.clone(),
            title: w.title.clone(),
            display_type: w.display_type.clone(),
            interval: w.interval.clone(),
            widget_type: w.widget_type.clone(),
            queries: w.queries.iter().map(WidgetQuery::from).collect(),
        }
    }
}

impl From<&WireQuery> for WidgetQuery {
    fn from(q: &WireQuery) -> Self {
        Self {
            id: q.id.clone(),
            name: q.name.clone(),
            fields: q.fields.clone(),
            aggregates: q.aggregates.clone(),
            columns: q.columns.clone(),
            conditions: q.conditions.clone(),
            order_by: q.orderby.clone(),
        }
    }
}

impl Translator for DashboardKind<'_> {
    type State = DashboardState;

    fn to_payload(state: &DashboardState) -> DashboardPayload {
        DashboardPayload {
            title: state.title.clone(),
            widgets: state.widgets.iter().map(WireWidget::from).collect(),
        }
    }

    fn from_remote(key: &OrgScopedKey, remote: &RemoteDashboard) -> Result<DashboardState> {
        Ok(DashboardState {
            organization: key.organization.clone(),
            title: remote.title.clone(),
            widgets: remote.widgets.iter().map(Widget::from).collect(),
        })
    }

    fn apply_defaults(desired: &DashboardState, current: &DashboardState) -> DashboardState {
        let mut filled = desired.clone();
        for (widget, known) in filled.widgets.iter_mut().zip(&current.widgets) {
            widget.id = or_current(&widget.id, &known.id);
            widget.interval = or_current(&widget.interval, &known.interval);
            widget.widget_type = or_current(&widget.widget_type, &known.widget_type);
            for (query, known) in widget.queries.iter_mut().zip(&known.queries) {
                query.id = or_current(&query.id, &known.id);
            }
        }
        filled
    }

    fn fixed_changes(desired: &DashboardState, current: &DashboardState) -> Vec<&'static str> {
        fixed_fields(&[("organization", &desired.organization, &current.organization)])
    }
}

impl ResourceKind for DashboardKind<'_> {
    const NAME: &'static str = "dashboard";

    fn parent_of(desired: &DashboardState) -> OrgKey {
        OrgKey::new(desired.organization.clone())
    }

    fn key_of(parent: &OrgKey, remote: &RemoteDashboard) -> Result<OrgScopedKey> {
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

    const DASHBOARD: &str = "0/organizations/acme/dashboards/12/";

    fn remote(second_title: &str) -> serde_json::Value {
        json!({
            "id": "12",
            "title": "Service health",
            "dateCreated": "2024-05-01T00:00:00Z",
            "widgets": [
                {
                    "id": "34",
                    "title": "Errors",
                    "displayType": "line",
                    "interval": "5m",
                    "widgetType": "discover",
                    "queries": [
                        {"id": "56", "name": "", "fields": ["count()"], "aggregates": ["count()"],
                         "columns": [], "conditions": "event.type:error", "orderby": ""}
                    ]
                },
                {
                    "id": 35,
                    "title": second_title,
                    "displayType": "big_number",
                    "interval": "5m",
                    "widgetType": "discover",
                    "queries": [
                        {"id": 57, "name": "", "fields": ["count_unique(user)"],
                         "aggregates": ["count_unique(user)"], "columns": [],
                         "conditions": "", "orderby": ""}
                    ]
                }
            ]
        })
    }

    fn query(aggregate: &str, conditions: &str) -> WidgetQuery {
        WidgetQuery {
            fields: vec![aggregate.to_string()],
            aggregates: vec![aggregate.to_string()],
            conditions: conditions.to_string(),
            ..Default::default()
        }
    }

    fn desired(second_title: &str) -> DashboardState {
        DashboardState {
            organization: "acme".into(),
            title: "Service health".into(),
            widgets: vec![
                Widget {
                    id: None,
                    title: "Errors".into(),
                    display_type: "line".into(),
                    interval: None,
                    widget_type: None,
                    queries: vec![query("count()", "event.type:error")],
                },
                Widget {
                    id: None,
                    title: second_title.into(),
                    display_type: "big_number".into(),
                    interval: None,
                    widget_type: None,
                    queries: vec![query("count_unique(user)", "")],
                },
            ],
        }
    }

    #[test]
    fn test_widget_order_preserved() {
        let remote: RemoteDashboard = serde_json::from_value(remote("Users")).unwrap();
        let key = OrgScopedKey::new("acme", "12");
        let state = DashboardKind::from_remote(&key, &remote).unwrap();

        let titles: Vec<_> = state.widgets.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(titles, vec!["Errors", "Users"]);
        assert_eq!(state.widgets[1].id.as_deref(), Some("35"));
        assert_eq!(state.widgets[1].queries[0].id.as_deref(), Some("57"));
    }

    #[test]
    fn test_round_trip_keeps_managed_fields() {
        let remote: RemoteDashboard = serde_json::from_value(remote("Users")).unwrap();
        let key = OrgScopedKey::new("acme", "12");
        let state = DashboardKind::from_remote(&key, &remote).unwrap();
        let payload = DashboardKind::to_payload(&state);

        assert_eq!(payload.widgets, remote.widgets);
    }

    #[test]
    fn test_server_assigned_ids_are_not_drift() {
        let mock = MockTransport::new();
        mock.on(Method::Get, DASHBOARD, HttpResponse::json(200, remote("Users")));
        let client = client(&mock);
        let kind = DashboardKind::new(&client);

        let applied = Reconciler::new(&kind, ctx())
            .update("acme/12", &desired("Users"))
            .unwrap();
        assert_eq!(applied.action, Action::Unchanged);
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn test_widget_change_keeps_ids() {
        let mock = MockTransport::new();
        mock.on(Method::Get, DASHBOARD, HttpResponse::json(200, remote("Users")));
        mock.on(Method::Put, DASHBOARD, HttpResponse::json(200, remote("Active users")));
        let client = client(&mock);
        let kind = DashboardKind::new(&client);

        let applied = Reconciler::new(&kind, ctx())
            .update("acme/12", &desired("Active users"))
            .unwrap();
        assert_eq!(applied.action, Action::Updated);
        assert_eq!(applied.state.widgets[1].title, "Active users");

        let body = mock.requests()[1].body.clone().unwrap();
        assert_eq!(body["widgets"][0]["id"], "34");
        assert_eq!(body["widgets"][1]["id"], "35");
        assert_eq!(body["widgets"][1]["queries"][0]["id"], "57");
        assert_eq!(body["widgets"][1]["displayType"], "big_number");
    }

    #[test]
    fn test_listing_without_widgets_decodes() {
        let listed: Vec<RemoteDashboard> = serde_json::from_value(json!([
            {"id": "default-overview", "title": "General", "widgetDisplay": ["line"]},
            {"id": 12, "title": "Service health"}
        ]))
        .unwrap();
        assert_eq!(listed[1].id, "12");
        assert!(listed[0].widgets.is_empty());
    }
}
