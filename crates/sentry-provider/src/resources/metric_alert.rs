//! Metric alert rules
//!
//! A rule owns an ordered list of triggers (critical, warning), each owning
//! an ordered list of actions. Nested ids assigned by the server are filled
//! in by position before comparing.

use super::{fixed_fields, id_string, opt_id_string, or_current};
use crate::client::SentryClient;
use reconcile::{
    CallContext, Cursor, Gateway, OrgScopedKey, Page, ProjectScopedKey, ResourceKind, Result,
    Translator,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAlertState {
    pub organization: String,
    pub project: String,
    pub name: String,
    /// e.g. "events", "transactions"; server default when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(default)]
    pub query: String,
    pub aggregate: String,
    /// Minutes
    pub time_window: f64,
    /// 0 alerts above the threshold, 1 below
    #[serde(default)]
    pub threshold_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// "team:<id>" or "user:<id>"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// "critical" or "warning"
    pub label: String,
    pub alert_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_threshold: Option<f64>,
    #[serde(default)]
    pub actions: Vec<TriggerAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// e.g. "email", "slack", "pagerduty"
    #[serde(rename = "type")]
    pub action_type: String,
    /// e.g. "user", "team", "specific"
    pub target_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_id: Option<String>,
}

/// Trigger as sent and received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTrigger {
    #[serde(
        default,
        deserialize_with = "opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub label: String,
    pub alert_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_threshold: Option<f64>,
    #[serde(default)]
    pub actions: Vec<WireAction>,
}

/// Trigger action as sent and received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAction {
    #[serde(
        default,
        deserialize_with = "opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub action_type: String,
    pub target_type: String,
    #[serde(
        default,
        deserialize_with = "opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_identifier: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub integration_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMetricAlert {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub query: String,
    pub aggregate: String,
    pub time_window: f64,
    pub threshold_type: u8,
    #[serde(default)]
    pub resolve_threshold: Option<f64>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    pub triggers: Vec<WireTrigger>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAlertPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    pub query: String,
    pub aggregate: String,
    pub time_window: f64,
    pub threshold_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub projects: Vec<String>,
    pub triggers: Vec<WireTrigger>,
}

pub struct MetricAlertKind<'c> {
    client: &'c SentryClient,
}

impl<'c> MetricAlertKind<'c> {
    pub fn new(client: &'c SentryClient) -> Self {
        Self { client }
    }

    fn rules_url(&self, project: &OrgScopedKey) -> Result<url::Url> {
        self.client
            .url(&["projects", &project.organization, &project.key, "alert-rules"])
    }

    fn rule_url(&self, key: &ProjectScopedKey) -> Result<url::Url> {
        self.client.url(&[
            "projects",
            &key.organization,
            &key.project,
            "alert-rules",
            &key.key,
        ])
    }
}

impl Gateway for MetricAlertKind<'_> {
    type Key = ProjectScopedKey;
    type Parent = OrgScopedKey;
    type Remote = RemoteMetricAlert;
    type Payload = MetricAlertPayload;

    fn fetch(
        &self,
        ctx: &CallContext,
        key: &ProjectScopedKey,
    ) -> Result<Option<RemoteMetricAlert>> {
        self.client.get(ctx, &self.rule_url(key)?)
    }

    fn list(
        &self,
        ctx: &CallContext,
        parent: &OrgScopedKey,
        cursor: Option<&Cursor>,
    ) -> Result<Page<RemoteMetricAlert>> {
        self.client.list_page(ctx, &self.rules_url(parent)?, cursor)
    }

    fn create(
        &self,
        ctx: &CallContext,
        parent: &OrgScopedKey,
        payload: &MetricAlertPayload,
    ) -> Result<RemoteMetricAlert> {
        self.client.post(ctx, &self.rules_url(parent)?, payload)
    }

    fn update(
        &self,
        ctx: &CallContext,
        key: &ProjectScopedKey,
        payload: &MetricAlertPayload,
    ) -> Result<RemoteMetricAlert> {
        self.client.put(ctx, &self.rule_url(key)?, payload)
    }

    fn delete(&self, ctx: &CallContext, key: &ProjectScopedKey) -> Result<()> {
        self.client.delete(ctx, &self.rule_url(key)?)
    }
}

impl From<&Trigger> for WireTrigger {
    fn from(t: &Trigger) -> Self {
        Self {
            id: t.id.clone(),
            label: t.label.clone(),
            alert_threshold: t.alert_threshold,
            threshold_type: t.threshold_type,
            resolve_threshold: t.resolve_threshold,
            actions: t.actions.iter().map(WireAction::from).collect(),
        }
    }
}

impl From<&TriggerAction> for WireAction {
    fn from(a: &TriggerAction) -> Self {
        Self {
            id: a.id.clone(),
            action_type: a.action_type.clone(),
            target_type: a.target_type.clone(),
            target_identifier: a.target_identifier.clone(),
            integration_id: a.integration_id.clone(),
        }
    }
}

impl From<&WireTrigger> for Trigger {
    fn from(t: &WireTrigger) -> Self {
        Self {
            id: t.id.clone(),
            label: t.label.clone(),
            alert_threshold: t.alert_threshold,
            threshold_type: t.threshold_type,
            resolve_threshold: t.resolve_threshold,
            actions: t.actions.iter().map(TriggerAction::from).collect(),
        }
    }
}

impl From<&WireAction> for TriggerAction {
    fn from(a: &WireAction) -> Self {
        Self {
            id: a.id.clone(),
            action_type: a.action_type.clone(),
            target_type: a.target_type.clone(),
            target_identifier: a.target_identifier.clone(),
            integration_id: a.integration_id.clone(),
        }
    }
}

impl Translator for MetricAlertKind<'_> {
    type State = MetricAlertState;

    fn to_payload(state: &MetricAlertState) -> MetricAlertPayload {
        MetricAlertPayload {
            name: state.name.clone(),
            environment: state.environment.clone(),
            dataset: state.dataset.clone(),
            query: state.query.clone(),
            aggregate: state.aggregate.clone(),
            time_window: state.time_window,
            threshold_type: state.threshold_type,
            resolve_threshold: state.resolve_threshold,
            owner: state.owner.clone(),
            projects: vec![state.project.clone()],
            triggers: state.triggers.iter().map(WireTrigger::from).collect(),
        }
    }

    fn from_remote(key: &ProjectScopedKey, remote: &RemoteMetricAlert) -> Result<MetricAlertState> {
        Ok(MetricAlertState {
            organization: key.organization.clone(),
            project: key.project.clone(),
            name: remote.name.clone(),
            dataset: remote.dataset.clone(),
            query: remote.query.clone(),
            aggregate: remote.aggregate.clone(),
            time_window: remote.time_window,
            threshold_type: remote.threshold_type,
            resolve_threshold: remote.resolve_threshold,
            environment: remote.environment.clone(),
            owner: remote.owner.clone(),
            triggers: remote.triggers.iter().map(Trigger::from).collect(),
        })
    }

    fn apply_defaults(desired: &MetricAlertState, current: &MetricAlertState) -> MetricAlertState {
        let mut filled = MetricAlertState {
            dataset: or_current(&desired.dataset, &current.dataset),
            ..desired.clone()
        };
        for (trigger, known) in filled.triggers.iter_mut().zip(&current.triggers) {
            trigger.id = or_current(&trigger.id, &known.id);
            trigger.threshold_type = trigger.threshold_type.or(known.threshold_type);
            for (action, known) in trigger.actions.iter_mut().zip(&known.actions) {
                action.id = or_current(&action.id, &known.id);
            }
        }
        filled
    }

    fn fixed_changes(desired: &MetricAlertState, current: &MetricAlertState) -> Vec<&'static str> {
        fixed_fields(&[("organization", &desired.organization, &current.organization)])
    }
}

impl ResourceKind for MetricAlertKind<'_> {
    const NAME: &'static str = "metric_alert";

    fn parent_of(desired: &MetricAlertState) -> OrgScopedKey {
        OrgScopedKey::new(desired.organization.clone(), desired.project.clone())
    }

    fn key_of(parent: &OrgScopedKey, remote: &RemoteMetricAlert) -> Result<ProjectScopedKey> {
        Ok(ProjectScopedKey::new(
            parent.organization.clone(),
            parent.key.clone(),
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

    const RULES: &str = "0/projects/acme/web/alert-rules/";
    const RULE: &str = "0/projects/acme/web/alert-rules/177104/";

    fn remote(threshold: f64) -> serde_json::Value {
        json!({
            "id": "177104",
            "name": "High error rate",
            "environment": null,
            "dataset": "events",
            "query": "",
            "aggregate": "count()",
            "timeWindow": 60.0,
            "thresholdType": 0,
            "resolveThreshold": null,
            "owner": "team:4502",
            "projects": ["web"],
            "triggers": [
                {
                    "id": "2",
                    "label": "critical",
                    "thresholdType": 0,
                    "alertThreshold": threshold,
                    "resolveThreshold": null,
                    "actions": [
                        {"id": "9", "type": "email", "targetType": "team",
                         "targetIdentifier": 4502, "integrationId": null}
                    ]
                },
                {
                    "id": "3",
                    "label": "warning",
                    "thresholdType": 0,
                    "alertThreshold": 50.0,
                    "actions": []
                }
            ]
        })
    }

    fn desired(threshold: f64) -> MetricAlertState {
        MetricAlertState {
            organization: "acme".into(),
            project: "web".into(),
            name: "High error rate".into(),
            dataset: None,
            query: String::new(),
            aggregate: "count()".into(),
            time_window: 60.0,
            threshold_type: 0,
            resolve_threshold: None,
            environment: None,
            owner: Some("team:4502".into()),
            triggers: vec![
                Trigger {
                    id: None,
                    label: "critical".into(),
                    alert_threshold: threshold,
                    threshold_type: None,
                    resolve_threshold: None,
                    actions: vec![TriggerAction {
                        id: None,
                        action_type: "email".into(),
                        target_type: "team".into(),
                        target_identifier: Some("4502".into()),
                        integration_id: None,
                    }],
                },
                Trigger {
                    id: None,
                    label: "warning".into(),
                    alert_threshold: 50.0,
                    threshold_type: None,
                    resolve_threshold: None,
                    actions: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_create_addresses_by_project() {
        let mock = MockTransport::new();
        mock.on(Method::Post, RULES, HttpResponse::json(201, remote(100.0)));
        let client = client(&mock);
        let kind = MetricAlertKind::new(&client);

        let created = Reconciler::new(&kind, ctx()).create(&desired(100.0)).unwrap();
        assert_eq!(created.id, "acme/web/177104");

        let body = mock.requests()[0].body.clone().unwrap();
        assert_eq!(body["projects"], json!(["web"]));
        assert_eq!(body["triggers"][0]["actions"][0]["targetIdentifier"], "4502");
        assert!(body["triggers"][0].get("id").is_none());
    }

    #[test]
    fn test_trigger_order_preserved() {
        let remote: RemoteMetricAlert = serde_json::from_value(remote(100.0)).unwrap();
        let key = ProjectScopedKey::new("acme", "web", "177104");
        let state = MetricAlertKind::from_remote(&key, &remote).unwrap();

        let labels: Vec<_> = state.triggers.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["critical", "warning"]);
        assert_eq!(state.triggers[0].actions[0].target_identifier.as_deref(), Some("4502"));
    }

    #[test]
    fn test_unchanged_rule_issues_no_write() {
        let mock = MockTransport::new();
        mock.on(Method::Get, RULE, HttpResponse::json(200, remote(100.0)));
        let client = client(&mock);
        let kind = MetricAlertKind::new(&client);

        let applied = Reconciler::new(&kind, ctx())
            .update("acme/web/177104", &desired(100.0))
            .unwrap();
        assert_eq!(applied.action, Action::Unchanged);
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn test_threshold_change_updates_with_ids() {
        let mock = MockTransport::new();
        mock.on(Method::Get, RULE, HttpResponse::json(200, remote(100.0)));
        mock.on(Method::Put, RULE, HttpResponse::json(200, remote(250.0)));
        let client = client(&mock);
        let kind = MetricAlertKind::new(&client);

        let applied = Reconciler::new(&kind, ctx())
            .update("acme/web/177104", &desired(250.0))
            .unwrap();
        assert_eq!(applied.action, Action::Updated);
        assert!((applied.state.triggers[0].alert_threshold - 250.0).abs() < f64::EPSILON);

        let body = mock.requests()[1].body.clone().unwrap();
        assert_eq!(body["triggers"][0]["id"], "2");
        assert_eq!(body["triggers"][0]["actions"][0]["id"], "9");
        assert_eq!(body["dataset"], "events");
    }

    #[test]
    fn test_import_requires_three_segments() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let kind = MetricAlertKind::new(&client);

        let err = Reconciler::new(&kind, ctx())
            .import("acme/177104")
            .unwrap_err();
        assert!(matches!(err.root(), reconcile::Error::MalformedId { expected: 3, .. }));
        assert!(mock.requests().is_empty());
    }
}
