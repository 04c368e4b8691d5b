//! Resource kinds
//!
//! One module per kind. Each defines the kind's state, its remote and
//! payload shapes, and implements [`Gateway`](reconcile::Gateway),
//! [`Translator`](reconcile::Translator) and
//! [`ResourceKind`](reconcile::ResourceKind) for a small handle borrowing
//! the [`SentryClient`](crate::SentryClient).
//!
//! | Kind                       | Identifier                    |
//! |----------------------------|-------------------------------|
//! | `organization`             | `org`                         |
//! | `team`                     | `org/team-slug`               |
//! | `project`                  | `org/project-slug`            |
//! | `member`                   | `org/member-id`               |
//! | `dashboard`                | `org/dashboard-id`            |
//! | `code_mapping`             | `org/mapping-id`              |
//! | `repository_github`        | `org/repository-id`           |
//! | `metric_alert`             | `org/project-slug/alert-id`   |
//! | `plugin`                   | `org/project-slug/plugin-id`  |

pub mod code_mapping;
pub mod dashboard;
pub mod member;
pub mod metric_alert;
pub mod organization;
pub mod plugin;
pub mod project;
pub mod repository;
pub mod team;

pub use code_mapping::{CodeMappingKind, CodeMappingState};
pub use dashboard::{DashboardKind, DashboardState, Widget, WidgetQuery};
pub use member::{MemberKind, MemberState};
pub use metric_alert::{MetricAlertKind, MetricAlertState, Trigger, TriggerAction};
pub use organization::{OrganizationKind, OrganizationState};
pub use plugin::{PluginKind, PluginState};
pub use project::{ProjectKind, ProjectState};
pub use repository::{RepositoryKind, RepositoryState};
pub use team::{TeamKind, TeamState};

use serde::{Deserialize, Deserializer};

/// Use `desired` when set, else what the remote reports.
pub(crate) fn or_current<T: Clone>(desired: &Option<T>, current: &Option<T>) -> Option<T> {
    desired.clone().or_else(|| current.clone())
}

/// Names of the fields whose declared and current values differ.
pub(crate) fn fixed_fields(fields: &[(&'static str, &str, &str)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, desired, current)| desired != current)
        .map(|(name, ..)| *name)
        .collect()
}

/// Identifiers come back as strings from most endpoints and as numbers
/// from a few.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Optional variant of [`id_string`].
pub(crate) fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Number(n)) => Some(n.to_string()),
        None => None,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Ids {
        #[serde(deserialize_with = "id_string")]
        id: String,
        #[serde(default, deserialize_with = "opt_id_string")]
        other: Option<String>,
    }

    #[test]
    fn test_id_string_accepts_numbers() {
        let ids: Ids = serde_json::from_value(json!({"id": 42, "other": "7"})).unwrap();
        assert_eq!(ids.id, "42");
        assert_eq!(ids.other.as_deref(), Some("7"));

        let ids: Ids = serde_json::from_value(json!({"id": "42", "other": null})).unwrap();
        assert_eq!(ids.other, None);

        let ids: Ids = serde_json::from_value(json!({"id": "42"})).unwrap();
        assert_eq!(ids.other, None);
    }

    #[test]
    fn test_fixed_fields() {
        let changed = fixed_fields(&[
            ("organization", "acme", "acme"),
            ("team", "platform", "core-team"),
        ]);
        assert_eq!(changed, vec!["team"]);
        assert!(fixed_fields(&[]).is_empty());
    }

    #[test]
    fn test_or_current() {
        assert_eq!(or_current(&Some(1), &Some(2)), Some(1));
        assert_eq!(or_current(&None, &Some(2)), Some(2));
        assert_eq!(or_current::<u8>(&None, &None), None);
    }
}
