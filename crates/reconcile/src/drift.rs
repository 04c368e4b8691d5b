//! Drift detection
//!
//! The remote is always authoritative: a refresh returns exactly what was
//! fetched and never blends it with previously recorded state. The prior
//! state is only used to report which attributes moved.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// What a read found on the remote.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed<S> {
    /// The object exists; this is its canonical state
    Present(S),
    /// The object no longer exists and must be recreated
    Gone,
}

impl<S> Observed<S> {
    pub fn into_option(self) -> Option<S> {
        match self {
            Self::Present(state) => Some(state),
            Self::Gone => None,
        }
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone)
    }
}

/// Result of refreshing one instance against the remote
#[derive(Debug, Clone, PartialEq)]
pub struct Refresh<S> {
    /// Fresh canonical state, `None` when the object is gone
    pub state: Option<S>,
    /// Top-level attributes that differ from the prior state
    pub changed: Vec<String>,
}

impl<S> Refresh<S> {
    /// Whether the object has to be created again.
    pub fn must_recreate(&self) -> bool {
        self.state.is_none()
    }

    /// Whether anything moved since the prior state was recorded.
    pub fn has_drift(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Compare a freshly observed state with the previously recorded one.
///
/// Safe to call without a prior state (first import): nothing is reported
/// as changed and the observed state is returned as-is.
pub fn detect<S: Serialize>(prior: Option<&S>, observed: Observed<S>) -> Refresh<S> {
    match observed {
        Observed::Gone => Refresh {
            state: None,
            changed: Vec::new(),
        },
        Observed::Present(current) => {
            let changed = prior
                .map(|prior| changed_attributes(prior, &current))
                .unwrap_or_default();
            Refresh {
                state: Some(current),
                changed,
            }
        }
    }
}

/// Names of the top-level attributes whose values differ.
pub fn changed_attributes<S: Serialize>(before: &S, after: &S) -> Vec<String> {
    let before = serde_json::to_value(before).unwrap_or(Value::Null);
    let after = serde_json::to_value(after).unwrap_or(Value::Null);

    match (&before, &after) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            keys.into_iter()
                .filter(|k| a.get(*k).unwrap_or(&Value::Null) != b.get(*k).unwrap_or(&Value::Null))
                .cloned()
                .collect()
        }
        _ if before != after => vec!["(value)".to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Team {
        name: String,
        slug: Option<String>,
    }

    fn team(name: &str, slug: Option<&str>) -> Team {
        Team {
            name: name.to_string(),
            slug: slug.map(str::to_string),
        }
    }

    #[test]
    fn test_refresh_overwrites_prior() {
        let prior = team("old", Some("core"));
        let fresh = team("new", None);

        let refresh = detect(Some(&prior), Observed::Present(fresh.clone()));

        // Exactly what was fetched, never a blend
        assert_eq!(refresh.state, Some(fresh));
        assert_eq!(refresh.changed, vec!["name", "slug"]);
        assert!(refresh.has_drift());
    }

    #[test]
    fn test_refresh_without_prior() {
        let refresh = detect(None, Observed::Present(team("core", None)));
        assert_eq!(refresh.state, Some(team("core", None)));
        assert!(!refresh.has_drift());
        assert!(!refresh.must_recreate());
    }

    #[test]
    fn test_refresh_gone() {
        let prior = team("core", None);
        let refresh = detect(Some(&prior), Observed::Gone);
        assert!(refresh.must_recreate());
        assert!(refresh.state.is_none());
    }

    #[test]
    fn test_no_drift_when_equal() {
        let a = team("core", Some("core"));
        assert!(changed_attributes(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_changed_attributes_for_scalars() {
        assert_eq!(changed_attributes(&1, &2), vec!["(value)"]);
        assert!(changed_attributes(&1, &1).is_empty());
    }
}
