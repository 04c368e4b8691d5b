//! Planning - compare the manifest and the tracked state with Sentry
//!
//! A plan is a list of [`PlanEntry`] for display plus one
//! [`Change`] per entry that needs a write. Changes carry their kind's
//! stage, so the executor creates parents before children and deletes
//! children before parents.

use anyhow::{Context, Result};
use colored::Colorize;
use reconcile::{
    Action, ApplyResult, BoxedChange, CallContext, Change, Deletion, Pending, Reconciler,
};
use sentry_provider::SentryClient;

use crate::kinds::{KindVisitor, Managed, ResourceType, address, parse_address};
use crate::manifest::Manifest;
use crate::state::StateFile;

/// What a plan will do to one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    /// Attributes that differ
    Update(Vec<String>),
    /// Tracked object disappeared remotely
    Recreate,
    Delete,
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub address: String,
    pub kind: ResourceType,
    /// Tracked identifier, if any
    pub id: Option<String>,
    pub action: PlanAction,
}

/// Whether to converge on the manifest or tear everything down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Converge,
    Destroy,
}

pub struct Plan<'c> {
    pub entries: Vec<PlanEntry>,
    pub changes: Vec<BoxedChange<'c>>,
}

impl Plan<'_> {
    /// Number of entries that write
    pub fn pending(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Build a plan over every kind.
///
/// Reads every tracked object once through `ctx`.
pub fn build<'c>(
    client: &'c SentryClient,
    manifest: &Manifest,
    state: &StateFile,
    ctx: CallContext,
    mode: Mode,
) -> Result<Plan<'c>> {
    let mut planner = Planner {
        client,
        manifest,
        state,
        ctx,
        mode,
    };

    let mut plan = Plan {
        entries: Vec::new(),
        changes: Vec::new(),
    };
    for kind in ResourceType::ALL {
        for (entry, change) in kind.visit(&mut planner)? {
            plan.entries.push(entry);
            plan.changes.extend(change);
        }
    }

    log::debug!(
        "planned {} entries, {} change(s)",
        plan.entries.len(),
        plan.changes.len()
    );
    Ok(plan)
}

struct Planner<'c, 'm> {
    client: &'c SentryClient,
    manifest: &'m Manifest,
    state: &'m StateFile,
    ctx: CallContext,
    mode: Mode,
}

type Planned<'c> = Vec<(PlanEntry, Option<BoxedChange<'c>>)>;

impl<'c> KindVisitor<'c> for Planner<'c, '_> {
    type Output = Result<Planned<'c>>;

    fn visit<K: Managed<'c>>(&mut self) -> Self::Output {
        let mut planned: Planned<'c> = Vec::new();
        let kind = K::connect(self.client);

        if self.mode == Mode::Converge {
            for (name, desired) in K::declared(self.manifest) {
                let addr = address(K::TYPE, name);
                let tracked = self.state.get(&addr).filter(|t| t.kind == K::NAME);

                let Some(tracked) = tracked else {
                    let change = self.change::<K>(&addr, Op::Create(desired.clone()));
                    planned.push((entry::<K>(&addr, None, PlanAction::Create), Some(change)));
                    continue;
                };

                let pending = Reconciler::new(&kind, self.ctx)
                    .plan(&tracked.id, desired)
                    .with_context(|| format!("Failed to plan {addr}"))?;
                let id = Some(tracked.id.clone());
                match pending {
                    Pending::UpToDate => {
                        planned.push((entry::<K>(&addr, id, PlanAction::NoOp), None));
                    }
                    Pending::Update(attributes) => {
                        let op = Op::Update {
                            id: tracked.id.clone(),
                            desired: desired.clone(),
                        };
                        let action = PlanAction::Update(attributes);
                        let change = self.change::<K>(&addr, op);
                        planned.push((entry::<K>(&addr, id, action), Some(change)));
                    }
                    Pending::Recreate => {
                        let change = self.change::<K>(&addr, Op::Create(desired.clone()));
                        planned.push((entry::<K>(&addr, id, PlanAction::Recreate), Some(change)));
                    }
                }
            }
        }

        let declared = K::declared(self.manifest);
        for (addr, tracked) in self.state.of_kind(K::NAME) {
            let still_declared = parse_address(addr)
                .is_some_and(|(_, name)| declared.contains_key(name));
            if self.mode == Mode::Converge && still_declared {
                continue;
            }

            let op = Op::Delete {
                id: tracked.id.clone(),
            };
            let change = self.change::<K>(addr, op);
            let id = Some(tracked.id.clone());
            planned.push((entry::<K>(addr, id, PlanAction::Delete), Some(change)));
        }

        Ok(planned)
    }
}

impl<'c> Planner<'c, '_> {
    fn change<K: Managed<'c>>(&self, address: &str, op: Op<K::State>) -> BoxedChange<'c> {
        Box::new(KindChange {
            kind: K::connect(self.client),
            address: address.to_string(),
            op,
        })
    }
}

fn entry<'c, K: Managed<'c>>(address: &str, id: Option<String>, action: PlanAction) -> PlanEntry {
    PlanEntry {
        address: address.to_string(),
        kind: K::TYPE,
        id,
        action,
    }
}

enum Op<S> {
    Create(S),
    Update { id: String, desired: S },
    Delete { id: String },
}

/// One write against one instance of kind `K`
struct KindChange<K: reconcile::Translator> {
    kind: K,
    address: String,
    op: Op<K::State>,
}

impl<'c, K: Managed<'c>> Change for KindChange<K> {
    fn address(&self) -> &str {
        &self.address
    }

    fn description(&self) -> String {
        match &self.op {
            Op::Create(_) => format!("create {}", K::NAME),
            Op::Update { id, .. } => format!("update {} {id}", K::NAME),
            Op::Delete { id } => format!("delete {} {id}", K::NAME),
        }
    }

    fn stage(&self) -> u8 {
        match self.op {
            Op::Delete { .. } => K::TYPE.delete_stage(),
            _ => K::TYPE.stage(),
        }
    }

    fn apply(&self, ctx: &CallContext) -> reconcile::Result<ApplyResult> {
        let reconciler = Reconciler::new(&self.kind, *ctx);
        match &self.op {
            Op::Create(desired) => {
                let applied = reconciler.create(desired)?;
                Ok(ApplyResult::Created { id: applied.id })
            }
            Op::Update { id, desired } => {
                let applied = reconciler.update(id, desired)?;
                Ok(match applied.action {
                    Action::Unchanged => ApplyResult::Unchanged { id: applied.id },
                    _ => ApplyResult::Updated { id: applied.id },
                })
            }
            Op::Delete { id } => Ok(match reconciler.delete(id)? {
                Deletion::Deleted => ApplyResult::Deleted,
                Deletion::AlreadyAbsent => ApplyResult::AlreadyAbsent,
            }),
        }
    }
}

/// Print a plan grouped by kind; `show_unchanged` also lists up-to-date entries
pub fn display(plan: &Plan<'_>, show_unchanged: bool) {
    if plan.is_empty() && (!show_unchanged || plan.entries.is_empty()) {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Plan".bold()
    );
    println!("│");

    for kind in ResourceType::ALL {
        let entries: Vec<&PlanEntry> = plan
            .entries
            .iter()
            .filter(|e| e.kind == kind && (show_unchanged || e.action != PlanAction::NoOp))
            .collect();
        if entries.is_empty() {
            continue;
        }

        println!("│ {}", kind.name().bold());
        for entry in entries {
            let (symbol, detail) = match &entry.action {
                PlanAction::Create => ("+".green(), "(new)".to_string()),
                PlanAction::Recreate => ("+".green(), "(gone remotely, will recreate)".to_string()),
                PlanAction::Update(attributes) => ("~".yellow(), attributes.join(", ")),
                PlanAction::Delete => ("-".red(), "(will delete)".to_string()),
                PlanAction::NoOp => (" ".normal(), "(up to date)".to_string()),
            };
            println!("│   {} {:<30} {}", symbol, entry.address, detail.dimmed());
        }
        println!("│");
    }

    let count = |f: fn(&PlanAction) -> bool| plan.entries.iter().filter(|e| f(&e.action)).count();
    let create = count(|a| matches!(a, PlanAction::Create | PlanAction::Recreate));
    let update = count(|a| matches!(a, PlanAction::Update(_)));
    let delete = count(|a| matches!(a, PlanAction::Delete));

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to delete",
        create.to_string().green(),
        update.to_string().yellow(),
        delete.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{ExecuteOptions, RetryConfig, execute_simple};
    use sentry_provider::{HttpResponse, Method, MockTransport, ProviderConfig};
    use serde_json::json;
    use std::time::Duration;

    const TEAM: &str = "0/teams/acme/core-team/";
    const TEAMS: &str = "0/organizations/acme/teams/";

    fn client(mock: &MockTransport) -> SentryClient {
        let config = ProviderConfig::builder()
            .token("test-token")
            .base_url("https://sentry.io/api/")
            .retry(RetryConfig {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                backoff_factor: 1.0,
                max_delay: Duration::from_millis(1),
            })
            .build_with_env(|_| None)
            .unwrap();
        SentryClient::with_transport(config, mock.clone())
    }

    fn core_team(name: &str) -> serde_json::Value {
        json!({"id": "4502", "slug": "core-team", "name": name})
    }

    fn manifest(name: &str) -> Manifest {
        Manifest::parse(&format!(
            "[team.core]\norganization = \"acme\"\nname = \"{name}\"\n"
        ))
        .unwrap()
    }

    fn tracked() -> StateFile {
        let mut state = StateFile::default();
        state.track("team.core", "team", "acme/core-team");
        state
    }

    fn converge<'c>(client: &'c SentryClient, manifest: &Manifest, state: &StateFile) -> Plan<'c> {
        build(client, manifest, state, CallContext::unbounded(), Mode::Converge).unwrap()
    }

    #[test]
    fn test_untracked_is_created() {
        let mock = MockTransport::new();
        mock.on(Method::Post, TEAMS, HttpResponse::json(201, core_team("core-team")));
        let client = client(&mock);

        let plan = converge(&client, &manifest("core-team"), &StateFile::default());
        assert_eq!(plan.entries[0].action, PlanAction::Create);
        assert_eq!(plan.entries[0].id, None);
        assert_eq!(plan.pending(), 1);
        assert_eq!(mock.requests().len(), 0);

        let report = execute_simple(plan.changes, &ExecuteOptions::default()).unwrap();
        assert_eq!(
            report.results,
            vec![(
                "team.core".to_string(),
                ApplyResult::Created {
                    id: "acme/core-team".to_string()
                }
            )]
        );
    }

    #[test]
    fn test_matching_remote_is_noop() {
        let mock = MockTransport::new();
        mock.on(Method::Get, TEAM, HttpResponse::json(200, core_team("core-team")));
        let client = client(&mock);

        let plan = converge(&client, &manifest("core-team"), &tracked());
        assert_eq!(plan.entries[0].action, PlanAction::NoOp);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_drift_is_update() {
        let mock = MockTransport::new();
        mock.on(Method::Get, TEAM, HttpResponse::json(200, core_team("Core")));
        mock.on(Method::Put, TEAM, HttpResponse::json(200, core_team("core-team")));
        let client = client(&mock);

        let plan = converge(&client, &manifest("core-team"), &tracked());
        assert_eq!(
            plan.entries[0].action,
            PlanAction::Update(vec!["name".to_string()])
        );

        let report = execute_simple(plan.changes, &ExecuteOptions::default()).unwrap();
        assert_eq!(report.summary.updated, 1);
        assert_eq!(mock.request_count(Method::Put, TEAM), 1);
    }

    #[test]
    fn test_vanished_is_recreated() {
        let mock = MockTransport::new();
        let client = client(&mock);

        let plan = converge(&client, &manifest("core-team"), &tracked());
        assert_eq!(plan.entries[0].action, PlanAction::Recreate);
        assert_eq!(plan.changes[0].stage(), ResourceType::Team.stage());
    }

    #[test]
    fn test_undeclared_is_deleted_last() {
        let mock = MockTransport::new();
        let client = client(&mock);

        let plan = converge(&client, &Manifest::default(), &tracked());
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].action, PlanAction::Delete);
        assert_eq!(plan.changes[0].stage(), ResourceType::Team.delete_stage());

        // Already gone remotely
        let report = execute_simple(plan.changes, &ExecuteOptions::default()).unwrap();
        assert_eq!(report.results[0].1, ApplyResult::AlreadyAbsent);
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn test_destroy_deletes_declared_too() {
        let mock = MockTransport::new();
        mock.on(Method::Get, TEAM, HttpResponse::json(200, core_team("core-team")));
        mock.on(Method::Delete, TEAM, HttpResponse::empty(204));
        let client = client(&mock);

        let plan = build(
            &client,
            &manifest("core-team"),
            &tracked(),
            CallContext::unbounded(),
            Mode::Destroy,
        )
        .unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].action, PlanAction::Delete);

        let report = execute_simple(plan.changes, &ExecuteOptions::default()).unwrap();
        assert_eq!(report.results[0].1, ApplyResult::Deleted);
    }

    #[test]
    fn test_moving_to_another_organization_is_refused() {
        let mock = MockTransport::new();
        mock.on(Method::Get, TEAM, HttpResponse::json(200, core_team("core-team")));
        let client = client(&mock);

        let moved =
            Manifest::parse("[team.core]\norganization = \"globex\"\nname = \"core-team\"\n")
                .unwrap();
        let err = build(&client, &moved, &tracked(), CallContext::unbounded(), Mode::Converge)
            .err()
            .unwrap();
        let message = format!("{err:#}");
        assert!(message.contains("team.core"));
        assert!(message.contains("cannot change organization"));
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn test_read_failure_names_address() {
        let mock = MockTransport::new();
        mock.on(Method::Get, TEAM, HttpResponse::json(403, json!({"detail": "forbidden"})));
        let client = client(&mock);

        let err = build(
            &client,
            &manifest("core-team"),
            &tracked(),
            CallContext::unbounded(),
            Mode::Converge,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("team.core"));
    }
}
