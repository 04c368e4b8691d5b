//! The reconciliation state machine
//!
//! A [`Reconciler`] drives one resource instance through
//! `Absent -> Creating -> Present -> Updating/Deleting -> Present/Absent`,
//! issuing gateway calls one at a time. Calls made with an existing
//! identifier start in `Present`; `create` starts in `Absent`.

use crate::context::CallContext;
use crate::drift::{self, Observed, Refresh};
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::id::CompositeKey;
use crate::resource::ResourceKind;

/// Lifecycle phase of one instance during a reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl Phase {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Present)
                | (Creating, Absent)
                | (Present, Present)
                | (Present, Updating)
                | (Updating, Present)
                | (Present, Deleting)
                | (Deleting, Absent)
                | (Deleting, Present)
                | (Present, Absent)
        )
    }

    /// Whether a call may end in this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Present | Phase::Absent)
    }
}

/// What a write-path call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Unchanged,
    Imported,
}

impl Action {
    /// Whether the remote was written to.
    pub fn is_write(self) -> bool {
        matches!(self, Action::Created | Action::Updated)
    }
}

/// Outcome of create, update, and import.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<S> {
    /// Encoded composite identifier to persist
    pub id: String,
    /// Canonical state after the call
    pub state: S,
    pub action: Action,
}

/// Outcome of delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// Nothing to delete; no request was issued
    AlreadyAbsent,
}

/// What [`Reconciler::update`] would do, computed without writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    UpToDate,
    /// Top-level attributes that would be written
    Update(Vec<String>),
    /// The object is gone and has to be created again
    Recreate,
}

/// Tracks and logs the phase of the instance being reconciled.
struct Machine {
    kind: &'static str,
    id: String,
    phase: Phase,
}

impl Machine {
    fn start(kind: &'static str, id: impl Into<String>, phase: Phase) -> Self {
        Self {
            kind,
            id: id.into(),
            phase,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.phase,
            next
        );
        log::debug!("{} {}: {:?} -> {:?}", self.kind, self.id, self.phase, next);
        self.phase = next;
    }

    fn fail(&mut self, fallback: Phase, err: Error) -> Error {
        self.advance(fallback);
        err.in_resource(self.kind, self.id.clone())
    }
}

/// Drives create/read/update/delete/import for one resource kind.
///
/// Generic over the kind, so every kind gets the same state machine through
/// static dispatch.
pub struct Reconciler<'k, K> {
    kind: &'k K,
    ctx: CallContext,
}

impl<'k, K: ResourceKind> Reconciler<'k, K> {
    pub fn new(kind: &'k K, ctx: CallContext) -> Self {
        Self { kind, ctx }
    }

    /// Create a new remote object from `desired`.
    pub fn create(&self, desired: &K::State) -> Result<Applied<K::State>> {
        let mut machine = Machine::start(K::NAME, "(new)", Phase::Absent);
        machine.advance(Phase::Creating);

        let parent = K::parent_of(desired);
        let payload = K::to_payload(desired);
        let remote = match self.kind.create(&self.ctx, &parent, &payload) {
            Ok(remote) => remote,
            Err(e) => return Err(machine.fail(Phase::Absent, e)),
        };

        let (id, state) = self.identify(&parent, &remote).inspect_err(|e| {
            log::warn!(
                "{} was created but its response could not be read ({e}); import it to track it",
                K::NAME
            );
        })?;
        machine.id.clone_from(&id);
        machine.advance(Phase::Present);

        Ok(Applied {
            id,
            state,
            action: Action::Created,
        })
    }

    /// Fetch the current canonical state of `id`.
    pub fn read(&self, id: &str) -> Result<Observed<K::State>> {
        let key = decode::<K>(id)?;
        let mut machine = Machine::start(K::NAME, id, Phase::Present);

        match self.kind.fetch(&self.ctx, &key) {
            Ok(Some(remote)) => {
                let state =
                    K::from_remote(&key, &remote).map_err(|e| e.in_resource(K::NAME, id))?;
                machine.advance(Phase::Present);
                Ok(Observed::Present(state))
            }
            Ok(None) => {
                machine.advance(Phase::Absent);
                Ok(Observed::Gone)
            }
            Err(e) => Err(e.in_resource(K::NAME, id)),
        }
    }

    /// Read `id` and report drift against the previously recorded state.
    pub fn refresh(&self, id: &str, prior: Option<&K::State>) -> Result<Refresh<K::State>> {
        Ok(drift::detect(prior, self.read(id)?))
    }

    /// Converge `id` towards `desired`.
    ///
    /// Issues no write when the computed payload equals the payload of the
    /// current remote state.
    pub fn update(&self, id: &str, desired: &K::State) -> Result<Applied<K::State>> {
        let key = decode::<K>(id)?;
        let mut machine = Machine::start(K::NAME, id, Phase::Present);

        let current = self.current(&key, id)?;
        ensure_writable::<K>(desired, &current, id)?;
        let wanted = K::to_payload(&K::apply_defaults(desired, &current));
        if wanted == K::to_payload(&current) {
            log::debug!("{} {id}: up to date", K::NAME);
            return Ok(Applied {
                id: id.to_string(),
                state: current,
                action: Action::Unchanged,
            });
        }

        machine.advance(Phase::Updating);
        let remote = match self.kind.update(&self.ctx, &key, &wanted) {
            Ok(remote) => remote,
            Err(e) => return Err(machine.fail(Phase::Present, e)),
        };

        let (new_id, state) = self.identify(&K::parent_of(desired), &remote)?;
        machine.advance(Phase::Present);
        if new_id != id {
            log::info!("{} {id} is now addressed as {new_id}", K::NAME);
        }

        Ok(Applied {
            id: new_id,
            state,
            action: Action::Updated,
        })
    }

    /// Preview [`Reconciler::update`] for `id`. Only reads.
    pub fn plan(&self, id: &str, desired: &K::State) -> Result<Pending> {
        let Observed::Present(current) = self.read(id)? else {
            return Ok(Pending::Recreate);
        };
        ensure_writable::<K>(desired, &current, id)?;

        let filled = K::apply_defaults(desired, &current);
        if K::to_payload(&filled) == K::to_payload(&current) {
            return Ok(Pending::UpToDate);
        }
        Ok(Pending::Update(drift::changed_attributes(&current, &filled)))
    }

    /// Delete `id`. An object that is already gone is a success and no
    /// delete request is issued.
    pub fn delete(&self, id: &str) -> Result<Deletion> {
        let key = decode::<K>(id)?;
        let mut machine = Machine::start(K::NAME, id, Phase::Present);

        let exists = self
            .kind
            .fetch(&self.ctx, &key)
            .map_err(|e| e.in_resource(K::NAME, id))?
            .is_some();
        if !exists {
            machine.advance(Phase::Absent);
            log::debug!("{} {id}: already absent", K::NAME);
            return Ok(Deletion::AlreadyAbsent);
        }

        machine.advance(Phase::Deleting);
        if let Err(e) = self.kind.delete(&self.ctx, &key) {
            return Err(machine.fail(Phase::Present, e));
        }
        machine.advance(Phase::Absent);

        Ok(Deletion::Deleted)
    }

    /// Attach to an existing remote object by its raw identifier.
    pub fn import(&self, raw_id: &str) -> Result<Applied<K::State>> {
        let raw_id = raw_id.trim();
        let key = decode::<K>(raw_id)?;
        let mut machine = Machine::start(K::NAME, raw_id, Phase::Present);

        let remote = self
            .kind
            .fetch(&self.ctx, &key)
            .map_err(|e| e.in_resource(K::NAME, raw_id))?
            .ok_or_else(|| Error::NotFound {
                kind: K::NAME,
                id: raw_id.to_string(),
            })?;

        let state = K::from_remote(&key, &remote).map_err(|e| e.in_resource(K::NAME, raw_id))?;
        let id = K::key_of(&K::parent_of(&state), &remote)
            .and_then(|k| k.encode())
            .map_err(|e| e.in_resource(K::NAME, raw_id))?;
        machine.advance(Phase::Present);

        Ok(Applied {
            id,
            state,
            action: Action::Imported,
        })
    }

    /// Current state of an object that must exist.
    fn current(&self, key: &K::Key, id: &str) -> Result<K::State> {
        let remote = self
            .kind
            .fetch(&self.ctx, key)
            .map_err(|e| e.in_resource(K::NAME, id))?
            .ok_or_else(|| Error::NotFound {
                kind: K::NAME,
                id: id.to_string(),
            })?;
        K::from_remote(key, &remote).map_err(|e| e.in_resource(K::NAME, id))
    }

    /// Encoded identifier and canonical state of a remote object.
    fn identify(&self, parent: &K::Parent, remote: &K::Remote) -> Result<(String, K::State)> {
        let key = K::key_of(parent, remote).map_err(|e| e.in_resource(K::NAME, "(new)"))?;
        let id = key.encode().map_err(|e| e.in_resource(K::NAME, "(new)"))?;
        let state = K::from_remote(&key, remote).map_err(|e| e.in_resource(K::NAME, &id))?;
        Ok((id, state))
    }
}

/// Fail when `desired` changes attributes an update cannot write.
fn ensure_writable<K: ResourceKind>(
    desired: &K::State,
    current: &K::State,
    id: &str,
) -> Result<()> {
    let attributes = K::fixed_changes(desired, current);
    if attributes.is_empty() {
        return Ok(());
    }
    Err(Error::Immutable {
        kind: K::NAME,
        attributes,
    }
    .in_resource(K::NAME, id))
}

fn decode<K: ResourceKind>(id: &str) -> Result<K::Key> {
    <K as Gateway>::Key::decode(id).map_err(|e| e.in_resource(K::NAME, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Cursor, Page};
    use crate::id::{OrgKey, OrgScopedKey};
    use crate::translator::Translator;
    use serde::{Deserialize, Serialize};
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TeamState {
        organization: String,
        name: String,
        slug: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct TeamPayload {
        name: String,
        slug: Option<String>,
    }

    #[derive(Debug, Clone)]
    struct RemoteTeam {
        slug: String,
        name: String,
    }

    /// In-memory team store counting write calls.
    #[derive(Default)]
    struct FakeTeams {
        teams: RefCell<BTreeMap<String, RemoteTeam>>,
        writes: Cell<usize>,
        fail_create: Cell<bool>,
    }

    impl FakeTeams {
        fn slugify(name: &str) -> String {
            name.to_lowercase().replace(' ', "-")
        }
    }

    impl Gateway for FakeTeams {
        type Key = OrgScopedKey;
        type Parent = OrgKey;
        type Remote = RemoteTeam;
        type Payload = TeamPayload;

        fn fetch(&self, _: &CallContext, key: &OrgScopedKey) -> Result<Option<RemoteTeam>> {
            Ok(self.teams.borrow().get(&key.key).cloned())
        }

        fn list(
            &self,
            _: &CallContext,
            _: &OrgKey,
            _: Option<&Cursor>,
        ) -> Result<Page<RemoteTeam>> {
            Ok(Page::last(self.teams.borrow().values().cloned().collect()))
        }

        fn create(
            &self,
            _: &CallContext,
            _: &OrgKey,
            payload: &TeamPayload,
        ) -> Result<RemoteTeam> {
            if self.fail_create.get() {
                return Err(Error::remote(400, "{\"slug\":[\"taken\"]}"));
            }
            self.writes.set(self.writes.get() + 1);
            let team = RemoteTeam {
                slug: payload
                    .slug
                    .clone()
                    .unwrap_or_else(|| Self::slugify(&payload.name)),
                name: payload.name.clone(),
            };
            self.teams
                .borrow_mut()
                .insert(team.slug.clone(), team.clone());
            Ok(team)
        }

        fn update(
            &self,
            _: &CallContext,
            key: &OrgScopedKey,
            payload: &TeamPayload,
        ) -> Result<RemoteTeam> {
            self.writes.set(self.writes.get() + 1);
            let mut teams = self.teams.borrow_mut();
            teams.remove(&key.key);
            let team = RemoteTeam {
                slug: payload.slug.clone().unwrap_or_else(|| key.key.clone()),
                name: payload.name.clone(),
            };
            teams.insert(team.slug.clone(), team.clone());
            Ok(team)
        }

        fn delete(&self, _: &CallContext, key: &OrgScopedKey) -> Result<()> {
            self.writes.set(self.writes.get() + 1);
            self.teams.borrow_mut().remove(&key.key);
            Ok(())
        }
    }

    impl Translator for FakeTeams {
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
                slug: desired.slug.clone().or_else(|| current.slug.clone()),
                ..desired.clone()
            }
        }

        fn fixed_changes(desired: &TeamState, current: &TeamState) -> Vec<&'static str> {
            if desired.organization == current.organization {
                Vec::new()
            } else {
                vec!["organization"]
            }
        }
    }

    impl ResourceKind for FakeTeams {
        const NAME: &'static str = "team";

        fn parent_of(desired: &TeamState) -> OrgKey {
            OrgKey::new(desired.organization.clone())
        }

        fn key_of(parent: &OrgKey, remote: &RemoteTeam) -> Result<OrgScopedKey> {
            Ok(OrgScopedKey::new(parent.organization.clone(), remote.slug.clone()))
        }
    }

    fn desired(name: &str) -> TeamState {
        TeamState {
            organization: "acme".to_string(),
            name: name.to_string(),
            slug: None,
        }
    }

    fn reconciler(teams: &FakeTeams) -> Reconciler<'_, FakeTeams> {
        Reconciler::new(teams, CallContext::unbounded())
    }

    #[test]
    fn test_phase_transitions() {
        assert!(Phase::Absent.can_transition_to(Phase::Creating));
        assert!(Phase::Present.can_transition_to(Phase::Absent));
        assert!(!Phase::Absent.can_transition_to(Phase::Updating));
        assert!(!Phase::Absent.can_transition_to(Phase::Deleting));
        assert!(!Phase::Updating.can_transition_to(Phase::Absent));
        assert!(Phase::Present.is_terminal());
        assert!(!Phase::Creating.is_terminal());
    }

    #[test]
    fn test_create_read_delete_example() {
        let teams = FakeTeams::default();
        let r = reconciler(&teams);

        let created = r.create(&desired("core-team")).unwrap();
        assert_eq!(created.id, "acme/core-team");
        assert_eq!(created.action, Action::Created);

        let read = r.read(&created.id).unwrap();
        let state = read.into_option().unwrap();
        assert_eq!(state.name, "core-team");

        assert_eq!(r.delete(&created.id).unwrap(), Deletion::Deleted);
        let writes = teams.writes.get();
        assert_eq!(r.delete(&created.id).unwrap(), Deletion::AlreadyAbsent);
        assert_eq!(teams.writes.get(), writes);
    }

    #[test]
    fn test_update_is_idempotent() {
        let teams = FakeTeams::default();
        let r = reconciler(&teams);
        let created = r.create(&desired("core")).unwrap();

        let writes = teams.writes.get();
        let first = r.update(&created.id, &desired("core")).unwrap();
        let second = r.update(&created.id, &desired("core")).unwrap();

        assert_eq!(first.action, Action::Unchanged);
        assert_eq!(second.action, Action::Unchanged);
        assert_eq!(teams.writes.get(), writes);
    }

    #[test]
    fn test_update_writes_once_on_change() {
        let teams = FakeTeams::default();
        let r = reconciler(&teams);
        let created = r.create(&desired("core")).unwrap();

        let renamed = TeamState {
            name: "Core Team".to_string(),
            ..desired("core")
        };
        let writes = teams.writes.get();
        let updated = r.update(&created.id, &renamed).unwrap();
        assert_eq!(updated.action, Action::Updated);
        assert_eq!(updated.state.name, "Core Team");
        assert_eq!(updated.id, "acme/core");

        let again = r.update(&updated.id, &renamed).unwrap();
        assert_eq!(again.action, Action::Unchanged);
        assert_eq!(teams.writes.get(), writes + 1);
    }

    #[test]
    fn test_plan_matches_update() {
        let teams = FakeTeams::default();
        let r = reconciler(&teams);
        let created = r.create(&desired("core")).unwrap();
        let writes = teams.writes.get();

        assert_eq!(r.plan(&created.id, &desired("core")).unwrap(), Pending::UpToDate);

        let renamed = TeamState {
            name: "Core Team".to_string(),
            ..desired("core")
        };
        assert_eq!(
            r.plan(&created.id, &renamed).unwrap(),
            Pending::Update(vec!["name".to_string()])
        );
        assert_eq!(r.plan("acme/ghost", &renamed).unwrap(), Pending::Recreate);
        assert_eq!(teams.writes.get(), writes);
    }

    #[test]
    fn test_fixed_attribute_change_is_refused() {
        let teams = FakeTeams::default();
        let r = reconciler(&teams);
        let created = r.create(&desired("core")).unwrap();

        let moved = TeamState {
            organization: "globex".to_string(),
            ..desired("core")
        };
        let writes = teams.writes.get();
        for _ in 0..2 {
            let err = r.update(&created.id, &moved).unwrap_err();
            assert!(matches!(
                err.root(),
                Error::Immutable { attributes, .. } if attributes == &["organization"]
            ));
        }
        let err = r.plan(&created.id, &moved).unwrap_err();
        assert!(err.to_string().contains("cannot change organization"));
        assert_eq!(teams.writes.get(), writes);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let teams = FakeTeams::default();
        let err = reconciler(&teams)
            .update("acme/ghost", &desired("ghost"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("acme/ghost"));
    }

    #[test]
    fn test_read_gone_signals_recreate() {
        let teams = FakeTeams::default();
        let refresh = reconciler(&teams).refresh("acme/ghost", None).unwrap();
        assert!(refresh.must_recreate());
    }

    #[test]
    fn test_read_returns_remote_over_prior() {
        let teams = FakeTeams::default();
        let r = reconciler(&teams);
        let created = r.create(&desired("core")).unwrap();
        teams.teams.borrow_mut().get_mut("core").unwrap().name = "Renamed".to_string();

        let refresh = r.refresh(&created.id, Some(&created.state)).unwrap();
        assert_eq!(refresh.state.unwrap().name, "Renamed");
        assert_eq!(refresh.changed, vec!["name"]);
    }

    #[test]
    fn test_create_failure_surfaces_context() {
        let teams = FakeTeams::default();
        teams.fail_create.set(true);
        let err = reconciler(&teams).create(&desired("core")).unwrap_err();
        assert!(matches!(err.root(), Error::Remote { status: 400, .. }));
        assert!(err.to_string().starts_with("team (new)"));
    }

    #[test]
    fn test_import() {
        let teams = FakeTeams::default();
        let r = reconciler(&teams);
        r.create(&desired("core")).unwrap();

        let imported = r.import(" acme/core ").unwrap();
        assert_eq!(imported.id, "acme/core");
        assert_eq!(imported.action, Action::Imported);
        assert_eq!(imported.state.slug.as_deref(), Some("core"));

        assert!(r.import("acme/ghost").unwrap_err().is_not_found());
        assert!(matches!(
            r.import("acme").unwrap_err().root(),
            Error::MalformedId { .. }
        ));
    }

    #[test]
    fn test_invalid_id_never_reaches_gateway() {
        let teams = FakeTeams::default();
        let err = reconciler(&teams).delete("").unwrap_err();
        assert!(matches!(err.root(), Error::EmptyId));
        assert_eq!(teams.writes.get(), 0);
    }
}
