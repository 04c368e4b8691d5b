//! Registry of the resource kinds sentryctl manages
//!
//! [`ResourceType`] names a kind at runtime (CLI arguments, state file
//! entries). [`Managed`] ties a kind's reconciler implementation to its
//! manifest section, and [`KindVisitor`] turns the runtime name back into a
//! statically dispatched call.

use clap::ValueEnum;
use reconcile::ResourceKind;
use sentry_provider::{
    CodeMappingKind, DashboardKind, MemberKind, MetricAlertKind, OrganizationKind, PluginKind,
    ProjectKind, RepositoryKind, SentryClient, TeamKind,
};
use std::collections::BTreeMap;
use std::fmt;

use crate::manifest::Manifest;

/// Resource kinds, in the order they are created
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum ResourceType {
    Organization,
    Team,
    Project,
    Member,
    #[value(name = "repository_github")]
    RepositoryGithub,
    #[value(name = "code_mapping")]
    CodeMapping,
    Dashboard,
    #[value(name = "metric_alert")]
    MetricAlert,
    Plugin,
}

impl ResourceType {
    pub const ALL: [Self; 9] = [
        Self::Organization,
        Self::Team,
        Self::Project,
        Self::Member,
        Self::RepositoryGithub,
        Self::CodeMapping,
        Self::Dashboard,
        Self::MetricAlert,
        Self::Plugin,
    ];

    /// Name used in manifests, addresses and the state file
    pub const fn name(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Team => "team",
            Self::Project => "project",
            Self::Member => "member",
            Self::RepositoryGithub => "repository_github",
            Self::CodeMapping => "code_mapping",
            Self::Dashboard => "dashboard",
            Self::MetricAlert => "metric_alert",
            Self::Plugin => "plugin",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Execution stage for creates and updates; parents come first
    pub fn stage(self) -> u8 {
        Self::ALL.iter().position(|k| *k == self).unwrap_or(0) as u8
    }

    /// Execution stage for deletes: after every create and update,
    /// children before parents
    pub fn delete_stage(self) -> u8 {
        (Self::ALL.len() as u8) * 2 - 1 - self.stage()
    }

    /// Call `visitor` with the implementation of this kind
    pub fn visit<'c, V: KindVisitor<'c>>(self, visitor: &mut V) -> V::Output {
        match self {
            Self::Organization => visitor.visit::<OrganizationKind<'c>>(),
            Self::Team => visitor.visit::<TeamKind<'c>>(),
            Self::Project => visitor.visit::<ProjectKind<'c>>(),
            Self::Member => visitor.visit::<MemberKind<'c>>(),
            Self::RepositoryGithub => visitor.visit::<RepositoryKind<'c>>(),
            Self::CodeMapping => visitor.visit::<CodeMappingKind<'c>>(),
            Self::Dashboard => visitor.visit::<DashboardKind<'c>>(),
            Self::MetricAlert => visitor.visit::<MetricAlertKind<'c>>(),
            Self::Plugin => visitor.visit::<PluginKind<'c>>(),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Address of a declared instance, e.g. "team.core"
pub fn address(kind: ResourceType, name: &str) -> String {
    format!("{}.{name}", kind.name())
}

/// Split an address into its kind and local name
pub fn parse_address(address: &str) -> Option<(ResourceType, &str)> {
    let (kind, name) = address.split_once('.')?;
    if name.is_empty() {
        return None;
    }
    Some((ResourceType::from_name(kind)?, name))
}

/// A resource kind sentryctl can plan and apply
pub trait Managed<'c>: ResourceKind + Send + Sync + Sized + 'c {
    const TYPE: ResourceType;

    fn connect(client: &'c SentryClient) -> Self;

    /// Instances of this kind declared in `manifest`, by local name
    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State>;
}

/// Generic operation over one kind, selected at runtime by [`ResourceType::visit`]
pub trait KindVisitor<'c> {
    type Output;

    fn visit<K: Managed<'c>>(&mut self) -> Self::Output;
}

impl<'c> Managed<'c> for OrganizationKind<'c> {
    const TYPE: ResourceType = ResourceType::Organization;

    fn connect(client: &'c SentryClient) -> Self {
        Self::new(client)
    }

    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State> {
        &manifest.organization
    }
}

impl<'c> Managed<'c> for TeamKind<'c> {
    const TYPE: ResourceType = ResourceType::Team;

    fn connect(client: &'c SentryClient) -> Self {
        Self::new(client)
    }

    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State> {
        &manifest.team
    }
}

impl<'c> Managed<'c> for ProjectKind<'c> {
    const TYPE: ResourceType = ResourceType::Project;

    fn connect(client: &'c SentryClient) -> Self {
        Self::new(client)
    }

    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State> {
        &manifest.project
    }
}

impl<'c> Managed<'c> for MemberKind<'c> {
    const TYPE: ResourceType = ResourceType::Member;

    fn connect(client: &'c SentryClient) -> Self {
        Self::new(client)
    }

    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State> {
        &manifest.member
    }
}

impl<'c> Managed<'c> for RepositoryKind<'c> {
    const TYPE: ResourceType = ResourceType::RepositoryGithub;

    fn connect(client: &'c SentryClient) -> Self {
        Self::new(client)
    }

    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State> {
        &manifest.repository_github
    }
}

impl<'c> Managed<'c> for CodeMappingKind<'c> {
    const TYPE: ResourceType = ResourceType::CodeMapping;

    fn connect(client: &'c SentryClient) -> Self {
        Self::new(client)
    }

    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State> {
        &manifest.code_mapping
    }
}

impl<'c> Managed<'c> for DashboardKind<'c> {
    const TYPE: ResourceType = ResourceType::Dashboard;

    fn connect(client: &'c SentryClient) -> Self {
        Self::new(client)
    }

    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State> {
        &manifest.dashboard
    }
}

impl<'c> Managed<'c> for MetricAlertKind<'c> {
    const TYPE: ResourceType = ResourceType::MetricAlert;

    fn connect(client: &'c SentryClient) -> Self {
        Self::new(client)
    }

    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State> {
        &manifest.metric_alert
    }
}

impl<'c> Managed<'c> for PluginKind<'c> {
    const TYPE: ResourceType = ResourceType::Plugin;

    fn connect(client: &'c SentryClient) -> Self {
        Self::new(client)
    }

    fn declared(manifest: &Manifest) -> &BTreeMap<String, Self::State> {
        &manifest.plugin
    }
}
