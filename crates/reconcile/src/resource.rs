//! Resource kind trait
//!
//! A resource kind ties a [`Gateway`](crate::Gateway) and a
//! [`Translator`] together with the two facts the reconciler needs to
//! address objects: where a declared instance is created, and which key a
//! created object ends up under.

use crate::error::Result;
use crate::translator::Translator;

/// Core trait for every reconcilable resource kind
///
/// Every kind implements this trait, which provides:
/// - A stable kind name used in diagnostics and state files
/// - The parent a declared instance is created under
/// - The composite key of a remote object
///
/// Create/read/update/delete/import are then provided by
/// [`Reconciler`](crate::Reconciler).
pub trait ResourceKind: Translator {
    /// Kind name, e.g. "team" or "metric_alert".
    const NAME: &'static str;

    /// Where `desired` gets created.
    fn parent_of(desired: &Self::State) -> Self::Parent;

    /// Key of a remote object created or listed under `parent`.
    fn key_of(parent: &Self::Parent, remote: &Self::Remote) -> Result<Self::Key>;
}
