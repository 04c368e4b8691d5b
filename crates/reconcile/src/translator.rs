//! State translation between declared configuration and remote payloads

use crate::error::Result;
use crate::gateway::Gateway;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// Maps between a kind's state shape and its remote API shapes.
///
/// The same `State` type serves as Desired State (what the user declares)
/// and Canonical State (what the remote reports), so a canonical state can
/// always be fed back as desired state. Translating a remote object into
/// state and back into a payload must not lose any managed field.
pub trait Translator: Gateway {
    /// Declared and canonical attributes of one instance.
    type State: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync;

    /// Build the request body for `state`. Pure and total.
    fn to_payload(state: &Self::State) -> Self::Payload;

    /// Normalize a remote object.
    ///
    /// Fails with [`crate::Error::UnexpectedShape`] only when the remote
    /// omitted something the kind requires.
    fn from_remote(key: &Self::Key, remote: &Self::Remote) -> Result<Self::State>;

    /// Fill fields left unset in `desired` with what the remote reports.
    ///
    /// Used before comparing payloads so server-assigned defaults for omitted
    /// optional fields do not count as drift. The default keeps `desired`
    /// as declared.
    fn apply_defaults(desired: &Self::State, current: &Self::State) -> Self::State {
        let _ = current;
        desired.clone()
    }

    /// Attributes where `desired` and `current` differ but which an update
    /// cannot write. Updates refuse to run while any are reported.
    fn fixed_changes(desired: &Self::State, current: &Self::State) -> Vec<&'static str> {
        let _ = (desired, current);
        Vec::new()
    }
}
