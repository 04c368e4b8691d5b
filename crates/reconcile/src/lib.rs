//! # Reconcile
//!
//! A framework for converging remote objects to a declared state.
//!
//! This crate provides the platform-independent half of a declarative
//! provider: identifiers, the gateway and translator seams a platform
//! binding implements, and the state machine that drives every resource
//! kind through create, read, update, delete and import.
//!
//! ## Core Concepts
//!
//! - **Composite identifier**: `/`-joined path segments addressing one
//!   remote object ([`id`])
//! - **Gateway**: typed access to one kind's endpoints, with cursor
//!   pagination ([`Gateway`])
//! - **Translator**: mapping between declared state and remote payloads
//!   ([`Translator`])
//! - **Reconciler**: idempotent lifecycle operations for any
//!   [`ResourceKind`] ([`Reconciler`])
//! - **Drift**: the remote always wins on refresh ([`drift`])
//! - **Executor**: runs independent changes on a bounded thread pool
//!   ([`execute`])
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{CallContext, Reconciler};
//!
//! let teams = TeamKind::new(&client);
//! let reconciler = Reconciler::new(&teams, CallContext::with_timeout(timeout));
//!
//! let created = reconciler.create(&desired)?;
//! assert_eq!(created.id, "acme/core-team");
//!
//! // Running the same update twice issues no write the second time
//! reconciler.update(&created.id, &desired)?;
//! ```

pub mod context;
pub mod drift;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod id;
pub mod reconciler;
pub mod resource;
pub mod retry;
pub mod translator;

// Re-export main types at crate root
pub use context::{CallContext, Deadline};
pub use drift::{Observed, Refresh};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{
    ApplyResult, AutoConfirm, AutoDecline, BoxedChange, Change, ConfirmCallback, ExecuteOptions,
    ExecuteReport, ExecuteSummary, NoProgress, ProgressCallback, execute, execute_simple,
};
pub use gateway::{Cursor, Gateway, Page};
pub use id::{CompositeKey, OrgKey, OrgScopedKey, ProjectScopedKey};
pub use reconciler::{Action, Applied, Deletion, Pending, Phase, Reconciler};
pub use resource::ResourceKind;
pub use retry::{LogCallback, RetryCallback, RetryConfig, with_retry};
pub use translator::Translator;
