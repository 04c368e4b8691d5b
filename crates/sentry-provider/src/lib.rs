//! # sentry-provider
//!
//! Sentry resource kinds for the [`reconcile`] core.
//!
//! This crate provides:
//! - An authenticated HTTP client for the Sentry REST API
//! - Cursor pagination over `Link` headers
//! - Gateway, translator and identity implementations for nine resource kinds
//! - A recording mock transport for tests
//!
//! ## Example
//!
//! ```no_run
//! use reconcile::{CallContext, Reconciler};
//! use sentry_provider::{ProviderConfig, SentryClient, TeamKind, TeamState};
//!
//! let config = ProviderConfig::builder().build().expect("SENTRY_AUTH_TOKEN is set");
//! let client = SentryClient::new(config);
//! let teams = TeamKind::new(&client);
//!
//! let desired = TeamState {
//!     organization: "acme".into(),
//!     name: "core-team".into(),
//!     slug: None,
//! };
//! let applied = Reconciler::new(&teams, CallContext::unbounded())
//!     .create(&desired)
//!     .expect("team created");
//! println!("created {}", applied.id);
//! ```
//!
//! ## Configuration
//!
//! | Setting   | Source                                          | Default                 |
//! |-----------|-------------------------------------------------|-------------------------|
//! | Token     | builder, `SENTRY_AUTH_TOKEN`, `SENTRY_TOKEN`    | required                |
//! | Base URL  | builder, `SENTRY_BASE_URL`                      | `https://sentry.io/api/`|
//! | Timeout   | builder                                         | 30s                     |
//! | Retries   | builder                                         | 5 attempts, exponential |

pub mod client;
pub mod config;
pub mod pagination;
pub mod resources;
pub mod transport;

pub use client::SentryClient;
pub use config::{ProviderConfig, ProviderConfigBuilder};
pub use resources::*;
pub use transport::{HttpRequest, HttpResponse, Method, MockTransport, Transport, UreqTransport};
