//! Error types for reconciliation.
//!
//! Every failure the core can surface is a variant of [`Error`]. Errors are
//! grouped into categories so callers can decide what is retryable, what is a
//! configuration bug, and what is a platform contract violation.

use std::fmt;
use std::time::Duration;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Identifier encoding/decoding problem (caller or config bug).
    Identity,
    /// Remote throttled the request.
    Throttled,
    /// Remote rejected the request with a non-2xx status.
    Remote,
    /// Remote response did not match the expected schema.
    Contract,
    /// Remote object does not exist.
    NotFound,
    /// The caller's deadline elapsed.
    Deadline,
    /// Connection-level failure before a status was received.
    Transport,
    /// Invalid provider configuration or unsupported operation.
    Usage,
}

impl ErrorCategory {
    /// Whether errors in this category are retried by the gateway.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "Invalid resource identifier",
            Self::Throttled => "Rate limited by the remote platform",
            Self::Remote => "Remote platform rejected the request",
            Self::Contract => "Unexpected response from the remote platform",
            Self::NotFound => "Resource not found",
            Self::Deadline => "Deadline exceeded",
            Self::Transport => "Network connectivity issue",
            Self::Usage => "Invalid configuration",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Identity => "Check the identifier format, e.g. organization/team",
            Self::Throttled => "Wait a moment and try again, or lower --jobs",
            Self::Remote => "Check the response body for the rejected field",
            Self::Contract => "The platform API may have changed; please report this",
            Self::NotFound => "The object was deleted outside of sentryctl; re-apply to recreate it",
            Self::Deadline => "Increase --timeout; some changes may have been applied",
            Self::Transport => "Check your internet connection and base URL",
            Self::Usage => "Check the token and base URL settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A segment cannot be part of a composite identifier.
    #[error("invalid identifier segment {segment:?}: {reason}")]
    InvalidSegment {
        /// The offending segment.
        segment: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The identifier has the wrong number of segments.
    #[error("malformed identifier {id:?}: expected {expected} segment(s), found {found}")]
    MalformedId {
        /// The identifier as supplied.
        id: String,
        /// Segments required by the resource kind.
        expected: usize,
        /// Segments actually present.
        found: usize,
    },

    /// The identifier is empty.
    #[error("empty identifier")]
    EmptyId,

    /// The remote throttled the request and retries were exhausted.
    #[error("rate limited by remote")]
    RateLimited {
        /// Delay the remote asked for, if any.
        retry_after: Option<Duration>,
    },

    /// The remote answered with a non-2xx status.
    #[error("remote returned HTTP {status}: {body}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// A required field was missing from a remote response.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// The addressed object does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Resource kind.
        kind: &'static str,
        /// Encoded identifier.
        id: String,
    },

    /// The caller's deadline elapsed before the operation finished.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The resource kind cannot perform the requested operation.
    #[error("{kind} does not support {operation}")]
    Unsupported {
        /// Resource kind.
        kind: &'static str,
        /// Operation name.
        operation: &'static str,
    },

    /// Declared attributes differ from ones the remote fixes at creation.
    #[error("{kind} cannot change {} in place; delete and recreate it", attributes.join(", "))]
    Immutable {
        /// Resource kind.
        kind: &'static str,
        /// Attributes that differ.
        attributes: Vec<&'static str>,
    },

    /// An error annotated with the resource it happened on.
    #[error("{kind} {id}: {source}")]
    Resource {
        /// Resource kind.
        kind: &'static str,
        /// Encoded identifier, or a placeholder before one exists.
        id: String,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a remote status error.
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            status,
            body: body.into(),
        }
    }

    /// Annotate this error with the resource kind and identifier.
    ///
    /// Already-annotated errors are returned unchanged so context is not
    /// stacked twice.
    #[must_use]
    pub fn in_resource(self, kind: &'static str, id: impl Into<String>) -> Self {
        match self {
            Self::Resource { .. } => self,
            other => Self::Resource {
                kind,
                id: id.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping resource annotations.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Resource { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self.root() {
            Error::InvalidSegment { .. } | Error::MalformedId { .. } | Error::EmptyId => {
                ErrorCategory::Identity
            }
            Error::RateLimited { .. } => ErrorCategory::Throttled,
            Error::Remote { status: 404, .. } | Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Remote { .. } => ErrorCategory::Remote,
            Error::UnexpectedShape(_) => ErrorCategory::Contract,
            Error::DeadlineExceeded => ErrorCategory::Deadline,
            Error::Transport(_) => ErrorCategory::Transport,
            Error::Config(_) | Error::Unsupported { .. } | Error::Immutable { .. } => {
                ErrorCategory::Usage
            }
            Error::Resource { .. } => unreachable!("root() never returns a Resource wrapper"),
        }
    }

    /// Whether the gateway should retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error signals a missing remote object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// The delay requested by the remote, for throttling errors.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self.root() {
            Error::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::UnexpectedShape(err.to_string())
    }
}
