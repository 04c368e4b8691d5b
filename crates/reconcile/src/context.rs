//! Per-call context
//!
//! A [`CallContext`] travels with every gateway call of one reconciliation.
//! It carries the caller's deadline; once it elapses no further request or
//! backoff sleep is started.

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// A point in time after which an operation must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// Deadline at a fixed instant.
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// Time left, zero once elapsed.
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }
}

/// Context passed to every gateway call
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext {
    /// Optional deadline for the whole reconciliation call
    pub deadline: Option<Deadline>,
}

impl CallContext {
    /// A context without a deadline.
    pub fn unbounded() -> Self {
        Self { deadline: None }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Deadline::after(timeout)),
        }
    }

    /// Fail with [`Error::DeadlineExceeded`] if the deadline has passed.
    pub fn check(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if deadline.is_expired() => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Whether sleeping for `delay` would run past the deadline.
    pub fn would_expire_after(&self, delay: Duration) -> bool {
        self.deadline
            .is_some_and(|deadline| deadline.remaining() <= delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_expires() {
        let ctx = CallContext::unbounded();
        assert!(ctx.check().is_ok());
        assert!(!ctx.would_expire_after(Duration::from_secs(3600)));
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = CallContext {
            deadline: Some(Deadline::at(Instant::now())),
        };
        assert!(matches!(ctx.check(), Err(Error::DeadlineExceeded)));
        assert_eq!(ctx.deadline.unwrap().remaining(), Duration::ZERO);
    }

    #[test]
    fn test_would_expire_after() {
        let ctx = CallContext::with_timeout(Duration::from_secs(60));
        assert!(ctx.check().is_ok());
        assert!(!ctx.would_expire_after(Duration::from_millis(10)));
        assert!(ctx.would_expire_after(Duration::from_secs(120)));
    }
}
