//! Remote gateway trait
//!
//! A gateway is the thin typed wrapper around one resource kind's remote
//! endpoints. It keeps no state between calls; the only thing threaded
//! through a listing is the [`Cursor`] of the current page.

use crate::context::CallContext;
use crate::error::Result;
use crate::id::CompositeKey;
use std::fmt;

/// Pagination cursor returned with a page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Opaque token to pass back for the next page
    pub token: String,
    /// Whether the remote reports more results behind this cursor
    pub has_more: bool,
}

impl Cursor {
    pub fn new(token: impl Into<String>, has_more: bool) -> Self {
        Self {
            token: token.into(),
            has_more,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the following page, if the remote returned one
    pub next: Option<Cursor>,
}

impl<T> Page<T> {
    /// A page with nothing after it.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    /// Whether another page should be requested.
    pub fn has_more(&self) -> bool {
        self.next.as_ref().is_some_and(|c| c.has_more)
    }

    /// Cursor to request next, only while more results exist.
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next.as_ref().filter(|c| c.has_more)
    }
}

/// Typed access to one resource kind's remote endpoints
pub trait Gateway {
    /// Composite key addressing one remote object.
    type Key: CompositeKey;
    /// What a new object is created under (organization, project, ...).
    type Parent: Clone + fmt::Debug;
    /// Decoded remote object.
    type Remote: fmt::Debug;
    /// Request body for create and update.
    type Payload: PartialEq + fmt::Debug;

    /// Fetch one object. A missing object is `Ok(None)`, not an error.
    fn fetch(&self, ctx: &CallContext, key: &Self::Key) -> Result<Option<Self::Remote>>;

    /// Fetch a single page of objects under `parent`.
    fn list(
        &self,
        ctx: &CallContext,
        parent: &Self::Parent,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Self::Remote>>;

    /// Create an object under `parent`.
    fn create(
        &self,
        ctx: &CallContext,
        parent: &Self::Parent,
        payload: &Self::Payload,
    ) -> Result<Self::Remote>;

    /// Replace the mutable attributes of an existing object.
    fn update(
        &self,
        ctx: &CallContext,
        key: &Self::Key,
        payload: &Self::Payload,
    ) -> Result<Self::Remote>;

    /// Delete an object. Deleting an object that is already gone succeeds.
    fn delete(&self, ctx: &CallContext, key: &Self::Key) -> Result<()>;

    /// Fetch every object under `parent`, following cursors until the
    /// remote reports no more results.
    fn list_all(&self, ctx: &CallContext, parent: &Self::Parent) -> Result<Vec<Self::Remote>> {
        let mut items = Vec::new();
        let mut page = self.list(ctx, parent, None)?;
        loop {
            let next = page.next_cursor().cloned();
            items.append(&mut page.items);
            match next {
                Some(cursor) => page = self.list(ctx, parent, Some(&cursor))?,
                None => return Ok(items),
            }
        }
    }

    /// Return the first object under `parent` matching `predicate`.
    ///
    /// Pages are requested one at a time and the scan stops at the first
    /// match, so later pages are never fetched.
    fn find<P>(
        &self,
        ctx: &CallContext,
        parent: &Self::Parent,
        mut predicate: P,
    ) -> Result<Option<Self::Remote>>
    where
        P: FnMut(&Self::Remote) -> bool,
    {
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = self.list(ctx, parent, cursor.as_ref())?;
            let next = page.next_cursor().cloned();
            if let Some(found) = page.items.into_iter().find(|item| predicate(item)) {
                return Ok(Some(found));
            }
            match next {
                Some(c) => cursor = Some(c),
                None => return Ok(None),
            }
        }
    }
}
