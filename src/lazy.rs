//! Deferred query results.
//!
//! A [`LazyResult`] is a two-state cell around a pending lookup: nothing —
//! not the freshness probe, not the cache read, not the query — runs until
//! the first `get().await`, and nothing runs twice. Futures are inert until
//! polled, so constructing and dropping a `LazyResult` performs zero I/O.

use crate::error::Result;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

enum State<'a, T> {
    Deferred(BoxFuture<'a, Result<T>>),
    Resolved(Result<Arc<T>>),
}

/// A query result that evaluates on first access and memoizes forever.
///
/// Created fresh per logical query invocation; never shared across
/// invocations. The held value is returned behind an `Arc`, so callers get
/// an immutable snapshot they cannot corrupt in place.
///
/// Errors from the probe, the backend, or the query surface on first access
/// and are memoized like values: a failed result stays failed.
pub struct LazyResult<'a, T> {
    state: State<'a, T>,
}

impl<'a, T: Send + 'a> LazyResult<'a, T> {
    /// Wrap a pending lookup. The future is not polled here.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'a,
    {
        LazyResult {
            state: State::Deferred(Box::pin(future)),
        }
    }

    /// Whether the wrapped lookup has run (successfully or not).
    pub fn is_evaluated(&self) -> bool {
        matches!(self.state, State::Resolved(_))
    }

    /// Evaluate on first call; return the memoized snapshot afterwards.
    pub async fn get(&mut self) -> Result<Arc<T>> {
        let resolved = match &mut self.state {
            State::Resolved(result) => return result.clone(),
            State::Deferred(future) => future.await.map(Arc::new),
        };
        self.state = State::Resolved(resolved.clone());
        resolved
    }
}
