//! Read-only scope handle
//!
//! A `ReadOnlyScope` is a [`SessionScope`] that can never commit. It has no
//! `save_changes`, and its sessions are created with the read-only flag so
//! backends can skip change tracking.

use std::sync::Arc;

use ambit_core::{IsolationLevel, ScopeId, ScopeResult, Session};

use crate::collection::SessionCollection;
use crate::scope::{ScopeRole, SessionScope};

/// Scope for queries that must not write
///
/// Joins a read-write or read-only ambient scope; a read-write scope can
/// never join it.
#[derive(Debug)]
pub struct ReadOnlyScope {
    inner: SessionScope,
}

impl ReadOnlyScope {
    pub(crate) fn new(inner: SessionScope) -> Self {
        debug_assert!(inner.is_read_only());
        Self { inner }
    }

    /// The session collection in effect
    pub fn sessions(&self) -> &SessionCollection {
        self.inner.sessions()
    }

    /// Shorthand for `sessions().get::<S>()`
    ///
    /// # Errors
    ///
    /// As [`SessionScope::get`].
    pub fn get<S: Session>(&self) -> ScopeResult<Arc<S>> {
        self.inner.get::<S>()
    }

    /// Release sessions (if this scope created them) and restore the previous ambient scope
    ///
    /// # Errors
    ///
    /// `OutOfOrderDisposal` under strict disposal ordering.
    pub fn dispose(&mut self) -> ScopeResult<()> {
        self.inner.dispose()
    }

    /// Dispose and consume the scope
    ///
    /// # Errors
    ///
    /// As [`dispose`](Self::dispose).
    pub fn finish(self) -> ScopeResult<()> {
        self.inner.finish()
    }

    /// Unique id of this scope
    pub fn id(&self) -> ScopeId {
        self.inner.id()
    }

    /// Creator or joiner
    pub fn role(&self) -> ScopeRole {
        self.inner.role()
    }

    /// Whether this scope owns its sessions
    pub fn is_creator(&self) -> bool {
        self.inner.is_creator()
    }

    /// Isolation level of the sessions in effect
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.inner.isolation_level()
    }

    /// Whether `dispose` has run
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}
