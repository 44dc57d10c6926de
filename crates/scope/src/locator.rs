//! Access to ambient sessions without a scope handle
//!
//! Repository-style code deep in a call chain often has no scope to hand.
//! The locator reads the ambient frame directly and returns the session
//! the enclosing unit of work would use.

use std::sync::Arc;

use ambit_core::{ScopeResult, Session};

use crate::ambient;

/// Looks up sessions of the ambient scope
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientSessionLocator;

impl AmbientSessionLocator {
    /// Create a locator
    pub fn new() -> Self {
        Self
    }

    /// Session of type `S` from the ambient scope
    ///
    /// Returns `Ok(None)` when there is no ambient scope, when it is
    /// suppressed, or inside a tokio runtime outside `ambient::chain`. Creates the session on first use like
    /// [`SessionCollection::get`](crate::collection::SessionCollection::get).
    ///
    /// # Errors
    ///
    /// Whatever creating the session returns.
    pub fn get<S: Session>(&self) -> ScopeResult<Option<Arc<S>>> {
        match ambient::current() {
            Some(frame) => frame.collection().get::<S>().map(Some),
            None => Ok(None),
        }
    }

    /// Whether an ambient scope is visible
    pub fn has_ambient(&self) -> bool {
        ambient::current().is_some()
    }
}
