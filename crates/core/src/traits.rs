//! Core traits for the session backend boundary
//!
//! This module defines the Session and SessionProvider traits that
//! separate the scope manager from any concrete data-access library.
//! Scopes only ever open, commit, roll back and dispose sessions through
//! these traits.

use std::any::Any;
use std::sync::Arc;

use crate::error::{ProviderError, SessionError};
use crate::types::{IsolationLevel, SessionRequest};

/// A type-erased session as produced by a provider
///
/// Collections downcast this to the concrete session type that was
/// requested; any other type is reported as [`ProviderError::TypeMismatch`].
pub type AnySession = Box<dyn Any + Send + Sync>;

/// One logical connection to a data store
///
/// Sessions are shared between every scope that joins the scope which
/// created them, so all methods take `&self`; implementations use interior
/// mutability for buffered state.
///
/// Thread safety: sessions may be reached from any worker running the
/// owning logical call chain (requires Send + Sync).
pub trait Session: Send + Sync + 'static {
    /// Flush pending changes to the store
    ///
    /// Returns the number of changes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the changes.
    fn commit(&self) -> Result<usize, SessionError>;

    /// Open an explicit transaction at `isolation`
    ///
    /// Called once, right after creation, when the owning scope asked for an
    /// isolation level. Backends without transactions keep the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    fn begin_transaction(&self, isolation: IsolationLevel) -> Result<(), SessionError> {
        Err(SessionError::new(format!(
            "explicit transactions ({}) are not supported by this session",
            isolation
        )))
    }

    /// Commit the transaction opened by `begin_transaction`
    ///
    /// # Errors
    ///
    /// Returns an error if the store refuses the commit.
    fn commit_transaction(&self) -> Result<(), SessionError> {
        Ok(())
    }

    /// Discard the transaction opened by `begin_transaction`
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback could not be delivered.
    fn rollback_transaction(&self) -> Result<(), SessionError> {
        Ok(())
    }

    /// Release the connection
    ///
    /// Must be idempotent and must not fail.
    fn dispose(&self);
}

/// Creates sessions on behalf of a scope
///
/// Provider lookups are keyed by `request.session_type`; the returned value
/// must be exactly that type boxed as [`AnySession`].
pub trait SessionProvider: Send + Sync {
    /// Open a new session
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the session cannot be created.
    fn create_session(&self, request: &SessionRequest) -> Result<AnySession, ProviderError>;
}

impl<P: SessionProvider + ?Sized> SessionProvider for Arc<P> {
    fn create_session(&self, request: &SessionRequest) -> Result<AnySession, ProviderError> {
        (**self).create_session(request)
    }
}

impl<P: SessionProvider + ?Sized> SessionProvider for Box<P> {
    fn create_session(&self, request: &SessionRequest) -> Result<AnySession, ProviderError> {
        (**self).create_session(request)
    }
}
