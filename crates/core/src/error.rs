//! Error types for session scopes
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The hierarchy mirrors where a failure originates:
//! - [`SessionError`]: a single session operation failed (commit, transaction control)
//! - [`ProviderError`]: a session could not be created
//! - [`CommitError`]: one or more sessions failed while a scope committed
//! - [`ScopeError`]: anything surfaced by the scope API

use crate::types::{IsolationLevel, ScopeId, SessionType};
use std::fmt;
use thiserror::Error;

/// Result type alias for scope operations
pub type ScopeResult<T> = std::result::Result<T, ScopeError>;

/// Failure reported by a session backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SessionError {
    message: String,
}

impl SessionError {
    /// Create a session error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The backend's message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Session creation failed
///
/// A failed creation leaves no entry in the collection, so the next `get`
/// for the same type tries again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider does not know how to build this session type
    #[error("No session constructor registered for {session_type}")]
    Unregistered {
        /// Requested session type
        session_type: SessionType,
    },

    /// The provider returned a value of a different type than requested
    #[error("Provider returned the wrong session type, expected {expected}")]
    TypeMismatch {
        /// Requested session type
        expected: SessionType,
    },

    /// The underlying connection could not be established
    #[error("Failed to open {session_type}: {reason}")]
    Connection {
        /// Requested session type
        session_type: SessionType,
        /// Backend description of the failure
        reason: String,
    },
}

impl ProviderError {
    /// Connection failure for session type `S`
    pub fn connection<S: 'static>(reason: impl Into<String>) -> Self {
        ProviderError::Connection {
            session_type: SessionType::of::<S>(),
            reason: reason.into(),
        }
    }
}

/// One session that failed to commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    /// Session type that failed
    pub session_type: SessionType,
    /// What the backend reported
    pub error: SessionError,
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.session_type, self.error)
    }
}

/// Aggregate commit failure
///
/// Every session in a collection is given the chance to commit even after an
/// earlier one failed, so a commit can partially succeed. `committed` lists
/// the sessions whose writes did reach the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitError {
    /// Sessions that failed, in commit order
    pub failures: Vec<SessionFailure>,
    /// Sessions that committed successfully, in commit order
    pub committed: Vec<SessionType>,
}

impl CommitError {
    /// True when at least one session committed before the failure was reported
    pub fn is_partial(&self) -> bool {
        !self.committed.is_empty()
    }

    /// Session types that failed
    pub fn failed_types(&self) -> Vec<SessionType> {
        self.failures.iter().map(|f| f.session_type).collect()
    }
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commit failed for {} session(s): ", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", failure)?;
        }
        if self.is_partial() {
            f.write_str("; partially committed: ")?;
            for (i, ty) in self.committed.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", ty)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for CommitError {}

/// Error types for the scope API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// Lazy session creation failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Committing the scope's sessions failed
    #[error("{0}")]
    Commit(#[from] CommitError),

    /// A session was created but could not start its transaction
    #[error("Session {session_type} failed: {source}")]
    Session {
        /// Session type that failed
        session_type: SessionType,
        /// Backend failure
        source: SessionError,
    },

    /// A scope was disposed while it was not the ambient top
    ///
    /// The ambient stack has already been repaired when this is returned.
    #[error("Scope {disposed} disposed out of order (current ambient scope: {current:?})")]
    OutOfOrderDisposal {
        /// Scope being disposed
        disposed: ScopeId,
        /// Scope that was on top of the ambient stack at the time
        current: Option<ScopeId>,
    },

    /// A join request named an isolation level the ambient scope does not use
    #[error("Cannot join ambient scope using {ambient:?} isolation with a request for {requested}")]
    IsolationConflict {
        /// Isolation level of the joining request
        requested: IsolationLevel,
        /// Isolation level of the ambient scope
        ambient: Option<IsolationLevel>,
    },

    /// A scope was requested inside an async runtime without an ambient chain
    ///
    /// Tasks share worker threads, so the ambient stack must come from
    /// `ambient::chain` rather than the thread.
    #[error("No ambient chain: scopes inside an async runtime must run within ambient::chain")]
    NoChain,

    /// A read-write scope tried to join a read-only ambient scope
    #[error("Cannot nest a read-write scope inside a read-only scope")]
    ReadWriteInReadOnly,

    /// Changes were already saved through this scope
    #[error("Scope changes have already been saved")]
    AlreadyCompleted,

    /// Write operation attempted through a read-only scope
    #[error("Scope is read-only")]
    ReadOnly,

    /// The scope or its session collection was already disposed
    #[error("Scope has been disposed")]
    Disposed,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScopeError {
    /// The aggregate commit error, if this is one
    pub fn as_commit(&self) -> Option<&CommitError> {
        match self {
            ScopeError::Commit(e) => Some(e),
            _ => None,
        }
    }
}
