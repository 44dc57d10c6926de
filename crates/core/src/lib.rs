//! Core types and traits for ambit
//!
//! This crate defines the foundational types used throughout the system:
//! - SessionType: Type identity keying sessions inside a collection
//! - IsolationLevel, JoinOption: Scope construction inputs
//! - ScopeId: Unique identifier for scopes
//! - Traits: Session and SessionProvider (the backend boundary)
//! - SessionRegistry: Default provider keyed by session type
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod provider;
pub mod traits;
pub mod types;

pub use error::{CommitError, ProviderError, ScopeError, ScopeResult, SessionError, SessionFailure};
pub use provider::SessionRegistry;
pub use traits::{AnySession, Session, SessionProvider};
pub use types::{IsolationLevel, JoinOption, ScopeId, SessionRequest, SessionType};
