//! Ambient session scopes
//!
//! This crate manages the lifetime of database sessions for units of work:
//! - SessionScope: Joins the ambient scope or creates a new session set
//! - SessionCollection: Lazily created sessions, committed and disposed together
//! - ambient: Per-chain stack of active scopes (survives `.await` inside `chain`)
//! - ScopeFactory: Entry point; read-only, transactional and closure variants
//! - AmbientSuppressor / AmbientSessionLocator: Hide or reach the ambient scope
//! - ScopeConfig: `ambit.toml` settings
//!
//! Only the scope that created a session set commits or disposes it.
//! Nested scopes that join are bookkeeping only, so an inner unit of work
//! can never commit half of an outer one.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ambient;
pub mod collection;
pub mod config;
pub mod factory;
pub mod locator;
pub mod read_only;
pub mod scope;
pub mod suppress;


pub use ambient::{chain, chain_sync, AmbientFrame};
pub use collection::SessionCollection;
pub use config::{IsolationConflictPolicy, ScopeConfig, CONFIG_FILE_NAME};
pub use factory::ScopeFactory;
pub use locator::AmbientSessionLocator;
pub use read_only::ReadOnlyScope;
pub use scope::{ScopeOptions, ScopeRole, SessionScope};
pub use suppress::AmbientSuppressor;

// Re-export core types so most users only need this crate
pub use ambit_core::{
    AnySession, CommitError, IsolationLevel, JoinOption, ProviderError, ScopeError, ScopeId,
    ScopeResult, Session, SessionError, SessionFailure, SessionProvider, SessionRegistry,
    SessionRequest, SessionType,
};
