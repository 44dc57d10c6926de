//! Ambit - ambient, nestable database session scopes
//!
//! Ambit ties the lifetime of database sessions to scopes. Code at any call
//! depth can reach the session of the enclosing unit of work without it
//! being passed down explicitly.
//!
//! # Quick Start
//!
//! ```ignore
//! use ambit::{JoinOption, ScopeFactory, SessionRegistry};
//! use ambit::memory::{MemoryDatabase, MemorySession};
//!
//! struct Orders;
//!
//! let db = MemoryDatabase::new();
//! let factory = ScopeFactory::new(
//!     SessionRegistry::new().register(db.factory::<Orders>()),
//! );
//!
//! let mut scope = factory.create(JoinOption::JoinExisting)?;
//! place_order(&factory)?;    // joins `scope`, shares its session
//! scope.dispose()?;          // commits once, then disposes
//! ```
//!
//! # Architecture
//!
//! - `ambit-core`: session traits, typed provider registry and errors
//! - `ambit-scope`: the ambient stack, scopes and the factory
//! - `ambit-memory`: in-memory backend for tests and examples
//!
//! Async code runs each logical request inside [`chain`] so the ambient
//! stack follows the task across worker threads.

// Re-export the public API from ambit-scope
pub use ambit_scope::*;

/// In-memory reference backend
pub mod memory {
    pub use ambit_memory::*;
}
