//! In-memory session backend for ambit
//!
//! This crate implements a reference session backend with:
//! - MemoryDatabase: BTreeMap-based record store with RwLock
//! - MemorySession<T>: buffered session, one Rust type per logical session type
//! - StatsSnapshot: per-type call accounting (opens, commits, transactions, disposals)
//! - Fault injection for connection and commit failures
//!
//! It exists to exercise the `Session` contract end to end; real
//! applications implement `Session` over their own data-access library.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod session;

pub use database::{MemoryDatabase, StatsSnapshot};
pub use session::MemorySession;
