//! Core types for session scopes
//!
//! This module defines the foundational types:
//! - SessionType: Type identity used to key sessions inside a collection
//! - IsolationLevel: Transaction isolation requested by a creating scope
//! - JoinOption: Join-vs-create decision for nested scopes
//! - ScopeId: Process-unique identifier for scopes and suppressors
//! - SessionRequest: Everything a provider needs to open a session

use serde::{Deserialize, Serialize};
use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a logical session type
///
/// A SessionType pairs the `TypeId` of a session implementation with its
/// type name. Equality and hashing use the `TypeId` only; the name is kept
/// for error messages and log fields.
#[derive(Debug, Clone, Copy)]
pub struct SessionType {
    id: TypeId,
    name: &'static str,
}

impl SessionType {
    /// SessionType for the session implementation `S`
    pub fn of<S: 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: type_name::<S>(),
        }
    }

    /// The underlying `TypeId`
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Full type name (module path included)
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths stripped, generics kept
    ///
    /// `ambit_memory::MemorySession<tests::Orders>` becomes
    /// `MemorySession<Orders>`.
    pub fn short_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut segment = String::new();
        for ch in self.name.chars() {
            match ch {
                '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                    out.push_str(last_path_segment(&segment));
                    segment.clear();
                    out.push(ch);
                }
                _ => segment.push(ch),
            }
        }
        out.push_str(last_path_segment(&segment));
        out
    }
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

impl PartialEq for SessionType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SessionType {}

impl Hash for SessionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Transaction isolation level
///
/// Only meaningful for scopes that create their own session set. A session
/// backend maps these onto whatever its store supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Dirty reads allowed
    ReadUncommitted,
    /// Only committed data is visible
    ReadCommitted,
    /// Rows read once stay stable for the transaction
    RepeatableRead,
    /// Full serializability
    Serializable,
    /// Snapshot isolation
    Snapshot,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::ReadUncommitted => "read uncommitted",
            IsolationLevel::ReadCommitted => "read committed",
            IsolationLevel::RepeatableRead => "repeatable read",
            IsolationLevel::Serializable => "serializable",
            IsolationLevel::Snapshot => "snapshot",
        };
        f.write_str(name)
    }
}

/// How a new scope relates to the ambient scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOption {
    /// Reuse the ambient scope's sessions when one exists
    #[default]
    JoinExisting,
    /// Always open an independent session set
    ForceCreateNew,
}

/// Process-unique identifier for a scope
///
/// Ids are allocated from a global monotonic counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

impl ScopeId {
    /// Allocate the next id
    pub fn next() -> Self {
        Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Parameters for opening one session
///
/// Handed to a [`SessionProvider`](crate::traits::SessionProvider) when a
/// collection lazily creates a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRequest {
    /// Which session type to open
    pub session_type: SessionType,
    /// The owning scope never commits; backends may disable change tracking
    pub read_only: bool,
    /// Isolation level of the owning scope, if it asked for a transaction
    pub isolation: Option<IsolationLevel>,
}

impl SessionRequest {
    /// Request for session type `S` with no transaction
    pub fn of<S: 'static>(read_only: bool) -> Self {
        Self {
            session_type: SessionType::of::<S>(),
            read_only,
            isolation: None,
        }
    }

    /// Attach an isolation level
    pub fn with_isolation(mut self, isolation: Option<IsolationLevel>) -> Self {
        self.isolation = isolation;
        self
    }
}
