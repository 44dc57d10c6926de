//! Ambient scope stack
//!
//! Tracks which scope is "current" for a logical call chain. Creating
//! scopes push a frame, disposing them pops it, and nested code reads the
//! top frame to find the sessions it should join.
//!
//! # Chain-scoped storage
//!
//! The stack lives in one of two places:
//! - Inside [`chain`] / [`chain_sync`]: a tokio task-local owned by that
//!   chain. The stack follows the future across suspension points and
//!   worker threads, and concurrently running chains never see each other.
//! - Outside any tokio runtime: a thread-local, so plain synchronous code
//!   on one thread forms one chain.
//!
//! Inside a runtime but outside a chain there is no stack at all. Worker
//! threads are shared by unrelated tasks, so a thread-local there would
//! leak scopes between them. [`current`] reports no ambient scope and
//! creating a scope fails with `ScopeError::NoChain`.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use ambit_core::{IsolationLevel, ScopeError, ScopeId, ScopeResult};
use tokio::runtime::Handle;

use crate::collection::SessionCollection;

tokio::task_local! {
    /// Stack for the logical chain driven by `chain` / `chain_sync`
    static CHAIN_STACK: RefCell<ScopeStack>;
}

thread_local! {
    /// Fallback stack for code running outside any chain
    static THREAD_STACK: RefCell<ScopeStack> = RefCell::new(ScopeStack::default());
}

/// Frame published by a scope that created its own session set
///
/// Joining scopes read the frame to reach the creator's collection and to
/// check that their request is compatible with it.
pub struct AmbientFrame {
    id: ScopeId,
    parent: Option<ScopeId>,
    collection: Arc<SessionCollection>,
    read_only: bool,
    isolation: Option<IsolationLevel>,
}

impl AmbientFrame {
    pub(crate) fn new(
        id: ScopeId,
        parent: Option<ScopeId>,
        collection: Arc<SessionCollection>,
        read_only: bool,
        isolation: Option<IsolationLevel>,
    ) -> Self {
        Self {
            id,
            parent,
            collection,
            read_only,
            isolation,
        }
    }

    /// Id of the creating scope
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Scope that was current when this frame was pushed
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// The creator's session collection
    pub fn collection(&self) -> &Arc<SessionCollection> {
        &self.collection
    }

    /// Whether the creator is read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Isolation level the creator opened its sessions with
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation
    }
}

impl fmt::Debug for AmbientFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientFrame")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("read_only", &self.read_only)
            .field("isolation", &self.isolation)
            .field("sessions", &self.collection.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Scope(Arc<AmbientFrame>),
    /// Hides everything below it until popped
    Suppressed(ScopeId),
}

impl Entry {
    fn id(&self) -> ScopeId {
        match self {
            Entry::Scope(frame) => frame.id,
            Entry::Suppressed(id) => *id,
        }
    }
}

/// Result of removing an entry from the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PopOutcome {
    /// The entry was on top
    Top,
    /// The entry was found below the top; it and everything above it were removed
    OutOfOrder {
        /// Entry that was on top before the repair
        current: ScopeId,
        /// Number of entries removed
        unwound: usize,
    },
    /// The entry was not on this chain's stack
    Missing,
}

#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    entries: Vec<Entry>,
}

impl ScopeStack {
    fn current(&self) -> Option<Arc<AmbientFrame>> {
        match self.entries.last() {
            Some(Entry::Scope(frame)) => Some(Arc::clone(frame)),
            _ => None,
        }
    }

    fn top_id(&self) -> Option<ScopeId> {
        self.entries.last().map(Entry::id)
    }

    fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    fn pop(&mut self, id: ScopeId) -> PopOutcome {
        let len = self.entries.len();
        match self.entries.iter().rposition(|e| e.id() == id) {
            None => PopOutcome::Missing,
            Some(pos) if pos + 1 == len => {
                self.entries.pop();
                PopOutcome::Top
            }
            Some(pos) => {
                let current = self.entries[len - 1].id();
                self.entries.truncate(pos);
                PopOutcome::OutOfOrder {
                    current,
                    unwound: len - pos,
                }
            }
        }
    }
}

/// Run `f` on the calling chain's stack
///
/// Returns `None` inside a tokio runtime when no chain is active.
fn with_stack<R>(f: impl FnOnce(&mut ScopeStack) -> R) -> Option<R> {
    if in_chain() {
        Some(CHAIN_STACK.with(|cell| f(&mut cell.borrow_mut())))
    } else if Handle::try_current().is_ok() {
        None
    } else {
        Some(THREAD_STACK.with(|cell| f(&mut cell.borrow_mut())))
    }
}

// ============================================================================
// Public API
// ============================================================================

/// The ambient scope for the calling chain, if any
///
/// Returns `None` when no scope is active or when the top of the stack is
/// an [`AmbientSuppressor`](crate::suppress::AmbientSuppressor).
pub fn current() -> Option<Arc<AmbientFrame>> {
    with_stack(|stack| stack.current()).flatten()
}

/// Id of the ambient scope for the calling chain, if any
pub fn current_id() -> Option<ScopeId> {
    current().map(|frame| frame.id())
}

/// Number of entries (scopes and suppressors) on the calling chain's stack
pub fn depth() -> usize {
    with_stack(|stack| stack.entries.len()).unwrap_or(0)
}

/// Whether scopes can be created here
///
/// False inside a tokio runtime outside [`chain`] / [`chain_sync`].
pub fn is_available() -> bool {
    in_chain() || Handle::try_current().is_err()
}

/// Whether the caller runs inside [`chain`] or [`chain_sync`]
pub fn in_chain() -> bool {
    CHAIN_STACK.try_with(|_| ()).is_ok()
}

/// Run `fut` as a new logical call chain with an empty scope stack
///
/// The stack travels with the future: it survives `.await` points and
/// moves with the task between worker threads. Nested calls start a fresh,
/// independent chain.
///
/// # Example
///
/// ```ignore
/// tokio::spawn(ambient::chain(async move {
///     let mut scope = factory.create(JoinOption::JoinExisting)?;
///     handle_request(&scope).await?;
///     scope.dispose()
/// }));
/// ```
pub fn chain<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    CHAIN_STACK.scope(RefCell::new(ScopeStack::default()), fut)
}

/// Run `f` as a new logical call chain with an empty scope stack
pub fn chain_sync<R>(f: impl FnOnce() -> R) -> R {
    CHAIN_STACK.sync_scope(RefCell::new(ScopeStack::default()), f)
}

pub(crate) fn push(frame: Arc<AmbientFrame>) -> ScopeResult<()> {
    with_stack(|stack| stack.push(Entry::Scope(frame))).ok_or(ScopeError::NoChain)
}

pub(crate) fn push_suppressed(id: ScopeId) -> ScopeResult<()> {
    with_stack(|stack| stack.push(Entry::Suppressed(id))).ok_or(ScopeError::NoChain)
}

/// Remove `id`; a chain that is no longer reachable counts as `Missing`
pub(crate) fn pop(id: ScopeId) -> PopOutcome {
    with_stack(|stack| stack.pop(id)).unwrap_or(PopOutcome::Missing)
}

pub(crate) fn top_id() -> Option<ScopeId> {
    with_stack(|stack| stack.top_id()).flatten()
}
