//! Session collection
//!
//! A `SessionCollection` maps session types to open sessions for one
//! creating scope. Sessions are opened lazily on the first `get` for their
//! type and reused for every later `get`, by the creator and by every scope
//! that joins it.
//!
//! # Commit protocol
//!
//! ```text
//! for each session, in creation order:
//!   1. session.commit()                  - flush pending changes
//!   2. session.commit_transaction()      - only if an isolation level was requested
//!   3. on failure: rollback_transaction  - record the failure, keep going
//! if any failure: CommitError { failures, committed }
//! ```
//!
//! `dispose_all` always runs after the commit attempt: open transactions
//! are rolled back and every session is disposed, whatever happened before.

use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::mem;
use std::sync::Arc;
use tracing::{debug, error, warn};

use ambit_core::{
    CommitError, IsolationLevel, ProviderError, ScopeError, ScopeId, ScopeResult, Session,
    SessionFailure, SessionProvider, SessionRequest, SessionType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    /// No explicit transaction was requested
    None,
    Open,
    Committed,
    RolledBack,
}

struct SessionSlot {
    session_type: SessionType,
    /// Same allocation as `session`, kept for typed downcasts
    handle: Arc<dyn Any + Send + Sync>,
    session: Arc<dyn Session>,
    transaction: TransactionState,
}

#[derive(Default)]
struct CollectionState {
    slots: Vec<SessionSlot>,
    disposed: bool,
}

impl CollectionState {
    fn find(&self, session_type: SessionType) -> Option<&SessionSlot> {
        self.slots.iter().find(|s| s.session_type == session_type)
    }
}

/// Lazily populated map from session type to open session
///
/// Owned by the scope that created it; joining scopes hold a shared
/// reference and never commit or dispose it.
pub struct SessionCollection {
    owner: ScopeId,
    provider: Arc<dyn SessionProvider>,
    read_only: bool,
    isolation: Option<IsolationLevel>,
    state: Mutex<CollectionState>,
}

impl SessionCollection {
    /// Create an empty collection for scope `owner`
    pub fn new(
        owner: ScopeId,
        provider: Arc<dyn SessionProvider>,
        read_only: bool,
        isolation: Option<IsolationLevel>,
    ) -> Self {
        Self {
            owner,
            provider,
            read_only,
            isolation,
            state: Mutex::new(CollectionState::default()),
        }
    }

    /// Get the session of type `S`, opening it on first use
    ///
    /// The provider is called without holding the collection lock, so a
    /// provider may itself reach into the collection. If two callers race
    /// to open the same type, the loser's session is disposed and both get
    /// the winner's.
    ///
    /// # Errors
    ///
    /// - `Provider` if the session cannot be created (nothing is recorded,
    ///   the next call retries)
    /// - `Session` if the requested transaction cannot be started
    /// - `Disposed` if the collection was already disposed
    pub fn get<S: Session>(&self) -> ScopeResult<Arc<S>> {
        let session_type = SessionType::of::<S>();
        {
            let state = self.state.lock();
            if state.disposed {
                return Err(ScopeError::Disposed);
            }
            if let Some(slot) = state.find(session_type) {
                return downcast_slot::<S>(slot);
            }
        }

        let request = SessionRequest {
            session_type,
            read_only: self.read_only,
            isolation: self.isolation,
        };
        let created = self.provider.create_session(&request)?;
        let session: Arc<S> = match created.downcast::<S>() {
            Ok(boxed) => Arc::from(boxed),
            Err(_) => {
                return Err(ProviderError::TypeMismatch {
                    expected: session_type,
                }
                .into())
            }
        };

        let transaction = match self.isolation {
            Some(level) => {
                if let Err(source) = session.begin_transaction(level) {
                    session.dispose();
                    return Err(ScopeError::Session {
                        session_type,
                        source,
                    });
                }
                TransactionState::Open
            }
            None => TransactionState::None,
        };

        let mut state = self.state.lock();
        if state.disposed {
            drop(state);
            discard(self.owner, session_type, session.as_ref(), transaction);
            return Err(ScopeError::Disposed);
        }
        if let Some(existing) = state.find(session_type) {
            let winner = downcast_slot::<S>(existing);
            drop(state);
            discard(self.owner, session_type, session.as_ref(), transaction);
            return winner;
        }

        debug!(
            scope_id = self.owner.as_u64(),
            session_type = %session_type,
            read_only = self.read_only,
            isolation = ?self.isolation,
            "Opened session"
        );
        state.slots.push(SessionSlot {
            session_type,
            handle: session.clone(),
            session: session.clone(),
            transaction,
        });
        Ok(session)
    }

    /// Commit every open session
    ///
    /// Every session gets its chance to commit even after an earlier one
    /// failed. Returns the total number of changes written.
    ///
    /// # Errors
    ///
    /// - `Commit` naming every failed session (and any that did commit)
    /// - `ReadOnly` for a read-only collection
    /// - `Disposed` if the collection was already disposed
    pub fn commit_all(&self) -> ScopeResult<usize> {
        if self.read_only {
            return Err(ScopeError::ReadOnly);
        }
        let pending: Vec<(usize, SessionType, Arc<dyn Session>, TransactionState)> = {
            let state = self.state.lock();
            if state.disposed {
                return Err(ScopeError::Disposed);
            }
            state
                .slots
                .iter()
                .enumerate()
                .map(|(i, s)| (i, s.session_type, Arc::clone(&s.session), s.transaction))
                .collect()
        };

        let mut written = 0;
        let mut committed = Vec::new();
        let mut failures = Vec::new();
        let mut transitions = Vec::new();

        for (index, session_type, session, transaction) in pending {
            let outcome = session.commit().and_then(|n| {
                if transaction == TransactionState::Open {
                    session.commit_transaction()?;
                }
                Ok(n)
            });
            match outcome {
                Ok(n) => {
                    written += n;
                    committed.push(session_type);
                    if transaction == TransactionState::Open {
                        transitions.push((index, TransactionState::Committed));
                    }
                }
                Err(err) => {
                    error!(
                        scope_id = self.owner.as_u64(),
                        session_type = %session_type,
                        error = %err,
                        "Session commit failed"
                    );
                    if transaction == TransactionState::Open {
                        rollback(self.owner, session_type, session.as_ref());
                        transitions.push((index, TransactionState::RolledBack));
                    }
                    failures.push(SessionFailure {
                        session_type,
                        error: err,
                    });
                }
            }
        }

        {
            let mut state = self.state.lock();
            for (index, next) in transitions {
                if let Some(slot) = state.slots.get_mut(index) {
                    slot.transaction = next;
                }
            }
        }

        if failures.is_empty() {
            Ok(written)
        } else {
            Err(CommitError {
                failures,
                committed,
            }
            .into())
        }
    }

    /// Dispose every session
    ///
    /// Transactions still open are rolled back first. Runs at most once;
    /// later calls return 0. Returns the number of sessions disposed.
    pub fn dispose_all(&self) -> usize {
        let slots = {
            let mut state = self.state.lock();
            if state.disposed {
                return 0;
            }
            state.disposed = true;
            mem::take(&mut state.slots)
        };

        for slot in &slots {
            if slot.transaction == TransactionState::Open {
                rollback(self.owner, slot.session_type, slot.session.as_ref());
            }
            slot.session.dispose();
        }
        debug!(
            scope_id = self.owner.as_u64(),
            disposed = slots.len(),
            "Disposed sessions"
        );
        slots.len()
    }

    /// Scope that created this collection
    pub fn owner(&self) -> ScopeId {
        self.owner
    }

    /// Whether sessions are opened read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Isolation level sessions are opened with
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// True if no session has been opened
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a session of type `S` is open
    pub fn contains<S: 'static>(&self) -> bool {
        self.state.lock().find(SessionType::of::<S>()).is_some()
    }

    /// Open session types, in creation order
    pub fn session_types(&self) -> Vec<SessionType> {
        self.state
            .lock()
            .slots
            .iter()
            .map(|s| s.session_type)
            .collect()
    }

    /// Whether `dispose_all` has run
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl fmt::Debug for SessionCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCollection")
            .field("owner", &self.owner)
            .field("read_only", &self.read_only)
            .field("isolation", &self.isolation)
            .field("sessions", &self.session_types())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn downcast_slot<S: Session>(slot: &SessionSlot) -> ScopeResult<Arc<S>> {
    Arc::clone(&slot.handle)
        .downcast::<S>()
        .map_err(|_| {
            ProviderError::TypeMismatch {
                expected: slot.session_type,
            }
            .into()
        })
}

fn rollback(owner: ScopeId, session_type: SessionType, session: &dyn Session) {
    if let Err(err) = session.rollback_transaction() {
        warn!(
            scope_id = owner.as_u64(),
            session_type = %session_type,
            error = %err,
            "Transaction rollback failed"
        );
    }
}

/// Release a session that lost a creation race or arrived after disposal
fn discard(
    owner: ScopeId,
    session_type: SessionType,
    session: &dyn Session,
    transaction: TransactionState,
) {
    if transaction == TransactionState::Open {
        rollback(owner, session_type, session);
    }
    session.dispose();
}
