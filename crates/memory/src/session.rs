//! Buffered in-memory session
//!
//! Writes are buffered in the session and reach the shared store on
//! `commit`. Inside an explicit transaction, committed batches are staged
//! and only applied by `commit_transaction`; `rollback_transaction` drops
//! them.

use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ambit_core::{IsolationLevel, Session, SessionError};

use crate::database::{DatabaseInner, SessionStats};

#[derive(Debug, Clone)]
pub(crate) enum Write {
    Put(String, Value),
    Delete(String),
}

impl Write {
    fn key(&self) -> &str {
        match self {
            Write::Put(key, _) | Write::Delete(key) => key,
        }
    }

    fn value(&self) -> Option<Value> {
        match self {
            Write::Put(_, value) => Some(value.clone()),
            Write::Delete(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Buffers {
    /// Writes not yet passed to `commit`
    pending: Vec<Write>,
    /// Committed batches waiting for `commit_transaction`
    staged: Vec<Write>,
    transaction: Option<IsolationLevel>,
}

/// Session over a [`MemoryDatabase`](crate::MemoryDatabase)
///
/// The type parameter is a tag: `MemorySession<Orders>` and
/// `MemorySession<Billing>` are different session types and get separate
/// slots in a session collection.
pub struct MemorySession<T: 'static> {
    db: Arc<DatabaseInner>,
    stats: Arc<SessionStats>,
    read_only: bool,
    buffers: Mutex<Buffers>,
    disposed: AtomicBool,
    _tag: PhantomData<fn() -> T>,
}

impl<T: 'static> MemorySession<T> {
    pub(crate) fn new(db: Arc<DatabaseInner>, stats: Arc<SessionStats>, read_only: bool) -> Self {
        Self {
            db,
            stats,
            read_only,
            buffers: Mutex::new(Buffers::default()),
            disposed: AtomicBool::new(false),
            _tag: PhantomData,
        }
    }

    /// Buffer a write of `value` under `key`
    ///
    /// # Errors
    ///
    /// Fails on read-only or disposed sessions.
    pub fn put(&self, key: impl Into<String>, value: Value) -> Result<(), SessionError> {
        self.check_writable()?;
        self.buffers.lock().pending.push(Write::Put(key.into(), value));
        Ok(())
    }

    /// Buffer a delete of `key`
    ///
    /// # Errors
    ///
    /// Fails on read-only or disposed sessions.
    pub fn delete(&self, key: impl Into<String>) -> Result<(), SessionError> {
        self.check_writable()?;
        self.buffers.lock().pending.push(Write::Delete(key.into()));
        Ok(())
    }

    /// Read `key`, seeing this session's own uncommitted writes first
    pub fn get(&self, key: &str) -> Option<Value> {
        let buffers = self.buffers.lock();
        let own = buffers
            .pending
            .iter()
            .rev()
            .chain(buffers.staged.iter().rev())
            .find(|w| w.key() == key);
        match own {
            Some(write) => write.value(),
            None => self.db.read(key),
        }
    }

    /// Number of writes not yet committed
    pub fn pending_len(&self) -> usize {
        self.buffers.lock().pending.len()
    }

    /// Whether the session was opened read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Isolation level of the open transaction, if any
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.buffers.lock().transaction
    }

    /// Whether `dispose` has been called
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<(), SessionError> {
        if self.is_disposed() {
            return Err(SessionError::new("session has been disposed"));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), SessionError> {
        self.check_open()?;
        if self.read_only {
            return Err(SessionError::new("session is read-only"));
        }
        Ok(())
    }
}

impl<T: 'static> Session for MemorySession<T> {
    fn commit(&self) -> Result<usize, SessionError> {
        self.check_open()?;
        if self.db.commit_fails(std::any::TypeId::of::<T>()) {
            SessionStats::bump(&self.stats.failed_commits);
            return Err(SessionError::new("commit rejected (injected)"));
        }

        let mut buffers = self.buffers.lock();
        let writes = mem::take(&mut buffers.pending);
        let count = writes.len();
        if buffers.transaction.is_some() {
            buffers.staged.extend(writes);
        } else if count > 0 {
            drop(buffers);
            self.db.apply(writes);
        }
        SessionStats::bump(&self.stats.commits);
        Ok(count)
    }

    fn begin_transaction(&self, isolation: IsolationLevel) -> Result<(), SessionError> {
        self.check_open()?;
        let mut buffers = self.buffers.lock();
        if let Some(open) = buffers.transaction {
            return Err(SessionError::new(format!(
                "a {} transaction is already open",
                open
            )));
        }
        buffers.transaction = Some(isolation);
        SessionStats::bump(&self.stats.transactions_begun);
        Ok(())
    }

    fn commit_transaction(&self) -> Result<(), SessionError> {
        self.check_open()?;
        let mut buffers = self.buffers.lock();
        if buffers.transaction.take().is_none() {
            return Err(SessionError::new("no transaction is open"));
        }
        let staged = mem::take(&mut buffers.staged);
        drop(buffers);
        if !staged.is_empty() {
            self.db.apply(staged);
        }
        SessionStats::bump(&self.stats.transactions_committed);
        Ok(())
    }

    fn rollback_transaction(&self) -> Result<(), SessionError> {
        let mut buffers = self.buffers.lock();
        if buffers.transaction.take().is_some() {
            buffers.staged.clear();
            buffers.pending.clear();
            SessionStats::bump(&self.stats.transactions_rolled_back);
        }
        Ok(())
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            let mut buffers = self.buffers.lock();
            buffers.pending.clear();
            buffers.staged.clear();
            buffers.transaction = None;
            SessionStats::bump(&self.stats.disposals);
        }
    }
}

impl<T: 'static> fmt::Debug for MemorySession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySession")
            .field("tag", &std::any::type_name::<T>())
            .field("read_only", &self.read_only)
            .field("pending", &self.pending_len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
