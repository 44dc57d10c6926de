//! Shared in-memory record store
//!
//! `MemoryDatabase` plays the part of the database server: every
//! `MemorySession` opened from it reads committed records from, and
//! commits records to, the same ordered map.

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

use ambit_core::{ProviderError, SessionRequest};

use crate::session::{MemorySession, Write};

/// Per-session-type counters
///
/// Counters use Relaxed ordering; they are observational only.
#[derive(Debug, Default)]
pub(crate) struct SessionStats {
    pub(crate) opened: AtomicUsize,
    pub(crate) commits: AtomicUsize,
    pub(crate) failed_commits: AtomicUsize,
    pub(crate) transactions_begun: AtomicUsize,
    pub(crate) transactions_committed: AtomicUsize,
    pub(crate) transactions_rolled_back: AtomicUsize,
    pub(crate) disposals: AtomicUsize,
}

impl SessionStats {
    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            opened: self.opened.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            failed_commits: self.failed_commits.load(Ordering::Relaxed),
            transactions_begun: self.transactions_begun.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
            disposals: self.disposals.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters for one session type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Sessions opened
    pub opened: usize,
    /// Successful `commit` calls
    pub commits: usize,
    /// `commit` calls rejected by fault injection
    pub failed_commits: usize,
    /// `begin_transaction` calls
    pub transactions_begun: usize,
    /// `commit_transaction` calls
    pub transactions_committed: usize,
    /// `rollback_transaction` calls that discarded an open transaction
    pub transactions_rolled_back: usize,
    /// First `dispose` call per session
    pub disposals: usize,
}

#[derive(Debug, Default)]
struct Faults {
    commit: FxHashSet<TypeId>,
    connect: FxHashSet<TypeId>,
}

#[derive(Debug, Default)]
pub(crate) struct DatabaseInner {
    records: RwLock<BTreeMap<String, Value>>,
    version: AtomicU64,
    stats: Mutex<FxHashMap<TypeId, Arc<SessionStats>>>,
    faults: Mutex<Faults>,
}

impl DatabaseInner {
    pub(crate) fn read(&self, key: &str) -> Option<Value> {
        self.records.read().get(key).cloned()
    }

    /// Apply writes atomically; returns the new store version
    pub(crate) fn apply(&self, writes: Vec<Write>) -> u64 {
        let mut records = self.records.write();
        let count = writes.len();
        for write in writes {
            match write {
                Write::Put(key, value) => {
                    records.insert(key, value);
                }
                Write::Delete(key) => {
                    records.remove(&key);
                }
            }
        }
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(version, writes = count, "Applied writes");
        version
    }

    pub(crate) fn commit_fails(&self, tag: TypeId) -> bool {
        self.faults.lock().commit.contains(&tag)
    }

    fn stats_for(&self, tag: TypeId) -> Arc<SessionStats> {
        Arc::clone(self.stats.lock().entry(tag).or_default())
    }
}

/// In-memory database shared by all sessions opened from it
///
/// Cloning is cheap and yields a handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<DatabaseInner>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session tagged `T`
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Connection` when connection failures are
    /// injected for `T`.
    pub fn open<T: 'static>(
        &self,
        request: &SessionRequest,
    ) -> Result<MemorySession<T>, ProviderError> {
        let tag = TypeId::of::<T>();
        if self.inner.faults.lock().connect.contains(&tag) {
            return Err(ProviderError::Connection {
                session_type: request.session_type,
                reason: "connection refused (injected)".to_string(),
            });
        }
        let stats = self.inner.stats_for(tag);
        SessionStats::bump(&stats.opened);
        Ok(MemorySession::new(
            Arc::clone(&self.inner),
            stats,
            request.read_only,
        ))
    }

    /// Constructor closure for `SessionRegistry::register`
    ///
    /// ```ignore
    /// let registry = SessionRegistry::new()
    ///     .register(db.factory::<Orders>())
    ///     .register(db.factory::<Customers>());
    /// ```
    pub fn factory<T: 'static>(
        &self,
    ) -> impl Fn(&SessionRequest) -> Result<MemorySession<T>, ProviderError> + Send + Sync + 'static
    {
        let db = self.clone();
        move |request| db.open::<T>(request)
    }

    /// Make every future `commit` on sessions tagged `T` fail
    pub fn fail_commits<T: 'static>(&self) {
        self.inner.faults.lock().commit.insert(TypeId::of::<T>());
    }

    /// Make every future `open` for sessions tagged `T` fail
    pub fn fail_connections<T: 'static>(&self) {
        self.inner.faults.lock().connect.insert(TypeId::of::<T>());
    }

    /// Clear all injected faults
    pub fn heal(&self) {
        let mut faults = self.inner.faults.lock();
        faults.commit.clear();
        faults.connect.clear();
    }

    /// Counters for sessions tagged `T`
    pub fn stats<T: 'static>(&self) -> StatsSnapshot {
        self.inner
            .stats
            .lock()
            .get(&TypeId::of::<T>())
            .map(|s| s.snapshot())
            .unwrap_or_default()
    }

    /// Committed value for `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read(key)
    }

    /// Number of committed records
    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    /// True if no record has been committed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful store writes (one per flushed batch)
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }
}
