//! Session scope lifecycle
//!
//! A `SessionScope` is the handle application code holds for the duration
//! of a unit of work. On creation it either joins the ambient scope or
//! becomes the new ambient scope with its own session collection.
//!
//! # Lifecycle
//!
//! ```text
//! acquire()
//!   JoinExisting + ambient present  -> Joiner  (shares the ambient collection)
//!   otherwise                       -> Creator (new collection, pushed on the stack)
//!
//! dispose()            (first call only)
//!   Joiner:  mark disposed
//!   Creator: commit_all()   unless read-only, already saved, or faulted
//!            dispose_all()  always
//!            pop from the ambient stack
//! ```
//!
//! Only the creator ever commits or disposes sessions; joiners are pure
//! bookkeeping. Scopes must be disposed in reverse creation order within a
//! chain. Violations are repaired and logged, see [`ambient`](crate::ambient).

use std::fmt;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, warn};

use ambit_core::{
    IsolationLevel, JoinOption, ScopeError, ScopeId, ScopeResult, Session, SessionProvider,
};

use crate::ambient::{self, AmbientFrame, PopOutcome};
use crate::collection::SessionCollection;
use crate::config::{IsolationConflictPolicy, ScopeConfig};

/// Inputs for acquiring a scope
///
/// # Example
///
/// ```ignore
/// let options = ScopeOptions::force_create_new()
///     .with_isolation(IsolationLevel::Serializable);
/// let mut scope = factory.acquire(options)?;
/// ```
#[derive(Clone, Default)]
pub struct ScopeOptions {
    join: JoinOption,
    isolation: Option<IsolationLevel>,
    read_only: bool,
    provider: Option<Arc<dyn SessionProvider>>,
}

impl ScopeOptions {
    /// Join the ambient scope if there is one (the default)
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the ambient scope if there is one
    pub fn join_existing() -> Self {
        Self::new().with_join(JoinOption::JoinExisting)
    }

    /// Always create an independent session set
    pub fn force_create_new() -> Self {
        Self::new().with_join(JoinOption::ForceCreateNew)
    }

    /// Set the join mode
    pub fn with_join(mut self, join: JoinOption) -> Self {
        self.join = join;
        self
    }

    /// Request an explicit transaction at `isolation`
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    /// Never commit through this scope
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Use `provider` instead of the factory's default when creating sessions
    ///
    /// Ignored when the scope joins an ambient scope.
    pub fn with_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Requested join mode
    pub fn join(&self) -> JoinOption {
        self.join
    }

    /// Requested isolation level
    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    /// Whether a read-only scope was requested
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl fmt::Debug for ScopeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeOptions")
            .field("join", &self.join)
            .field("isolation", &self.isolation)
            .field("read_only", &self.read_only)
            .field("custom_provider", &self.provider.is_some())
            .finish()
    }
}

/// Whether a scope owns its sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRole {
    /// Created the collection; commits and disposes it
    Creator,
    /// Shares the ambient collection; never commits or disposes it
    Joiner,
}

impl ScopeRole {
    fn as_str(&self) -> &'static str {
        match self {
            ScopeRole::Creator => "creator",
            ScopeRole::Joiner => "joiner",
        }
    }
}

/// Handle for one unit of work
///
/// Disposal commits (for a read-write creator) and releases the sessions.
/// Call [`dispose`](Self::dispose) or [`finish`](Self::finish) to observe
/// commit errors; dropping the scope disposes it too, but can only log them.
pub struct SessionScope {
    id: ScopeId,
    role: ScopeRole,
    join: JoinOption,
    read_only: bool,
    isolation: Option<IsolationLevel>,
    collection: Arc<SessionCollection>,
    strict_order: bool,
    completed: bool,
    faulted: bool,
    disposed: bool,
}

impl SessionScope {
    /// Join the ambient scope or create a new one
    ///
    /// # Errors
    ///
    /// - `ReadWriteInReadOnly` when a read-write request would join a read-only ambient scope
    /// - `IsolationConflict` when a join names an isolation level the ambient
    ///   scope does not use and the policy is `Error`
    /// - `NoChain` inside a tokio runtime outside `ambient::chain`
    pub(crate) fn acquire(
        options: ScopeOptions,
        default_provider: &Arc<dyn SessionProvider>,
        config: &ScopeConfig,
    ) -> ScopeResult<Self> {
        if !ambient::is_available() {
            return Err(ScopeError::NoChain);
        }
        let ambient = ambient::current();

        if let (JoinOption::JoinExisting, Some(frame)) = (options.join, ambient) {
            return Self::join(options, &frame, config);
        }

        let id = ScopeId::next();
        let provider = options
            .provider
            .unwrap_or_else(|| Arc::clone(default_provider));
        let collection = Arc::new(SessionCollection::new(
            id,
            provider,
            options.read_only,
            options.isolation,
        ));
        let parent = ambient::current_id();
        ambient::push(Arc::new(AmbientFrame::new(
            id,
            parent,
            Arc::clone(&collection),
            options.read_only,
            options.isolation,
        )))?;

        debug!(
            scope_id = id.as_u64(),
            parent = ?parent.map(|p| p.as_u64()),
            role = ScopeRole::Creator.as_str(),
            join = ?options.join,
            read_only = options.read_only,
            isolation = ?options.isolation,
            "Created scope"
        );

        Ok(Self {
            id,
            role: ScopeRole::Creator,
            join: options.join,
            read_only: options.read_only,
            isolation: options.isolation,
            collection,
            strict_order: config.strict_disposal_order,
            completed: false,
            faulted: false,
            disposed: false,
        })
    }

    fn join(options: ScopeOptions, frame: &AmbientFrame, config: &ScopeConfig) -> ScopeResult<Self> {
        if frame.is_read_only() && !options.read_only {
            return Err(ScopeError::ReadWriteInReadOnly);
        }
        if let Some(requested) = options.isolation {
            if frame.isolation_level() != Some(requested) {
                match config.isolation_conflict {
                    IsolationConflictPolicy::Error => {
                        return Err(ScopeError::IsolationConflict {
                            requested,
                            ambient: frame.isolation_level(),
                        })
                    }
                    IsolationConflictPolicy::Ignore => warn!(
                        ambient_scope = frame.id().as_u64(),
                        requested = %requested,
                        ambient = ?frame.isolation_level(),
                        "Ignoring isolation level requested by joining scope"
                    ),
                }
            }
        }

        let id = ScopeId::next();
        debug!(
            scope_id = id.as_u64(),
            ambient_scope = frame.id().as_u64(),
            role = ScopeRole::Joiner.as_str(),
            read_only = options.read_only,
            "Joined ambient scope"
        );

        Ok(Self {
            id,
            role: ScopeRole::Joiner,
            join: options.join,
            read_only: options.read_only,
            isolation: frame.isolation_level(),
            collection: Arc::clone(frame.collection()),
            strict_order: config.strict_disposal_order,
            completed: false,
            faulted: false,
            disposed: false,
        })
    }

    /// The session collection in effect (own or ambient)
    pub fn sessions(&self) -> &SessionCollection {
        &self.collection
    }

    /// Shorthand for `sessions().get::<S>()`
    ///
    /// # Errors
    ///
    /// `Disposed` after this scope was disposed; otherwise as
    /// [`SessionCollection::get`].
    pub fn get<S: Session>(&self) -> ScopeResult<Arc<S>> {
        if self.disposed {
            return Err(ScopeError::Disposed);
        }
        self.collection.get::<S>()
    }

    /// Commit now instead of at disposal
    ///
    /// On a creator this commits every session and marks the scope
    /// completed, so disposal will not commit again. On a joiner it only
    /// marks the scope completed and returns 0: the creator commits.
    ///
    /// # Errors
    ///
    /// - `Disposed`, `ReadOnly` or `AlreadyCompleted` from the scope state
    /// - `Commit` if any session failed; the scope is then faulted and
    ///   disposal will roll back instead of committing
    pub fn save_changes(&mut self) -> ScopeResult<usize> {
        if self.disposed {
            return Err(ScopeError::Disposed);
        }
        if self.read_only {
            return Err(ScopeError::ReadOnly);
        }
        if self.completed {
            return Err(ScopeError::AlreadyCompleted);
        }
        if self.role == ScopeRole::Joiner {
            self.completed = true;
            return Ok(0);
        }

        match self.collection.commit_all() {
            Ok(written) => {
                self.completed = true;
                debug!(scope_id = self.id.as_u64(), written, "Saved scope changes");
                Ok(written)
            }
            Err(err) => {
                self.faulted = true;
                Err(err)
            }
        }
    }

    /// Flag the unit of work as failed
    ///
    /// A faulted creator disposes its sessions without committing. On a
    /// joiner this has no effect on the shared sessions.
    pub fn mark_failed(&mut self) {
        self.faulted = true;
    }

    /// Commit (if applicable), release sessions and restore the previous ambient scope
    ///
    /// Idempotent: only the first call has any effect.
    ///
    /// # Errors
    ///
    /// - `Commit` if committing failed; every session was still disposed
    /// - `OutOfOrderDisposal` when this creator was not the ambient top and
    ///   `strict_disposal_order` is set; the stack was still repaired
    pub fn dispose(&mut self) -> ScopeResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        if self.role == ScopeRole::Joiner {
            debug!(scope_id = self.id.as_u64(), role = self.role.as_str(), "Disposed scope");
            return Ok(());
        }

        let commit = if self.read_only || self.completed || self.faulted {
            Ok(())
        } else {
            self.collection.commit_all().map(|_| ())
        };
        if commit.is_err() {
            self.faulted = true;
        }

        let disposed_sessions = self.collection.dispose_all();
        let order = self.restore_ambient();

        debug!(
            scope_id = self.id.as_u64(),
            role = self.role.as_str(),
            committed = commit.is_ok() && !self.read_only && !self.faulted,
            sessions = disposed_sessions,
            "Disposed scope"
        );
        commit.and(order)
    }

    /// Dispose and consume the scope
    ///
    /// # Errors
    ///
    /// As [`dispose`](Self::dispose).
    pub fn finish(mut self) -> ScopeResult<()> {
        self.dispose()
    }

    fn restore_ambient(&self) -> ScopeResult<()> {
        let current = match ambient::pop(self.id) {
            PopOutcome::Top => return Ok(()),
            PopOutcome::OutOfOrder { current, unwound } => {
                warn!(
                    scope_id = self.id.as_u64(),
                    current = current.as_u64(),
                    unwound,
                    "Scope disposed out of order; unwound ambient stack"
                );
                Some(current)
            }
            PopOutcome::Missing => {
                let current = ambient::top_id();
                warn!(
                    scope_id = self.id.as_u64(),
                    current = ?current.map(|c| c.as_u64()),
                    "Scope not found on this chain's ambient stack"
                );
                current
            }
        };
        if self.strict_order {
            Err(ScopeError::OutOfOrderDisposal {
                disposed: self.id,
                current,
            })
        } else {
            Ok(())
        }
    }

    /// Unique id of this scope
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Creator or joiner
    pub fn role(&self) -> ScopeRole {
        self.role
    }

    /// Whether this scope owns (and will commit) its sessions
    pub fn is_creator(&self) -> bool {
        self.role == ScopeRole::Creator
    }

    /// Join mode that was requested
    pub fn join_option(&self) -> JoinOption {
        self.join
    }

    /// Whether this scope never commits
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Isolation level of the sessions in effect
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    /// Whether `save_changes` succeeded
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether the unit of work was flagged as failed
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Whether `dispose` has run
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        if thread::panicking() && self.role == ScopeRole::Creator {
            warn!(
                scope_id = self.id.as_u64(),
                "Scope dropped during panic; discarding changes"
            );
            self.faulted = true;
        }
        if let Err(err) = self.dispose() {
            error!(
                scope_id = self.id.as_u64(),
                error = %err,
                "Scope disposal failed during drop"
            );
        }
    }
}

impl fmt::Debug for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionScope")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("read_only", &self.read_only)
            .field("isolation", &self.isolation)
            .field("completed", &self.completed)
            .field("faulted", &self.faulted)
            .field("disposed", &self.disposed)
            .finish()
    }
}
