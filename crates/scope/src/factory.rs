//! Scope factory
//!
//! The factory is the entry point applications hold on to. It owns the
//! default session provider and the scope configuration, and hands out
//! scopes, read-only scopes and ambient suppressors.
//!
//! # Closure API
//!
//! [`ScopeFactory::run`] wraps a unit of work:
//!
//! ```text
//! acquire scope
//! result = f(&mut scope)
//!   Ok  -> dispose (creator commits)
//!   Err -> mark failed, dispose (nothing committed)
//! ```

use std::sync::Arc;
use tracing::warn;

use ambit_core::{IsolationLevel, JoinOption, ScopeError, ScopeResult, SessionProvider};

use crate::config::ScopeConfig;
use crate::read_only::ReadOnlyScope;
use crate::scope::{ScopeOptions, SessionScope};
use crate::suppress::AmbientSuppressor;

/// Creates session scopes
///
/// Cheap to clone; clones share the provider and configuration.
///
/// # Example
///
/// ```ignore
/// let factory = ScopeFactory::new(
///     SessionRegistry::new().register(db.factory::<Orders>()),
/// );
///
/// factory.run(ScopeOptions::new(), |scope| {
///     let orders = scope.get::<MemorySession<Orders>>()?;
///     orders.put("order:1", json!({"total": 42}))?;
///     Ok::<_, AppError>(())
/// })?;
/// ```
#[derive(Clone)]
pub struct ScopeFactory {
    provider: Arc<dyn SessionProvider>,
    config: Arc<ScopeConfig>,
}

impl ScopeFactory {
    /// Factory with the default configuration
    pub fn new(provider: impl SessionProvider + 'static) -> Self {
        Self::with_config(provider, ScopeConfig::default())
    }

    /// Factory with an explicit configuration
    pub fn with_config(provider: impl SessionProvider + 'static, config: ScopeConfig) -> Self {
        Self {
            provider: Arc::new(provider),
            config: Arc::new(config),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Default session provider
    pub fn provider(&self) -> &Arc<dyn SessionProvider> {
        &self.provider
    }

    /// Acquire a scope from explicit options
    ///
    /// # Errors
    ///
    /// `ReadWriteInReadOnly` or `IsolationConflict` when the request cannot
    /// join the ambient scope.
    pub fn acquire(&self, options: ScopeOptions) -> ScopeResult<SessionScope> {
        SessionScope::acquire(options, &self.provider, &self.config)
    }

    /// Read-write scope
    ///
    /// # Errors
    ///
    /// `ReadWriteInReadOnly` inside a read-only ambient scope.
    pub fn create(&self, join: JoinOption) -> ScopeResult<SessionScope> {
        self.acquire(ScopeOptions::new().with_join(join))
    }

    /// Read-write scope using the configured join mode
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create).
    pub fn create_default(&self) -> ScopeResult<SessionScope> {
        self.create(self.config.join_option)
    }

    /// Read-only scope
    ///
    /// A read-only request can join any ambient scope.
    ///
    /// # Errors
    ///
    /// None in practice; the signature matches [`create`](Self::create).
    pub fn create_read_only(&self, join: JoinOption) -> ScopeResult<ReadOnlyScope> {
        self.acquire(ScopeOptions::new().with_join(join).read_only(true))
            .map(ReadOnlyScope::new)
    }

    /// Read-write scope whose sessions run inside explicit transactions
    ///
    /// Always creates a new session set.
    ///
    /// # Errors
    ///
    /// Never fails to acquire; session-level transaction errors surface
    /// from `get`.
    pub fn create_with_transaction(&self, isolation: IsolationLevel) -> ScopeResult<SessionScope> {
        self.acquire(ScopeOptions::force_create_new().with_isolation(isolation))
    }

    /// Read-only scope whose sessions run inside explicit transactions
    ///
    /// Always creates a new session set.
    ///
    /// # Errors
    ///
    /// As [`create_with_transaction`](Self::create_with_transaction).
    pub fn create_read_only_with_transaction(
        &self,
        isolation: IsolationLevel,
    ) -> ScopeResult<ReadOnlyScope> {
        self.acquire(
            ScopeOptions::force_create_new()
                .with_isolation(isolation)
                .read_only(true),
        )
        .map(ReadOnlyScope::new)
    }

    /// Hide the ambient scope until the returned guard is dropped
    ///
    /// # Errors
    ///
    /// `NoChain` inside a tokio runtime outside `ambient::chain`.
    pub fn suppress_ambient(&self) -> ScopeResult<AmbientSuppressor> {
        AmbientSuppressor::new()
    }

    /// Run `f` inside a scope
    ///
    /// The scope is disposed when `f` returns. An `Err` from `f` marks the
    /// scope failed first, so a creator discards its changes; a disposal
    /// error after that is logged and the closure's error is returned.
    ///
    /// # Errors
    ///
    /// The closure's error, or any acquire/dispose error converted into `E`.
    pub fn run<T, E, F>(&self, options: ScopeOptions, f: F) -> Result<T, E>
    where
        E: From<ScopeError>,
        F: FnOnce(&mut SessionScope) -> Result<T, E>,
    {
        let mut scope = self.acquire(options)?;
        match f(&mut scope) {
            Ok(value) => {
                scope.finish()?;
                Ok(value)
            }
            Err(err) => {
                scope.mark_failed();
                let scope_id = scope.id();
                // closure error wins over disposal errors
                if let Err(dispose_err) = scope.finish() {
                    warn!(
                        scope_id = scope_id.as_u64(),
                        error = %dispose_err,
                        "Scope disposal failed after unit of work error"
                    );
                }
                Err(err)
            }
        }
    }

    /// Run `f` inside a read-only scope
    ///
    /// # Errors
    ///
    /// The closure's error, or any acquire/dispose error converted into `E`.
    pub fn run_read_only<T, E, F>(&self, join: JoinOption, f: F) -> Result<T, E>
    where
        E: From<ScopeError>,
        F: FnOnce(&ReadOnlyScope) -> Result<T, E>,
    {
        let scope = self.create_read_only(join)?;
        let result = f(&scope);
        let disposed = scope.finish();
        let value = result?;
        disposed?;
        Ok(value)
    }
}

impl std::fmt::Debug for ScopeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeFactory")
            .field("config", &self.config)
            .finish()
    }
}
