//! Typed session registry
//!
//! `SessionRegistry` is the default [`SessionProvider`]: a map from session
//! type to constructor closure. Lookups use the `TypeId` carried by the
//! request, so one registry serves any number of session types without
//! runtime reflection.

use rustc_hash::FxHashMap;
use std::any::TypeId;
use std::fmt;

use crate::error::ProviderError;
use crate::traits::{AnySession, Session, SessionProvider};
use crate::types::{SessionRequest, SessionType};

type Constructor = Box<dyn Fn(&SessionRequest) -> Result<AnySession, ProviderError> + Send + Sync>;

/// Session provider backed by registered constructors
///
/// # Example
///
/// ```ignore
/// let registry = SessionRegistry::new()
///     .register(|req| OrdersSession::connect(ORDERS_URL, req.read_only))
///     .register(|req| BillingSession::connect(BILLING_URL, req.read_only));
/// ```
#[derive(Default)]
pub struct SessionRegistry {
    constructors: FxHashMap<TypeId, (SessionType, Constructor)>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor for session type `S` (builder form)
    pub fn register<S, F>(mut self, constructor: F) -> Self
    where
        S: Session,
        F: Fn(&SessionRequest) -> Result<S, ProviderError> + Send + Sync + 'static,
    {
        self.insert(constructor);
        self
    }

    /// Register the constructor for session type `S`
    ///
    /// Replaces any constructor previously registered for `S`.
    pub fn insert<S, F>(&mut self, constructor: F)
    where
        S: Session,
        F: Fn(&SessionRequest) -> Result<S, ProviderError> + Send + Sync + 'static,
    {
        let session_type = SessionType::of::<S>();
        let erased: Constructor =
            Box::new(move |request| constructor(request).map(|s| Box::new(s) as AnySession));
        self.constructors
            .insert(session_type.type_id(), (session_type, erased));
    }

    /// Whether a constructor for `S` is registered
    pub fn contains<S: 'static>(&self) -> bool {
        self.constructors.contains_key(&TypeId::of::<S>())
    }

    /// Number of registered session types
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl SessionProvider for SessionRegistry {
    fn create_session(&self, request: &SessionRequest) -> Result<AnySession, ProviderError> {
        match self.constructors.get(&request.session_type.type_id()) {
            Some((_, constructor)) => constructor(request),
            None => Err(ProviderError::Unregistered {
                session_type: request.session_type,
            }),
        }
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.constructors.values().map(|(ty, _)| ty))
            .finish()
    }
}
