//! Hiding the ambient scope
//!
//! Code that must not take part in the caller's unit of work (an audit
//! write that has to persist even if the caller rolls back, a background
//! job started from a request) suppresses the ambient scope. While the
//! suppressor is active [`ambient::current`](crate::ambient::current)
//! returns `None`, so new scopes create their own sessions.

use tracing::{debug, warn};

use ambit_core::{ScopeId, ScopeResult};

use crate::ambient::{self, PopOutcome};

/// Guard that hides the ambient scope until disposed
///
/// Dropping the guard restores the ambient scope. Like scopes,
/// suppressors must be disposed in reverse creation order.
#[derive(Debug)]
pub struct AmbientSuppressor {
    id: ScopeId,
    hidden: Option<ScopeId>,
    restored: bool,
}

impl AmbientSuppressor {
    /// Push a suppression marker on the calling chain
    ///
    /// # Errors
    ///
    /// `NoChain` inside a tokio runtime outside `ambient::chain`.
    pub(crate) fn new() -> ScopeResult<Self> {
        let id = ScopeId::next();
        let hidden = ambient::current_id();
        ambient::push_suppressed(id)?;
        debug!(
            suppressor = id.as_u64(),
            hidden = ?hidden.map(|h| h.as_u64()),
            "Suppressed ambient scope"
        );
        Ok(Self {
            id,
            hidden,
            restored: false,
        })
    }

    /// Scope that was ambient when the suppressor was created
    pub fn hidden(&self) -> Option<ScopeId> {
        self.hidden
    }

    /// Whether the ambient scope was restored
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Restore the ambient scope
    ///
    /// Idempotent. Scopes created while suppressed and not yet disposed
    /// are unwound along with the suppressor.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        match ambient::pop(self.id) {
            PopOutcome::Top => {}
            PopOutcome::OutOfOrder { current, unwound } => warn!(
                suppressor = self.id.as_u64(),
                current = current.as_u64(),
                unwound,
                "Suppressor restored out of order; unwound ambient stack"
            ),
            PopOutcome::Missing => warn!(
                suppressor = self.id.as_u64(),
                "Suppressor not found on this chain's ambient stack"
            ),
        }
        debug!(suppressor = self.id.as_u64(), "Restored ambient scope");
    }
}

impl Drop for AmbientSuppressor {
    fn drop(&mut self) {
        self.restore();
    }
}
