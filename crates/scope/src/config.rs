//! Scope configuration via `ambit.toml`
//!
//! Every field has a default, so an empty file (or no file at all) gives
//! the standard behaviour: join the ambient scope, reject isolation
//! conflicts, and repair out-of-order disposal with a warning.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use ambit_core::{JoinOption, ScopeError, ScopeResult};

/// Config file name conventionally placed next to the application's data
pub const CONFIG_FILE_NAME: &str = "ambit.toml";

/// What to do when a join request names a different isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationConflictPolicy {
    /// Fail the join with `ScopeError::IsolationConflict`
    #[default]
    Error,
    /// Log a warning and join with the ambient isolation level
    Ignore,
}

/// Scope configuration loaded from `ambit.toml`.
///
/// # Example
///
/// ```toml
/// join_option = "join_existing"
/// isolation_conflict = "error"
/// strict_disposal_order = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Join mode used when the caller does not name one
    pub join_option: JoinOption,
    /// Policy for join requests with a conflicting isolation level
    pub isolation_conflict: IsolationConflictPolicy,
    /// Report out-of-order disposal as an error after repairing the stack
    pub strict_disposal_order: bool,
}

impl ScopeConfig {
    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Config` for malformed TOML or unknown values.
    pub fn from_toml_str(text: &str) -> ScopeResult<Self> {
        toml::from_str(text).map_err(|e| ScopeError::Config(e.to_string()))
    }

    /// Read configuration from a file
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Config` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> ScopeResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ScopeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Read configuration from a file, using defaults if it does not exist
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Config` if the file exists but cannot be parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> ScopeResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize to TOML
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::Config` if serialization fails.
    pub fn to_toml_string(&self) -> ScopeResult<String> {
        toml::to_string(self).map_err(|e| ScopeError::Config(e.to_string()))
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Ambit scope configuration
#
# Join mode for scopes that do not name one:
#   "join_existing"    = reuse the ambient scope's sessions (default)
#   "force_create_new" = always open an independent session set
join_option = "join_existing"

# A nested join that asks for a different isolation level:
#   "error"  = fail the join (default)
#   "ignore" = log a warning and join with the ambient isolation level
isolation_conflict = "error"

# Scopes disposed out of creation order are always repaired and logged.
# Set to true to also return an error from dispose().
strict_disposal_order = false
"#
    }
}
