//! `ambit.toml` driven behaviour

use std::fs;

use crate::common::*;
use ambit::CONFIG_FILE_NAME;
use tempfile::TempDir;

#[test]
fn test_config_file_drives_factory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &path,
        "join_option = \"force_create_new\"\nisolation_conflict = \"ignore\"\nstrict_disposal_order = true\n",
    )
    .unwrap();

    let config = ScopeConfig::load_or_default(&path).unwrap();
    assert_eq!(config.join_option, JoinOption::ForceCreateNew);
    assert_eq!(config.isolation_conflict, IsolationConflictPolicy::Ignore);
    assert!(config.strict_disposal_order);

    let env = TestEnv::with_config(config);
    isolated(|| {
        let outer = env.factory.create_default().unwrap();
        let inner = env.factory.create_default().unwrap();
        assert!(outer.is_creator());
        assert!(inner.is_creator());
    });
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ScopeConfig::load_or_default(dir.path().join(CONFIG_FILE_NAME)).unwrap();
    assert_eq!(config, ScopeConfig::default());
}

#[test]
fn test_default_template_round_trips() {
    let config = ScopeConfig::from_toml_str(ScopeConfig::default_toml()).unwrap();
    assert_eq!(config, ScopeConfig::default());
}

#[test]
fn test_ignore_policy_joins_despite_isolation() {
    let env = TestEnv::with_config(ScopeConfig {
        isolation_conflict: IsolationConflictPolicy::Ignore,
        ..ScopeConfig::default()
    });
    isolated(|| {
        let outer = env
            .factory
            .create_with_transaction(IsolationLevel::ReadCommitted)
            .unwrap();
        let inner = env
            .factory
            .acquire(ScopeOptions::new().with_isolation(IsolationLevel::Serializable))
            .unwrap();
        assert!(!inner.is_creator());
        assert_eq!(inner.isolation_level(), outer.isolation_level());
    });
}

#[test]
fn test_malformed_config_is_an_error() {
    let err = ScopeConfig::from_toml_str("isolation_conflict = \"sometimes\"").unwrap_err();
    assert!(matches!(err, ScopeError::Config(_)));
}
