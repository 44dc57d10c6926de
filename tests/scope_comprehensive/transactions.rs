//! Isolation levels and explicit transactions

use crate::common::*;
use serde_json::json;

#[test]
fn test_transaction_committed_after_flush() {
    let env = TestEnv::new();
    isolated(|| {
        let mut scope = env
            .factory
            .create_with_transaction(IsolationLevel::RepeatableRead)
            .unwrap();
        let orders = scope.get::<OrdersSession>().unwrap();
        assert_eq!(orders.isolation_level(), Some(IsolationLevel::RepeatableRead));
        orders.put("k", json!(1)).unwrap();
        scope.dispose().unwrap();
    });

    let stats = env.orders();
    assert_eq!(stats.transactions_begun, 1);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.transactions_committed, 1);
    assert_eq!(stats.transactions_rolled_back, 0);
    assert_eq!(env.db.get("k"), Some(json!(1)));
}

#[test]
fn test_faulted_transaction_rolled_back_on_dispose() {
    let env = TestEnv::new();
    isolated(|| {
        let mut scope = env
            .factory
            .create_with_transaction(IsolationLevel::Serializable)
            .unwrap();
        scope
            .get::<OrdersSession>()
            .unwrap()
            .put("k", json!(1))
            .unwrap();
        scope.mark_failed();
        scope.dispose().unwrap();
    });

    let stats = env.orders();
    assert_eq!(stats.transactions_rolled_back, 1);
    assert_eq!(stats.transactions_committed, 0);
    assert_eq!(env.db.get("k"), None);
}

#[test]
fn test_failed_commit_rolls_back_only_that_session() {
    let env = TestEnv::new();
    let err = isolated(|| {
        let scope = env
            .factory
            .create_with_transaction(IsolationLevel::ReadCommitted)
            .unwrap();
        scope
            .get::<OrdersSession>()
            .unwrap()
            .put("order", json!(1))
            .unwrap();
        scope
            .get::<CustomersSession>()
            .unwrap()
            .put("customer", json!(1))
            .unwrap();
        env.db.fail_commits::<Customers>();
        scope.finish().unwrap_err()
    });

    assert!(err.as_commit().unwrap().is_partial());
    assert_eq!(env.orders().transactions_committed, 1);
    assert_eq!(env.customers().transactions_rolled_back, 1);
    assert_eq!(env.db.get("order"), Some(json!(1)));
    assert_eq!(env.db.get("customer"), None);
}

#[test]
fn test_join_with_matching_isolation() {
    let env = TestEnv::new();
    isolated(|| {
        let outer = env
            .factory
            .acquire(ScopeOptions::new().with_isolation(IsolationLevel::Snapshot))
            .unwrap();
        let inner = env
            .factory
            .acquire(ScopeOptions::new().with_isolation(IsolationLevel::Snapshot))
            .unwrap();
        assert!(!inner.is_creator());
        assert!(std::ptr::eq(outer.sessions(), inner.sessions()));
    });
}

#[test]
fn test_join_with_conflicting_isolation_fails() {
    let env = TestEnv::new();
    isolated(|| {
        let _outer = env.factory.create(JoinOption::JoinExisting).unwrap();
        let err = env
            .factory
            .acquire(ScopeOptions::new().with_isolation(IsolationLevel::Serializable))
            .unwrap_err();
        assert_eq!(
            err,
            ScopeError::IsolationConflict {
                requested: IsolationLevel::Serializable,
                ambient: None,
            }
        );
        assert_eq!(ambient::depth(), 1);
    });
}

#[test]
fn test_read_only_transaction_never_commits() {
    let env = TestEnv::new();
    isolated(|| {
        let reader = env
            .factory
            .create_read_only_with_transaction(IsolationLevel::Snapshot)
            .unwrap();
        reader.get::<OrdersSession>().unwrap();
        reader.finish().unwrap();
    });
    let stats = env.orders();
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.transactions_rolled_back, 1);
}
