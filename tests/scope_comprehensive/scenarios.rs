//! Canonical nesting walkthroughs

use std::sync::Arc;

use crate::common::*;
use serde_json::json;

/// Nested join shares the session; only the creator commits.
#[test]
fn scenario_a_nested_join_commits_once() {
    let env = TestEnv::new();
    isolated(|| {
        let mut s1 = env.factory.create(JoinOption::JoinExisting).unwrap();
        assert!(s1.is_creator());
        let outer_orders = s1.sessions().get::<OrdersSession>().unwrap();
        outer_orders.put("order:1", json!({"total": 42})).unwrap();

        let mut s2 = env.factory.create(JoinOption::JoinExisting).unwrap();
        assert!(!s2.is_creator());
        let inner_orders = s2.sessions().get::<OrdersSession>().unwrap();
        assert!(Arc::ptr_eq(&outer_orders, &inner_orders));

        s2.dispose().unwrap();
        assert_eq!(env.orders().commits, 0);
        assert_eq!(env.orders().disposals, 0);

        s1.dispose().unwrap();
    });

    let stats = env.orders();
    assert_eq!(stats.opened, 1);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.disposals, 1);
    assert_eq!(env.db.get("order:1"), Some(json!({"total": 42})));
}

/// A forced-new nested scope commits independently of its parent.
#[test]
fn scenario_b_force_create_new_commits_independently() {
    let env = TestEnv::new();
    isolated(|| {
        let mut s1 = env.factory.create(JoinOption::JoinExisting).unwrap();
        s1.get::<OrdersSession>()
            .unwrap()
            .put("outer", json!(1))
            .unwrap();

        let mut s2 = env.factory.create(JoinOption::ForceCreateNew).unwrap();
        assert!(s2.is_creator());
        let inner = s2.get::<OrdersSession>().unwrap();
        assert!(!Arc::ptr_eq(&inner, &s1.get::<OrdersSession>().unwrap()));
        inner.put("inner", json!(2)).unwrap();

        s2.dispose().unwrap();
        assert_eq!(env.orders().commits, 1);
        assert_eq!(env.db.get("inner"), Some(json!(2)));
        assert_eq!(env.db.get("outer"), None);

        s1.dispose().unwrap();
    });

    let stats = env.orders();
    assert_eq!(stats.opened, 2);
    assert_eq!(stats.commits, 2);
    assert_eq!(stats.disposals, 2);
    assert_eq!(env.db.get("outer"), Some(json!(1)));
}

/// One failing session type does not stop the others from committing or disposing.
#[test]
fn scenario_c_partial_commit_failure_is_aggregated() {
    let env = TestEnv::new();
    let err = isolated(|| {
        let mut scope = env.factory.create(JoinOption::JoinExisting).unwrap();
        scope
            .get::<OrdersSession>()
            .unwrap()
            .put("order", json!(1))
            .unwrap();
        scope
            .get::<CustomersSession>()
            .unwrap()
            .put("customer", json!(2))
            .unwrap();
        env.db.fail_commits::<Customers>();

        let err = scope.dispose().unwrap_err();
        assert!(scope.is_disposed());
        assert!(ambient::current().is_none());
        err
    });

    let commit = err.as_commit().expect("aggregate commit error");
    assert_eq!(commit.failed_types(), vec![SessionType::of::<CustomersSession>()]);
    assert_eq!(commit.committed, vec![SessionType::of::<OrdersSession>()]);
    assert!(commit.is_partial());

    let message = err.to_string();
    assert!(message.contains("MemorySession<Customers>"), "{}", message);
    assert!(message.contains("partially committed"), "{}", message);

    assert_eq!(env.orders().disposals + env.customers().disposals, 2);
    assert_eq!(env.db.get("order"), Some(json!(1)));
    assert_eq!(env.db.get("customer"), None);
}

/// Three levels deep with a read-only leaf and an independent audit scope.
#[test]
fn scenario_service_layers() {
    let env = TestEnv::new();
    isolated(|| {
        let mut request = env.factory.create(JoinOption::JoinExisting).unwrap();

        // repository layer
        {
            let mut repo = env.factory.create(JoinOption::JoinExisting).unwrap();
            repo.get::<CustomersSession>()
                .unwrap()
                .put("customer:7", json!("Ada"))
                .unwrap();
            repo.dispose().unwrap();
        }

        // query layer sees the uncommitted write through the shared session
        {
            let reader = env
                .factory
                .create_read_only(JoinOption::JoinExisting)
                .unwrap();
            let customers = reader.get::<CustomersSession>().unwrap();
            assert_eq!(customers.get("customer:7"), Some(json!("Ada")));
            reader.finish().unwrap();
        }

        // audit entries persist on their own
        {
            let _suppressed = env.factory.suppress_ambient().unwrap();
            let mut audit = env.factory.create(JoinOption::JoinExisting).unwrap();
            audit
                .get::<AuditSession>()
                .unwrap()
                .put("audit:1", json!("customer created"))
                .unwrap();
            audit.dispose().unwrap();
        }
        assert_eq!(env.db.get("audit:1"), Some(json!("customer created")));
        assert_eq!(env.db.get("customer:7"), None);

        request.dispose().unwrap();
    });

    assert_eq!(env.db.get("customer:7"), Some(json!("Ada")));
    assert_eq!(env.customers().commits, 1);
    assert_eq!(env.audit().commits, 1);
}
