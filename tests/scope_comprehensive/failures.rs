//! Provider failures, commit failures and out-of-order disposal

use crate::common::*;
use ambit::ProviderError;
use serde_json::json;

mod provider {
    use super::*;

    #[test]
    fn test_connection_failure_is_retryable() {
        let env = TestEnv::new();
        isolated(|| {
            let scope = env.factory.create(JoinOption::JoinExisting).unwrap();
            env.db.fail_connections::<Orders>();

            let err = scope.get::<OrdersSession>().unwrap_err();
            assert!(matches!(
                err,
                ScopeError::Provider(ProviderError::Connection { .. })
            ));
            assert!(scope.sessions().is_empty());

            env.db.heal();
            let orders = scope.get::<OrdersSession>().unwrap();
            orders.put("k", json!(1)).unwrap();
            scope.finish().unwrap();
        });
        assert_eq!(env.orders().opened, 1);
        assert_eq!(env.db.get("k"), Some(json!(1)));
    }

    #[test]
    fn test_unregistered_session_type() {
        struct Unknown;
        let env = TestEnv::new();
        isolated(|| {
            let scope = env.factory.create(JoinOption::JoinExisting).unwrap();
            let err = scope.get::<MemorySession<Unknown>>().unwrap_err();
            assert_eq!(
                err,
                ScopeError::Provider(ProviderError::Unregistered {
                    session_type: SessionType::of::<MemorySession<Unknown>>(),
                })
            );
        });
    }
}

mod commit {
    use super::*;

    #[test]
    fn test_every_session_fails() {
        let env = TestEnv::new();
        let err = isolated(|| {
            let scope = env.factory.create(JoinOption::JoinExisting).unwrap();
            scope.get::<OrdersSession>().unwrap();
            scope.get::<CustomersSession>().unwrap();
            env.db.fail_commits::<Orders>();
            env.db.fail_commits::<Customers>();
            scope.finish().unwrap_err()
        });

        let commit = err.as_commit().unwrap();
        assert_eq!(commit.failures.len(), 2);
        assert!(!commit.is_partial());
        assert!(!err.to_string().contains("partially committed"));
        assert_eq!(env.orders().disposals, 1);
        assert_eq!(env.customers().disposals, 1);
    }

    #[test]
    fn test_failed_save_then_dispose_does_not_retry() {
        let env = TestEnv::new();
        isolated(|| {
            let mut scope = env.factory.create(JoinOption::JoinExisting).unwrap();
            scope
                .get::<OrdersSession>()
                .unwrap()
                .put("k", json!(1))
                .unwrap();
            env.db.fail_commits::<Orders>();
            assert!(scope.save_changes().is_err());
            env.db.heal();
            scope.dispose().unwrap();
        });
        assert_eq!(env.orders().failed_commits, 1);
        assert_eq!(env.orders().commits, 0);
        assert_eq!(env.db.get("k"), None);
    }

    #[test]
    fn test_failed_unit_of_work_is_distinguishable() {
        let env = TestEnv::new();
        isolated(|| {
            let mut ok = env.factory.create(JoinOption::ForceCreateNew).unwrap();
            ok.get::<OrdersSession>().unwrap();
            assert!(ok.dispose().is_ok());

            let mut failing = env.factory.create(JoinOption::ForceCreateNew).unwrap();
            failing.get::<OrdersSession>().unwrap();
            env.db.fail_commits::<Orders>();
            assert!(failing.dispose().is_err());
            assert!(failing.is_faulted());
        });
    }
}

mod ordering {
    use super::*;

    #[test]
    fn test_out_of_order_dispose_logged_and_repaired() {
        let env = TestEnv::new();
        isolated(|| {
            let mut a = env.factory.create(JoinOption::JoinExisting).unwrap();
            let mut b = env.factory.create(JoinOption::ForceCreateNew).unwrap();
            let mut c = env.factory.create(JoinOption::ForceCreateNew).unwrap();
            assert_eq!(ambient::depth(), 3);

            b.dispose().unwrap();
            // b and everything above it is gone
            assert_eq!(ambient::current_id(), Some(a.id()));

            c.dispose().unwrap();
            a.dispose().unwrap();
            assert_eq!(ambient::depth(), 0);
        });
    }

    #[test]
    fn test_strict_ordering_reports_violation() {
        let env = TestEnv::strict();
        isolated(|| {
            let mut a = env.factory.create(JoinOption::JoinExisting).unwrap();
            let mut b = env.factory.create(JoinOption::ForceCreateNew).unwrap();
            b.get::<OrdersSession>()
                .unwrap()
                .put("b", json!(1))
                .unwrap();

            let err = a.dispose().unwrap_err();
            assert_eq!(
                err,
                ScopeError::OutOfOrderDisposal {
                    disposed: a.id(),
                    current: Some(b.id()),
                }
            );
            assert_eq!(ambient::depth(), 0);

            // b was already unwound, but still commits its own sessions
            assert!(matches!(
                b.dispose(),
                Err(ScopeError::OutOfOrderDisposal { current: None, .. })
            ));
        });
        assert_eq!(env.db.get("b"), Some(json!(1)));
    }

    #[test]
    fn test_joiner_disposal_order_is_not_tracked() {
        let env = TestEnv::strict();
        isolated(|| {
            let mut outer = env.factory.create(JoinOption::JoinExisting).unwrap();
            let mut joiner = env.factory.create(JoinOption::JoinExisting).unwrap();
            outer.dispose().unwrap();
            joiner.dispose().unwrap();
        });
    }
}
