//! The `run` / `run_read_only` helpers

use crate::common::*;
use serde_json::json;

#[derive(Debug)]
enum AppError {
    Scope(ScopeError),
    Rejected(&'static str),
}

impl From<ScopeError> for AppError {
    fn from(err: ScopeError) -> Self {
        AppError::Scope(err)
    }
}

fn place_order(env: &TestEnv, id: u32, total: i64) -> Result<(), AppError> {
    env.factory.run(ScopeOptions::new(), |scope| {
        if total <= 0 {
            return Err(AppError::Rejected("empty order"));
        }
        let orders = scope.get::<OrdersSession>()?;
        orders
            .put(format!("order:{}", id), json!({ "total": total }))
            .map_err(|_| AppError::Rejected("write failed"))?;
        Ok(())
    })
}

#[test]
fn test_run_commits_nested_calls_once() {
    let env = TestEnv::new();
    isolated(|| {
        env.factory
            .run(ScopeOptions::new(), |_scope| {
                place_order(&env, 1, 10)?;
                place_order(&env, 2, 20)?;
                Ok::<_, AppError>(())
            })
            .unwrap();
    });
    assert_eq!(env.orders().commits, 1);
    assert_eq!(env.db.len(), 2);
}

#[test]
fn test_run_error_discards_whole_unit_of_work() {
    let env = TestEnv::new();
    let result = isolated(|| {
        env.factory.run(ScopeOptions::new(), |_scope| {
            place_order(&env, 1, 10)?;
            place_order(&env, 2, 0)?;
            Ok::<_, AppError>(())
        })
    });
    assert!(matches!(result, Err(AppError::Rejected("empty order"))));
    assert_eq!(env.orders().commits, 0);
    assert!(env.db.is_empty());
}

#[test]
fn test_run_surfaces_scope_errors() {
    let env = TestEnv::new();
    let result = isolated(|| {
        let _reader = env
            .factory
            .create_read_only(JoinOption::JoinExisting)
            .unwrap();
        place_order(&env, 1, 10)
    });
    assert!(matches!(
        result,
        Err(AppError::Scope(ScopeError::ReadWriteInReadOnly))
    ));
}

#[test]
fn test_run_read_only_reads_committed_data() {
    let env = TestEnv::new();
    isolated(|| {
        place_order(&env, 1, 10).unwrap();
        let total = env
            .factory
            .run_read_only(JoinOption::JoinExisting, |scope| {
                let orders = scope.get::<OrdersSession>()?;
                Ok::<_, ScopeError>(orders.get("order:1").map(|v| v["total"].clone()))
            })
            .unwrap();
        assert_eq!(total, Some(json!(10)));
    });
}
