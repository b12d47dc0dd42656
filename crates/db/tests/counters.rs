//! Integration tests for the Postgres counter store.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use photosheet_core::counter_store::{CounterStore, StoreDecision};
use photosheet_core::rate_limit::RateWindow;
use photosheet_core::types::Timestamp;
use photosheet_db::PgCounterStore;
use sqlx::PgPool;

fn at(secs: i64) -> Timestamp {
    chrono::Utc.timestamp_opt(secs, 0).unwrap()
}

fn minute(limit: u32) -> RateWindow {
    RateWindow::new(limit, Duration::from_secs(60))
}

#[sqlx::test(migrations = "./migrations")]
async fn health_check_passes(pool: PgPool) {
    photosheet_db::health_check(&pool).await.unwrap();
}

#[sqlx::test(migrations = "./migrations")]
async fn admits_until_ceiling_then_rejects(pool: PgPool) {
    let store = PgCounterStore::new(pool);
    let windows = [minute(2)];

    for _ in 0..2 {
        let decision = store.check_and_increment("10.0.0.1", &windows, at(600)).await.unwrap();
        assert_eq!(decision, StoreDecision::Admit);
    }

    let decision = store.check_and_increment("10.0.0.1", &windows, at(630)).await.unwrap();
    assert_eq!(
        decision,
        StoreDecision::Reject { retry_after: Some(Duration::from_secs(30)) }
    );
    assert_eq!(store.hits("10.0.0.1", &windows[0], at(630)).await.unwrap(), 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn rejected_attempt_is_counted_in_every_window(pool: PgPool) {
    let store = PgCounterStore::new(pool);
    let windows = [minute(5), RateWindow::new(1, Duration::from_secs(86_400))];

    store.check_and_increment("c", &windows, at(0)).await.unwrap();
    let decision = store.check_and_increment("c", &windows, at(10)).await.unwrap();
    assert!(matches!(decision, StoreDecision::Reject { .. }));

    assert_eq!(store.hits("c", &windows[0], at(10)).await.unwrap(), 2);
    assert_eq!(store.hits("c", &windows[1], at(10)).await.unwrap(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn new_window_starts_from_zero(pool: PgPool) {
    let store = PgCounterStore::new(pool);
    let windows = [minute(1)];

    store.check_and_increment("c", &windows, at(0)).await.unwrap();
    assert_eq!(
        store.check_and_increment("c", &windows, at(60)).await.unwrap(),
        StoreDecision::Admit
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn purge_removes_only_expired_windows(pool: PgPool) {
    let store = PgCounterStore::new(pool);
    let windows = [minute(10)];

    store.check_and_increment("old", &windows, at(0)).await.unwrap();
    store.check_and_increment("new", &windows, at(120)).await.unwrap();

    let removed = store.purge_expired(at(150)).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.hits("new", &windows[0], at(150)).await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_checks_respect_ceiling(pool: PgPool) {
    let store = Arc::new(PgCounterStore::new(pool));
    let windows = Arc::new([minute(3)]);

    let mut handles = Vec::new();
    for _ in 0..12 {
        let store = Arc::clone(&store);
        let windows = Arc::clone(&windows);
        handles.push(tokio::spawn(async move {
            store.check_and_increment("c", &windows[..], at(0)).await.unwrap()
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() == StoreDecision::Admit {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 3);
}
