//! Postgres-backed [`CounterStore`] for multi-process deployments.
//!
//! Each check runs in one transaction that first takes a transaction-scoped
//! advisory lock on the client key, so concurrent API processes serialize
//! per client while different clients proceed in parallel. The attempt is
//! counted in every window, admitted or not.

use std::time::Duration;

use async_trait::async_trait;
use photosheet_core::counter_store::{CounterStore, StoreDecision};
use photosheet_core::error::CoreError;
use photosheet_core::rate_limit::RateWindow;
use photosheet_core::types::Timestamp;

use crate::DbPool;

pub struct PgCounterStore {
    pool: DbPool,
}

impl PgCounterStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Current hit count for one client/window, or 0 if none recorded.
    pub async fn hits(
        &self,
        client_key: &str,
        window: &RateWindow,
        now: Timestamp,
    ) -> Result<i32, sqlx::Error> {
        let hits = sqlx::query_scalar::<_, i32>(
            "SELECT hits FROM rate_limit_counters \
             WHERE client_key = $1 AND window_key = $2 AND window_start = $3",
        )
        .bind(client_key)
        .bind(window.key())
        .bind(window.window_start(now))
        .fetch_optional(&self.pool)
        .await?;
        Ok(hits.unwrap_or(0))
    }

    /// Delete counters whose window has ended. Returns rows removed.
    pub async fn purge_expired(&self, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rate_limit_counters WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn check_and_increment_tx(
        &self,
        client_key: &str,
        windows: &[RateWindow],
        now: Timestamp,
    ) -> Result<StoreDecision, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(client_key)
            .execute(&mut *tx)
            .await?;

        let mut retry_after: Option<Duration> = None;
        for window in windows {
            let hits = sqlx::query_scalar::<_, i32>(
                "SELECT hits FROM rate_limit_counters \
                 WHERE client_key = $1 AND window_key = $2 AND window_start = $3",
            )
            .bind(client_key)
            .bind(window.key())
            .bind(window.window_start(now))
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(0);

            if i64::from(hits) >= i64::from(window.limit) {
                let wait = window.retry_after(now);
                retry_after = Some(retry_after.map_or(wait, |w| w.max(wait)));
            }
        }

        for window in windows {
            let start = window.window_start(now);
            let expires_at = chrono::DateTime::from_timestamp(start + window.period_secs(), 0)
                .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);

            sqlx::query(
                "INSERT INTO rate_limit_counters \
                    (client_key, window_key, window_start, hits, expires_at) \
                 VALUES ($1, $2, $3, 1, $4) \
                 ON CONFLICT ON CONSTRAINT pk_rate_limit_counters \
                 DO UPDATE SET hits = rate_limit_counters.hits + 1",
            )
            .bind(client_key)
            .bind(window.key())
            .bind(start)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if retry_after.is_some() {
            return Ok(StoreDecision::Reject { retry_after });
        }
        Ok(StoreDecision::Admit)
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn check_and_increment(
        &self,
        client_key: &str,
        windows: &[RateWindow],
        now: Timestamp,
    ) -> Result<StoreDecision, CoreError> {
        self.check_and_increment_tx(client_key, windows, now)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, client = %client_key, "Counter store query failed");
                CoreError::Store(e.to_string())
            })
    }
}
