//! Pluggable rate-limit counter storage.
//!
//! A [`CounterStore`] performs the whole admission check for one client as
//! a single atomic step: every window is checked against its ceiling, then
//! every counter is incremented, whether the attempt was admitted or not.
//! Two concurrent requests can never both take the last slot of a window,
//! and a client retrying while rejected keeps its windows full.
//!
//! [`InMemoryCounterStore`] serves single-process deployments; the Postgres
//! store in `photosheet-db` honors the same contract across processes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::rate_limit::RateWindow;
use crate::types::Timestamp;

/// Entries are swept for expired windows once the map grows past this size.
const SWEEP_THRESHOLD: usize = 10_000;

/// Outcome of an atomic check-and-increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDecision {
    /// All windows had room.
    Admit,
    /// At least one window was already full. `retry_after` is the longest
    /// wait among the full windows, when the store knows it.
    Reject { retry_after: Option<Duration> },
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Short backend label for health reporting.
    fn backend_name(&self) -> &'static str;

    /// Atomically check `client_key` against `windows` at `now` and count
    /// the attempt in every window.
    async fn check_and_increment(
        &self,
        client_key: &str,
        windows: &[RateWindow],
        now: Timestamp,
    ) -> Result<StoreDecision, CoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct WindowCount {
    window_start: i64,
    period_secs: i64,
    hits: u32,
}

/// Process-local counters behind a single lock.
#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<(String, String), WindowCount>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counter entries (one per client per window).
    pub async fn len(&self) -> usize {
        self.counters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Attempts counted for one client in the window containing `now`.
    pub async fn hits(&self, client_key: &str, window: &RateWindow, now: Timestamp) -> u32 {
        let start = window.window_start(now);
        self.counters
            .lock()
            .await
            .get(&(client_key.to_string(), window.key()))
            .filter(|c| c.window_start == start)
            .map_or(0, |c| c.hits)
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn check_and_increment(
        &self,
        client_key: &str,
        windows: &[RateWindow],
        now: Timestamp,
    ) -> Result<StoreDecision, CoreError> {
        let mut counters = self.counters.lock().await;

        if counters.len() > SWEEP_THRESHOLD {
            let now_secs = now.timestamp();
            counters.retain(|_, c| c.window_start + c.period_secs > now_secs);
        }

        let mut retry_after: Option<Duration> = None;
        for window in windows {
            let start = window.window_start(now);
            let hits = counters
                .get(&(client_key.to_string(), window.key()))
                .filter(|c| c.window_start == start)
                .map_or(0, |c| c.hits);

            if hits >= window.limit {
                let wait = window.retry_after(now);
                retry_after = Some(retry_after.map_or(wait, |w| w.max(wait)));
            }
        }

        for window in windows {
            let start = window.window_start(now);
            let entry = counters
                .entry((client_key.to_string(), window.key()))
                .or_insert(WindowCount {
                    window_start: start,
                    period_secs: window.period_secs(),
                    hits: 0,
                });
            if entry.window_start != start {
                entry.window_start = start;
                entry.hits = 0;
            }
            entry.hits = entry.hits.saturating_add(1);
        }

        if retry_after.is_some() {
            return Ok(StoreDecision::Reject { retry_after });
        }
        Ok(StoreDecision::Admit)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
