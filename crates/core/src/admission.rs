//! Admission controller: the gate every processing request passes before
//! the pipeline runs.
//!
//! ```text
//! Unchecked --exempt session--> Exempt
//! Unchecked --otherwise-------> Counted --all windows have room--> Admitted
//!                                       --any window full-------> Rejected
//! ```
//!
//! Exempt callers never touch the counters. Every counted attempt is
//! recorded in each window, admitted or not. Rejected callers get a
//! retry-after from the store, or [`DEFAULT_RETRY_AFTER`] when the store
//! cannot say.

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;

use crate::counter_store::{CounterStore, StoreDecision};
use crate::error::CoreError;
use crate::rate_limit::RateWindow;
use crate::types::Timestamp;

/// Retry-after used when the limiter does not supply one.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(600);

/// Terminal admission state for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Exempt,
    Admitted,
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

pub struct AdmissionController {
    store: Arc<dyn CounterStore>,
    windows: Vec<RateWindow>,
    fallback_retry_after: Duration,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn CounterStore>, windows: Vec<RateWindow>) -> Self {
        Self {
            store,
            windows,
            fallback_retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    /// Override the retry-after used when the store gives none.
    pub fn with_fallback_retry_after(mut self, fallback: Duration) -> Self {
        self.fallback_retry_after = fallback;
        self
    }

    pub fn windows(&self) -> &[RateWindow] {
        &self.windows
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Decide whether `client_key` may proceed at `now`.
    pub async fn admit(
        &self,
        client_key: &str,
        exempt: bool,
        now: Timestamp,
    ) -> Result<Admission, CoreError> {
        if exempt {
            tracing::debug!(client = %client_key, "Exempt session bypasses rate limit");
            return Ok(Admission::Exempt);
        }

        match self
            .store
            .check_and_increment(client_key, &self.windows, now)
            .await?
        {
            StoreDecision::Admit => Ok(Admission::Admitted),
            StoreDecision::Reject { retry_after } => {
                let retry_after = retry_after.unwrap_or(self.fallback_retry_after);
                tracing::info!(
                    client = %client_key,
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limit exceeded"
                );
                Ok(Admission::Rejected { retry_after })
            }
        }
    }
}

/// Render `now + retry_after` in a fixed timezone, e.g.
/// `"19 Oct 2026, 03:45:10 PM IST"`.
pub fn render_retry_deadline(
    now: Timestamp,
    retry_after: Duration,
    offset: FixedOffset,
    label: &str,
) -> String {
    let wait = chrono::Duration::from_std(retry_after).unwrap_or(chrono::Duration::MAX);
    let deadline = now
        .checked_add_signed(wait)
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
        .with_timezone(&offset);
    format!("{} {label}", deadline.format("%d %b %Y, %I:%M:%S %p"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
