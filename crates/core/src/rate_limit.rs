//! Fixed-window rate limit definitions.
//!
//! Limits are written the way operators configure them, e.g.
//! `"3 per minute; 10 per day"` or `"100/hour"`. Each [`RateWindow`] counts
//! hits inside aligned wall-clock windows (`floor(now / period) * period`),
//! so counters reset implicitly as windows roll over.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::CoreError;
use crate::types::Timestamp;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;
const SECS_PER_WEEK: u64 = 7 * SECS_PER_DAY;

static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(?:per|/)\s*(?:(\d+)\s*)?(second|minute|hour|day|week)s?$")
        .expect("rate limit pattern is valid")
});

/// One "N per period" ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Maximum admitted hits per window.
    pub limit: u32,
    /// Window length.
    pub period: Duration,
}

impl RateWindow {
    pub fn new(limit: u32, period: Duration) -> Self {
        Self { limit, period }
    }

    /// Parse a single `N per [M] <unit>` expression.
    pub fn parse(expr: &str) -> Result<Self, CoreError> {
        let normalized = expr.trim().to_ascii_lowercase();
        let caps = LIMIT_RE.captures(&normalized).ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid rate limit '{expr}'. Expected e.g. '10 per minute' or '100/day'"
            ))
        })?;

        let limit: u32 = caps[1]
            .parse()
            .map_err(|_| CoreError::Validation(format!("Rate limit count out of range in '{expr}'")))?;
        let multiplier: u64 = match caps.get(2) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| CoreError::Validation(format!("Period multiplier out of range in '{expr}'")))?,
            None => 1,
        };
        let unit_secs = match &caps[3] {
            "second" => 1,
            "minute" => SECS_PER_MINUTE,
            "hour" => SECS_PER_HOUR,
            "day" => SECS_PER_DAY,
            _ => SECS_PER_WEEK,
        };

        if multiplier == 0 {
            return Err(CoreError::Validation(format!(
                "Rate limit period must be non-zero in '{expr}'"
            )));
        }

        let secs = unit_secs.checked_mul(multiplier).ok_or_else(|| {
            CoreError::Validation(format!("Rate limit period too long in '{expr}'"))
        })?;
        Ok(Self::new(limit, Duration::from_secs(secs)))
    }

    pub fn period_secs(&self) -> i64 {
        self.period.as_secs().max(1) as i64
    }

    /// Stable identifier for persisting this window's counters.
    pub fn key(&self) -> String {
        format!("{}/{}s", self.limit, self.period_secs())
    }

    /// Unix second at which the window containing `now` began.
    pub fn window_start(&self, now: Timestamp) -> i64 {
        let period = self.period_secs();
        now.timestamp().div_euclid(period) * period
    }

    /// Time until the window containing `now` rolls over (at least 1s).
    pub fn retry_after(&self, now: Timestamp) -> Duration {
        let end = self.window_start(now) + self.period_secs();
        let remaining = (end - now.timestamp()).max(1);
        Duration::from_secs(remaining as u64)
    }
}

/// Parse a `;`- or `,`-separated list of limits. An empty string yields no
/// windows (rate limiting disabled).
pub fn parse_rate_limits(spec: &str) -> Result<Vec<RateWindow>, CoreError> {
    spec.split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RateWindow::parse)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
