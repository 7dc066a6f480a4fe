//! Per-connector failure bookkeeping.
//!
//! A connector that fails is skipped for its configured no-retry delay so a
//! struggling backend is not hit by every concurrent request. The last
//! failure time is the only engine state shared between requests; it lives
//! in an atomic so readers never block.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

const NEVER_FAILED: i64 = i64::MIN;

/// Thread-safe record of a connector's most recent failure.
pub struct FailureCell {
    last_failure_ms: AtomicI64,
}

impl FailureCell {
    pub fn new() -> Self {
        Self {
            last_failure_ms: AtomicI64::new(NEVER_FAILED),
        }
    }

    /// Records a failure at `now_ms`.
    pub fn record_failure(&self, now_ms: i64) {
        self.last_failure_ms.store(now_ms, Ordering::Release);
    }

    /// Forgets any recorded failure.
    pub fn clear(&self) {
        self.last_failure_ms.store(NEVER_FAILED, Ordering::Release);
    }

    pub fn last_failure_ms(&self) -> Option<i64> {
        match self.last_failure_ms.load(Ordering::Acquire) {
            NEVER_FAILED => None,
            ms => Some(ms),
        }
    }

    /// Milliseconds left in the no-retry window, or `None` if the connector
    /// may be attempted.
    ///
    /// The window is half-open: a connector that failed at `t` with delay
    /// `d` is skipped for `t <= now < t + d`.
    pub fn remaining_ms(&self, now_ms: i64, delay: Duration) -> Option<i64> {
        let failed_at = self.last_failure_ms()?;
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let retry_at = failed_at.saturating_add(delay_ms);
        (now_ms < retry_at).then(|| retry_at - now_ms)
    }
}

impl Default for FailureCell {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FailureCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureCell")
            .field("last_failure_ms", &self.last_failure_ms())
            .finish()
    }
}
