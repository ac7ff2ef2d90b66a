//! Retry policy for transient transport failures
//!
//! One policy instance is shared by every remote call the harvester makes,
//! so backoff behavior is uniform instead of duplicated per caller.
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 401/403 | Never retried, fatal to the run |
//! | HTTP 429 | Retried with backoff |
//! | HTTP 5xx | Retried with backoff |
//! | Timeout / connect error | Retried with backoff |
//! | Other 4xx | Immediate failure |

use reqwest::StatusCode;
use std::time::Duration;

/// Retry policy: maximum attempts and a doubling backoff schedule
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt
    pub max_retries: u32,

    /// Backoff before the first retry; doubles on each subsequent retry
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    /// Returns whether a response status is a transient failure worth retrying
    pub fn retryable_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Returns whether a response status is an authorization rejection
    pub fn authorization_status(status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
    }

    /// Returns whether a transport-level error is worth retrying
    pub fn retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }

    /// Backoff duration before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt)
    }

    /// Whether another retry is allowed after `attempt` retries already made
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}
