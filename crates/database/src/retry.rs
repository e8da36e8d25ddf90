//! Retry-on-failure for transient database errors.
//!
//! Connection drops, pool exhaustion and a handful of server conditions
//! (deadlocks, serialization failures, restarts) are expected to go away on
//! their own, so operations failing with one of them are re-run with an
//! exponential backoff. Every other error is returned immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::DbError;

/// Retries after the first attempt, matching the context's default policy.
pub const MAX_RETRY_COUNT: u32 = 3;

/// SQLSTATE codes that indicate a transient condition on the server.
const TRANSIENT_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "53000", // insufficient_resources
    "53100", // disk_full
    "53200", // out_of_memory
    "53300", // too_many_connections
    "55P03", // lock_not_available
    "57P01", // admin_shutdown
    "57P02", // crash_shutdown
    "57P03", // cannot_connect_now
];

/// Whether a SQLSTATE denotes a condition worth retrying.
///
/// Class `08` (connection exception) is transient as a whole.
pub fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || TRANSIENT_SQLSTATES.contains(&code)
}

/// Whether a driver error is worth retrying.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_) => true,
        sqlx::Error::Database(db) => db.code().is_some_and(|code| is_transient_sqlstate(&code)),
        _ => false,
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential growth
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000, // 30 seconds
            multiplier: 2.0,
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

impl BackoffConfig {
    /// The delay to wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64);

        // Apply jitter only if jitter_factor > 0
        let delay = if self.jitter_factor > 0.0 && capped > 0.0 {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::thread_rng().gen_range(-jitter_range..jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(delay as u64)
    }
}

/// How many times, and how patiently, to retry transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: BackoffConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRY_COUNT)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: BackoffConfig::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs `operation`, re-running it while it fails transiently.
    ///
    /// The operation is attempted at most `max_retries + 1` times. When the
    /// retries are exhausted the last driver error is wrapped in
    /// [`DbError::RetryLimitExceeded`].
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut retries = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) => {
                    if retries >= self.max_retries {
                        return Err(DbError::RetryLimitExceeded {
                            attempts: retries + 1,
                            source: err,
                        });
                    }
                    retries += 1;
                    let delay = self.backoff.delay_for(retries);
                    tracing::warn!(
                        retry = retries,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient database failure, retrying."
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
