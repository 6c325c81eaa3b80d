use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};

/// Target for retry noise, kept apart from the primary log.
pub const RETRY_TARGET: &str = "feedroll::retry";

/// Bounded exponential backoff: attempt `n` failing waits
/// `base_wait * multiplier^(n-1)` before attempt `n + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_wait: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_wait: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based). Saturates at
    /// `Duration::MAX` instead of overflowing.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        if exponent == 0 {
            return self.base_wait;
        }
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let secs = self.base_wait.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based.
    pub number: u32,
    pub max: u32,
}

impl Attempt {
    pub fn is_retry(&self) -> bool {
        self.number > 1
    }
}

/// Receives every failed attempt. `next_wait` is `None` when no further
/// attempt will be made.
pub trait RetryNotifier: Send + Sync {
    fn attempt_failed(&self, label: &str, attempt: Attempt, next_wait: Option<Duration>, error: &dyn Display);
}

/// Default sink: debug events on [`RETRY_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceNotifier;

impl RetryNotifier for TraceNotifier {
    fn attempt_failed(&self, label: &str, attempt: Attempt, next_wait: Option<Duration>, error: &dyn Display) {
        tracing::debug!(
            target: RETRY_TARGET,
            source = label,
            attempt = attempt.number,
            max = attempt.max,
            next_wait_ms = next_wait.map(|d| d.as_millis() as u64),
            error = %error,
            "Attempt failed"
        );
    }
}

/// Run `op` until it succeeds or the policy is exhausted, returning the last
/// error. A backoff wait that would cross `deadline` ends the loop at the
/// deadline instead.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    deadline: Option<Instant>,
    notifier: &dyn RetryNotifier,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max = policy.max_attempts.max(1);
    let mut number = 1;

    loop {
        let attempt = Attempt { number, max };
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if number >= max {
            notifier.attempt_failed(label, attempt, None, &err);
            return Err(err);
        }

        let wait = policy.delay_after(number);
        notifier.attempt_failed(label, attempt, Some(wait), &err);

        match deadline {
            Some(deadline) => {
                if timeout_at(deadline, sleep(wait)).await.is_err() {
                    tracing::debug!(target: RETRY_TARGET, source = label, "Deadline reached during backoff");
                    return Err(err);
                }
            }
            None => sleep(wait).await,
        }
        number += 1;
    }
}
