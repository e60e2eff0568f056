//! Fixed-interval retry with a bounded number of attempts.
//!
//! Every wait in the suite (node count, node readiness, pod availability,
//! HTTP probes) goes through [`retry`]. The operation reports "not yet" by
//! returning `Err`; there is no separate notion of a fatal error, since every
//! retried call is a read-only query.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use time::ext::NumericalStdDuration as _;
use tokio_util::sync::CancellationToken;

/// How many times to try and how long to wait in between.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
    cancel: Option<CancellationToken>,
}

impl RetryPolicy {
    /// Create a policy making at most `max_attempts` attempts (the first one
    /// included), sleeping `interval` between consecutive attempts.
    pub fn new(max_attempts: u32, interval: Duration) -> Result<Self, ZeroAttempts> {
        if max_attempts == 0 {
            return Err(ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            interval,
            cancel: None,
        })
    }

    /// Policy used while waiting for a workload pod: 15 attempts, 5s apart.
    pub fn pod_availability() -> Self {
        Self {
            max_attempts: 15,
            interval: 5.std_seconds(),
            cancel: None,
        }
    }

    /// Abort waiting as soon as `token` is cancelled.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Sleep for one interval. Returns `false` if cancelled while sleeping.
    async fn pause(&self) -> bool {
        match &self.cancel {
            Some(token) => tokio::select! {
                () = token.cancelled() => false,
                () = tokio::time::sleep(self.interval) => true,
            },
            None => {
                tokio::time::sleep(self.interval).await;
                true
            }
        }
    }
}

impl Default for RetryPolicy {
    /// 30 attempts, 10s apart.
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: 10.std_seconds(),
            cancel: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("max attempts must be at least 1")]
pub struct ZeroAttempts;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid interval {input:?}: {reason}")]
pub struct ParseIntervalError {
    input: String,
    reason: String,
}

/// Parse a Go-style duration such as `10s`, `500ms` or `1m30s`.
pub fn parse_interval(input: &str) -> Result<Duration, ParseIntervalError> {
    let error = |reason: String| ParseIntervalError {
        input: input.to_string(),
        reason,
    };
    let nanos = go_parse_duration::parse_duration(input).map_err(|err| error(format!("{err:?}")))?;
    u64::try_from(nanos)
        .map(Duration::from_nanos)
        .map_err(|_| error("interval must not be negative".to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
        }
    }
}

/// Run `operation` until it returns `Ok` or `policy` runs out of attempts.
///
/// Success returns immediately, without sleeping. A failed attempt is logged
/// and followed by a sleep of `policy.interval()`, except after the final
/// attempt, whose error is returned in [`RetryError::Exhausted`].
pub async fn retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    description: &str,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 0;

    loop {
        if policy.is_cancelled() {
            tracing::info!(description, attempt, "Cancelled");
            return Err(RetryError::Cancelled { attempts: attempt });
        }

        attempt += 1;

        match operation().await {
            Ok(value) => {
                tracing::debug!(description, attempt, "Done");
                return Ok(value);
            }
            Err(last) if attempt >= policy.max_attempts => {
                tracing::warn!(description, attempt, error = %last, "Giving up");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last,
                });
            }
            Err(err) => {
                tracing::info!(
                    description,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "Not yet, sleeping {:?}",
                    policy.interval
                );
                if !policy.pause().await {
                    tracing::info!(description, attempt, "Cancelled");
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
            }
        }
    }
}
