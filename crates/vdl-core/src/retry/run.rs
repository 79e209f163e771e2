//! Retry loop: run an async attempt until success, exhaustion, or cancellation.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::classify;
use super::error::TransferError;
use super::policy::{RetryDecision, RetryPolicy};

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError {
    /// Cancellation was observed before or between attempts, or by the attempt itself.
    Cancelled,
    /// The policy stopped retrying; `last` is the error from the final attempt.
    Exhausted { attempts: u32, last: TransferError },
}

impl std::fmt::Display for RetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Cancelled => write!(f, "cancelled"),
            RetryError::Exhausted { attempts, last } => {
                write!(f, "failed after {} attempt(s): {}", attempts, last)
            }
        }
    }
}

impl std::error::Error for RetryError {}

/// Runs `attempt_fn` until it succeeds or the retry policy says to stop.
///
/// `attempt_fn` receives the 1-based attempt number. Cancellation is checked
/// before every attempt and interrupts the backoff sleep; it is never retried.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt_fn: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransferError>>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        match attempt_fn(attempt).await {
            Ok(v) => return Ok(v),
            Err(TransferError::Cancelled) => return Err(RetryError::Cancelled),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: e,
                        })
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(attempt, delay_ms = d.as_millis() as u64, error = %e, "retrying");
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                            _ = tokio::time::sleep(d) => {}
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}
