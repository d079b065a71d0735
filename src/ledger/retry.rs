use std::future::Future;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use crate::context::Context;
use crate::error::LedgerError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(5);

/// Bounded retry of whole transactional attempts.
///
/// Each attempt runs begin-to-commit under the caller's [`Context`] and ends in one terminal
/// [`Outcome`]. Only [`Outcome::Conflict`] loops back to a fresh attempt; the commit step is part
/// of the attempt, so a serialization failure raised at commit is retried too.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least 1. `backoff` is multiplied by the attempt number
    /// between attempts.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `attempt` until it commits, fails for a reason other than a conflict, or the attempts
    /// are exhausted. `attempt` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An attempt fails with a business-rule or fatal error, returned unchanged and unretried.
    /// - Every attempt was aborted by a conflicting writer ([`LedgerError::Conflict`]).
    /// - `ctx` is cancelled or times out ([`LedgerError::Cancelled`], [`LedgerError::DeadlineExceeded`]).
    pub async fn run<T, F, Fut>(&self, ctx: &Context, operation: &'static str, mut attempt: F) -> Result<T, LedgerError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        for attempt_no in 1..=self.max_attempts {
            match Outcome::from(ctx.run(attempt(attempt_no)).await?) {
                Outcome::Committed(value) => {
                    debug!(operation, attempt = attempt_no, "committed");
                    return Ok(value);
                }
                Outcome::BusinessRule(error) => {
                    debug!(operation, attempt = attempt_no, %error, "aborted by business rule");
                    return Err(error);
                }
                Outcome::Fatal(error) => {
                    warn!(operation, attempt = attempt_no, %error, "aborted by store failure");
                    return Err(error);
                }
                Outcome::Conflict(error) => {
                    warn!(
                        operation,
                        attempt = attempt_no,
                        max_attempts = self.max_attempts,
                        %error,
                        "aborted by conflicting writer"
                    );
                    if attempt_no < self.max_attempts {
                        ctx.run(tokio::time::sleep(self.backoff.saturating_mul(attempt_no)))
                            .await?;
                    }
                }
            }
        }

        Err(LedgerError::Conflict {
            attempts: self.max_attempts,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF)
    }
}

/// Terminal state of one attempt.
#[derive(Debug)]
enum Outcome<T> {
    Committed(T),
    BusinessRule(LedgerError),
    Conflict(LedgerError),
    Fatal(LedgerError),
}

impl<T> From<Result<T, LedgerError>> for Outcome<T> {
    fn from(res: Result<T, LedgerError>) -> Self {
        match res {
            Ok(value) => Self::Committed(value),
            Err(error) if error.is_serialization_failure() => Self::Conflict(error),
            Err(error) if error.is_business_rule() => Self::BusinessRule(error),
            Err(error) => Self::Fatal(error),
        }
    }
}
