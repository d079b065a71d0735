//! Cancellable, deadline-bound operation context.
//!
//! Every ledger and store operation takes a [`Context`]. Work driven through [`Context::run`] is
//! dropped as soon as the context is cancelled or its deadline passes; for an open sqlx
//! transaction that drop is a rollback, so an interrupted operation never commits partially.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

/// Why a [`Context`] stopped the work it was driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

impl Context {
    /// A context that is never cancelled and has no deadline unless told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// A child context sharing this one's cancellation, with a deadline `timeout` from now.
    ///
    /// The child keeps the earlier of its own and its parent's deadline. Cancelling the child does
    /// not cancel the parent.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(self.deadline.map_or(own, |parent| parent.min(own))),
        }
    }

    /// A child context that can be cancelled independently of this one.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, if it is.
    pub fn interrupted(&self) -> Option<Interrupted> {
        if self.cancel.is_cancelled() {
            return Some(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drives `fut` to completion unless the context is cancelled or times out first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The context was already done, or gets cancelled while `fut` is pending ([`Interrupted::Cancelled`]).
    /// - The deadline passes while `fut` is pending ([`Interrupted::DeadlineExceeded`]).
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        if let Some(interrupted) = self.interrupted() {
            return Err(interrupted);
        }

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.cancel.cancelled() => Err(Interrupted::Cancelled),
                res = tokio::time::timeout_at(deadline, fut) => res.map_err(|_| Interrupted::DeadlineExceeded),
            },
            None => tokio::select! {
                biased;
                () = self.cancel.cancelled() => Err(Interrupted::Cancelled),
                out = fut => Ok(out),
            },
        }
    }
}
