//! Per-invocation deadline and cancellation.
//!
//! Every store read, store write and collaborator call made while handling one
//! event goes through [`InvocationContext::bounded`], so nothing outlives the
//! invocation that started it.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a bounded call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    DeadlineExceeded,
    Cancelled,
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interruption::DeadlineExceeded => f.write_str("deadline exceeded"),
            Interruption::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvocationContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl InvocationContext {
    pub fn new(deadline: Instant, cancel: CancellationToken) -> Self {
        Self { deadline, cancel }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, CancellationToken::new())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Token the host cancels to abort the invocation.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `fut` unless the deadline passes or the invocation is cancelled first.
    pub async fn bounded<F>(&self, fut: F) -> Result<F::Output, Interruption>
    where
        F: Future,
    {
        if self.cancel.is_cancelled() {
            return Err(Interruption::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interruption::Cancelled),
            result = tokio::time::timeout_at(self.deadline, fut) => {
                result.map_err(|_| Interruption::DeadlineExceeded)
            }
        }
    }
}
