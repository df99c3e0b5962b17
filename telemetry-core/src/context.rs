use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::FetchCause;

/// Cancellation and deadline scope shared by every fetch issued for one request.
///
/// Cloning is cheap; clones observe the same token and deadline. `child()`
/// derives a scope that is cancelled with its parent but can also be cancelled
/// on its own.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_at(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::new().deadline_at(deadline)
    }

    /// Keeps the earlier of the existing and the given deadline.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns the reason this scope ended, if it already has.
    pub fn err(&self) -> Option<FetchCause> {
        if self.cancel.is_cancelled() {
            return Some(FetchCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(FetchCause::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub async fn done(&self) -> FetchCause {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => FetchCause::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => FetchCause::DeadlineExceeded,
                }
            }
            None => {
                self.cancel.cancelled().await;
                FetchCause::Cancelled
            }
        }
    }
}
