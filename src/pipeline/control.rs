//! Run control: cancellation and an overall deadline.
//!
//! Every await point that can take a while (the LLM call, backoff sleeps,
//! the blocking extraction task) goes through [`RunContext::run`], so a
//! cancelled or expired run stops at the next await instead of finishing
//! work nobody will read.

use crate::error::GuardError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cancellation signal plus an optional deadline for one analysis run.
#[derive(Debug, Clone)]
pub struct RunContext {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
    deadline_secs: u64,
}

/// Cancels every [`RunContext`] cloned from the one it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Only fails when every receiver is gone, which means nothing to cancel.
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl RunContext {
    /// A cancellable context without a deadline.
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: rx,
                deadline: None,
                deadline_secs: 0,
            },
            CancelHandle {
                tx: std::sync::Arc::new(tx),
            },
        )
    }

    /// A context that can never be cancelled and never expires.
    pub fn unbounded() -> Self {
        Self::new().0
    }

    /// Set the deadline to `timeout` from now.
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self.deadline_secs = timeout.as_secs();
        self
    }

    /// Apply `deadline_secs` when set.
    pub fn with_optional_deadline(self, deadline_secs: Option<u64>) -> Self {
        match deadline_secs {
            Some(secs) => self.with_deadline(Duration::from_secs(secs)),
            None => self,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Fail fast if the run is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), GuardError> {
        if self.is_cancelled() {
            return Err(GuardError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(GuardError::DeadlineExceeded {
                    secs: self.deadline_secs,
                });
            }
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the run is cancelled or expires first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, GuardError>
    where
        F: Future<Output = T>,
    {
        self.check()?;
        let mut cancel = self.cancel.clone();
        let deadline = self.deadline;
        let secs = self.deadline_secs;

        let cancelled = async move {
            loop {
                if *cancel.borrow_and_update() {
                    return;
                }
                if cancel.changed().await.is_err() {
                    // Sender dropped without cancelling; never fires.
                    std::future::pending::<()>().await;
                }
            }
        };
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(GuardError::Cancelled),
            _ = expired => Err(GuardError::DeadlineExceeded { secs }),
            out = fut => Ok(out),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::unbounded()
    }
}
