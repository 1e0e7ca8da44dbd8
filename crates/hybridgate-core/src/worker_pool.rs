//! Bounded executor for blocking work.
//!
//! Jobs are submitted by message passing: [`BlockingPool::submit`] returns a
//! [`JobTicket`] immediately and the job runs on tokio's blocking threads once
//! one of the pool's permits is free. The async caller never runs the job inline.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{oneshot, Semaphore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("worker pool is shut down")]
    Closed,

    #[error("blocking job panicked: {0}")]
    Panicked(String),

    #[error("blocking job was cancelled before reporting a result")]
    Cancelled,
}

/// Pending result of a submitted job.
#[derive(Debug)]
pub struct JobTicket<T> {
    receiver: oneshot::Receiver<Result<T, JobError>>,
}

impl<T> JobTicket<T> {
    pub async fn wait(self) -> Result<T, JobError> {
        self.receiver.await.unwrap_or(Err(JobError::Cancelled))
    }
}

/// `spawn_blocking` behind a semaphore of `size` permits.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl BlockingPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    /// Queues `job`; must be called from within a tokio runtime.
    pub fn submit<F, T>(&self, job: F) -> JobTicket<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                let _ = sender.send(Err(JobError::Closed));
                return;
            };

            let outcome = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job()
            })
            .await
            .map_err(|error| JobError::Panicked(error.to_string()));

            // The submitter may have dropped its ticket.
            let _ = sender.send(outcome);
        });

        JobTicket { receiver }
    }

    /// Stops admitting queued jobs; running jobs finish.
    pub fn close(&self) {
        self.permits.close();
    }
}
