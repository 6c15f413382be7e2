//! Bounded pool for detached background work.
//!
//! Tasks are fire-and-forget: the caller never sees their result. A failing
//! or panicking task logs and ends without affecting the pool or its peers.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cmdhub_core::HubResult;
use futures::FutureExt;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, warn};

struct Inner {
    permits: Semaphore,
    max_pending: usize,
    pending: AtomicUsize,
    idle: Notify,
}

#[derive(Clone)]
pub struct TaskPool {
    inner: Arc<Inner>,
}

impl TaskPool {
    /// `max_concurrent` tasks run at once; above `max_pending` running plus
    /// queued tasks, new work is dropped.
    pub fn new(max_concurrent: usize, max_pending: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(Inner {
                permits: Semaphore::new(max_concurrent),
                max_pending: max_pending.max(max_concurrent),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Running plus queued tasks.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Schedule `task`. Returns `false` if it was shed.
    pub fn spawn<F>(&self, name: &'static str, task: F) -> bool
    where
        F: Future<Output = HubResult<()>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let pending = inner.pending.fetch_add(1, Ordering::SeqCst);
        if pending >= inner.max_pending {
            Self::finish(&inner);
            warn!(task = name, pending, "Task pool saturated; dropping background task");
            return false;
        }

        tokio::spawn(async move {
            match inner.permits.acquire().await {
                Ok(_permit) => match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(())) => debug!(task = name, "Background task finished"),
                    Ok(Err(e)) => warn!(task = name, error = %e, "Background task failed"),
                    Err(_) => warn!(task = name, "Background task panicked"),
                },
                Err(_) => warn!(task = name, "Task pool closed; dropping background task"),
            }
            Self::finish(&inner);
        });
        true
    }

    fn finish(inner: &Inner) {
        if inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            inner.idle.notify_waiters();
        }
    }

    /// Wait until no tasks are pending. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.inner.idle.notified();
            if self.pending() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.pending() == 0;
            }
        }
    }
}
