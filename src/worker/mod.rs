//! Background execution of cursor updates, exports and imports.
//!
//! Work is submitted to a [`WorkerPool`] as a closure receiving a
//! [`CancellationToken`]; the pool runs at most `max_concurrent` units at a
//! time and hands back a [`TaskHandle`]. Cancelling a handle makes `join`
//! return [`MongoviewError::Cancelled`] as soon as the work reaches an await
//! point, whether or not it ever started.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::{MongoviewError, Result};
use crate::query::{PageCursor, PageSnapshot};

/// Bounded pool of background tasks.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl WorkerPool {
    /// Create a pool running at most `max_concurrent` tasks at once.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Tasks that could start right now without waiting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Spawn `work` once a slot is free.
    ///
    /// # Arguments
    /// * `work` - Builds the task's future from its cancellation token
    ///
    /// # Returns
    /// * `TaskHandle<T>` - Handle to cancel or await the task
    pub fn submit<F, Fut, T>(&self, work: F) -> TaskHandle<T>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let permits = Arc::clone(&self.permits);

        let join = tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!("Task {} cancelled while queued", id);
                    return Err(MongoviewError::Cancelled);
                }
                permit = permits.acquire_owned() => {
                    permit.map_err(|_| MongoviewError::TaskFailed("worker pool closed".to_string()))?
                }
            };

            debug!("Task {} started", id);
            let work = work(task_token.clone());
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!("Task {} cancelled", id);
                    Err(MongoviewError::Cancelled)
                }
                result = work => result,
            }
        });

        TaskHandle { id, token, join }
    }
}

/// A submitted unit of work.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: Uuid,
    token: CancellationToken,
    join: JoinHandle<Result<T>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the task to stop.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token that cancels this task when triggered from elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task's result.
    pub async fn join(self) -> Result<T> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(MongoviewError::Cancelled),
            Err(e) => Err(MongoviewError::TaskFailed(e.to_string())),
        }
    }
}

/// Holds only the most recently submitted task; replacing it cancels the
/// previous one.
#[derive(Debug)]
pub struct LatestTask<T> {
    current: Option<TaskHandle<T>>,
}

impl<T> Default for LatestTask<T> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<T> LatestTask<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle`, cancelling and returning the task it replaces.
    pub fn replace(&mut self, handle: TaskHandle<T>) -> Option<TaskHandle<T>> {
        let previous = self.current.replace(handle);
        if let Some(previous) = &previous {
            debug!("Superseding task {}", previous.id());
            previous.cancel();
        }
        previous
    }

    pub fn cancel(&self) {
        if let Some(current) = &self.current {
            current.cancel();
        }
    }

    pub fn take(&mut self) -> Option<TaskHandle<T>> {
        self.current.take()
    }

    pub fn is_idle(&self) -> bool {
        self.current.as_ref().is_none_or(TaskHandle::is_finished)
    }

    /// Await the current task, if any.
    pub async fn join(&mut self) -> Option<Result<T>> {
        match self.current.take() {
            Some(handle) => Some(handle.join().await),
            None => None,
        }
    }
}

/// A page cursor updated from background tasks one at a time.
#[derive(Clone)]
pub struct SharedCursor {
    inner: Arc<Mutex<PageCursor>>,
}

impl SharedCursor {
    pub fn new(cursor: PageCursor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cursor)),
        }
    }

    /// Exclusive access for setters and reads.
    pub async fn lock(&self) -> MutexGuard<'_, PageCursor> {
        self.inner.lock().await
    }

    /// Run `update()` on `pool`, returning the installed snapshot.
    ///
    /// Updates queue on the cursor lock. A cancelled update leaves the
    /// cursor's previous snapshot in place.
    pub fn spawn_update(&self, pool: &WorkerPool) -> TaskHandle<Arc<PageSnapshot>> {
        let inner = Arc::clone(&self.inner);
        pool.submit(move |_token| async move {
            let mut cursor = inner.lock().await;
            cursor.update().await?;
            Ok(cursor.snapshot())
        })
    }
}
