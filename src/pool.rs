//! Bounded work queue, worker group and completion barrier.
//!
//! Every stage of the run (page fetches, channels, ranking) is one
//! `WorkQueue` drained by a fixed group of workers. Work items may push
//! follow-up items before they are marked done, so the barrier only opens
//! once no work is queued or in flight.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};

use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinSet;

use crate::{AppError, Result};

/// Lock a std mutex that only guards in-memory state, ignoring poisoning.
pub fn lock<T>(mutex: &std::sync::Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Countable, waitable completion signal.
#[derive(Debug, Default)]
pub struct Completion {
    pending: AtomicUsize,
    notify: Notify,
}

impl Completion {
    pub fn add(&self, n: usize) {
        self.pending.fetch_add(n, Ordering::SeqCst);
    }

    pub fn done(&self) {
        let previous = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous == Ok(1) {
            self.notify.notify_waiters();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Resolves once the pending count is zero.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct DoneGuard<'a>(&'a Completion);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

pub struct WorkQueue<T> {
    tx: mpsc::Sender<T>,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
    completion: Arc<Completion>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
            completion: Arc::clone(&self.completion),
        }
    }
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            completion: Arc::new(Completion::default()),
        }
    }

    /// Enqueue one unit of work, waiting while the queue is full.
    pub async fn push(&self, item: T) -> Result<()> {
        self.completion.add(1);
        if self.tx.send(item).await.is_err() {
            self.completion.done();
            return Err(AppError::Worker("work queue closed".to_string()));
        }
        Ok(())
    }

    async fn next(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    pub fn pending(&self) -> usize {
        self.completion.pending()
    }

    /// Waits until every pushed item has been handled.
    pub async fn drained(&self) {
        self.completion.wait().await;
    }

    /// Start `workers` tasks that feed queued items to `handler`.
    ///
    /// An item counts as done when its handler returns (or panics), after
    /// any follow-up items it pushed.
    pub fn spawn_workers<F, Fut>(&self, workers: usize, handler: F) -> JoinSet<()>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let mut set = JoinSet::new();
        for _ in 0..workers.max(1) {
            let queue = self.clone();
            let handler = Arc::clone(&handler);
            set.spawn(async move {
                while let Some(item) = queue.next().await {
                    let _done = DoneGuard(&queue.completion);
                    handler(item).await;
                }
            });
        }
        set
    }
}

/// Tear down a drained worker group, reporting any worker that panicked.
pub async fn shutdown_workers(mut workers: JoinSet<()>) -> Result<()> {
    let mut failure = None;
    while let Some(joined) = workers.try_join_next() {
        if let Err(e) = joined
            && e.is_panic()
        {
            failure = Some(AppError::Worker(e.to_string()));
        }
    }
    workers.shutdown().await;
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
