//! Single-shot deferred execution behind an owned, cancellable handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Owned handle to a scheduled task; cancel it to keep the task from firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Deferred single-shot execution. Cancelling an already-fired or unknown
/// handle is a no-op.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
    fn cancel(&self, handle: TimerHandle);
}

/// Scheduler backed by the tokio runtime; create it inside one.
#[derive(Default)]
pub struct TokioScheduler {
    inner: Arc<TokioSchedulerInner>,
}

#[derive(Default)]
struct TokioSchedulerInner {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, tokio::task::JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.tasks.lock().remove(&id);
            task();
        });
        self.inner.tasks.lock().insert(id, join);
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(join) = self.inner.tasks.lock().remove(&handle.0) {
            join.abort();
        }
    }
}
