//! Deferred execution.
//!
//! A small, bounded, thread-based pool. Submitted callables are queued on a
//! bounded channel and picked up by worker threads strictly in submission
//! order; up to `workers` of them run at once. Submission never blocks: a
//! full queue is reported as [`TaskError::QueueFull`].

/// Reusable callable proxies.
pub mod proxy;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{panic_message, TaskError};

pub use proxy::DeferredFn;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const CANCELLED: u8 = 3;

/// Executor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued tasks.
    pub queue_capacity: usize,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            thread_name: "statewire-exec".to_string(),
        }
    }
}

/// Unique identifier for a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued, not yet picked up.
    Pending,
    /// A worker is running it.
    Running,
    /// Completed, successfully or not.
    Finished,
    /// Cancelled before a worker picked it up.
    Cancelled,
}

struct Task {
    id: TaskId,
    run: Box<dyn FnOnce() + Send + 'static>,
}

/// Handle to a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    submitted_at: DateTime<Utc>,
    state: Arc<AtomicU8>,
    rx: Receiver<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    /// The task id.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// When the task was submitted.
    #[must_use]
    pub const fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        match self.state.load(Ordering::Acquire) {
            PENDING => TaskStatus::Pending,
            RUNNING => TaskStatus::Running,
            CANCELLED => TaskStatus::Cancelled,
            _ => TaskStatus::Finished,
        }
    }

    /// True once the task finished or was cancelled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.status(), TaskStatus::Finished | TaskStatus::Cancelled)
    }

    /// Cancels the task if no worker has picked it up yet.
    ///
    /// Returns false if it is already running or done; a running task is
    /// never interrupted.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            debug!(task = %self.id, "task cancelled");
        }
        cancelled
    }

    /// Polls for the result without blocking.
    ///
    /// Returns `None` while the task is pending or running. The result can be
    /// taken once; later polls report [`TaskError::Disconnected`].
    pub fn try_result(&self) -> Option<Result<T, TaskError>> {
        if self.is_cancelled() {
            return Some(Err(TaskError::Cancelled));
        }
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.disconnected())),
        }
    }

    /// Blocks until the task completes. Returns at once for a cancelled task.
    ///
    /// # Errors
    ///
    /// The task's own failure, [`TaskError::Cancelled`], or
    /// [`TaskError::Disconnected`] if the executor went away.
    pub fn join(self) -> Result<T, TaskError> {
        if self.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        self.rx.recv().map_err(|_| self.disconnected())?
    }

    /// Blocks until the task completes or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// As [`TaskHandle::join`], plus [`TaskError::Timeout`].
    pub fn join_timeout(self, timeout: Duration) -> Result<T, TaskError> {
        if self.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => TaskError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => self.disconnected(),
        })?
    }

    fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    fn disconnected(&self) -> TaskError {
        if self.is_cancelled() {
            TaskError::Cancelled
        } else {
            TaskError::Disconnected
        }
    }
}

/// Bounded FIFO worker pool.
pub struct Executor {
    tx: Sender<Task>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    queue_capacity: usize,
    worker_count: usize,
    submitted: AtomicU64,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("workers", &self.worker_count)
            .field("queue_capacity", &self.queue_capacity)
            .field("queued", &self.tx.len())
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Starts the worker threads.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn a worker thread.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        let workers = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Task>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Task> = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{idx}", config.thread_name))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        trace!(task = %task.id, "running deferred task");
                        (task.run)();
                    }
                })
                .expect("failed to spawn statewire worker");
            handles.push(handle);
        }
        debug!(workers, queue_capacity, "executor started");

        Self {
            tx,
            workers: Mutex::new(handles),
            queue_capacity,
            worker_count: workers,
            submitted: AtomicU64::new(0),
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.worker_count
    }

    /// Tasks waiting for a worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    /// Total tasks accepted so far.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Enqueues a fallible callable.
    ///
    /// An `Err` returned by the callable is captured as
    /// [`TaskError::Failed`], a panic as [`TaskError::Panicked`].
    ///
    /// # Errors
    ///
    /// [`TaskError::QueueFull`] or [`TaskError::Disconnected`]; the callable
    /// is dropped without running.
    pub fn submit<F, T, E>(&self, f: F) -> Result<TaskHandle<T>, TaskError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display,
    {
        let id = TaskId::new();
        let (reply_tx, reply_rx) = bounded::<Result<T, TaskError>>(1);
        let state = Arc::new(AtomicU8::new(PENDING));

        let task_state = Arc::clone(&state);
        let run = Box::new(move || {
            if task_state
                .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                let _ = reply_tx.send(Err(TaskError::Cancelled));
                return;
            }
            let result = match catch_unwind(AssertUnwindSafe(f)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::Failed {
                    message: err.to_string(),
                }),
                Err(payload) => Err(TaskError::Panicked {
                    message: panic_message(payload.as_ref()),
                }),
            };
            task_state.store(FINISHED, Ordering::Release);
            let _ = reply_tx.send(result);
        });

        match self.tx.try_send(Task { id, run }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                return Err(TaskError::QueueFull {
                    capacity: self.queue_capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => return Err(TaskError::Disconnected),
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);
        trace!(task = %id, "task submitted");

        Ok(TaskHandle {
            id,
            submitted_at: Utc::now(),
            state,
            rx: reply_rx,
        })
    }

    /// Enqueues an infallible callable.
    ///
    /// # Errors
    ///
    /// As [`Executor::submit`].
    pub fn spawn<F, T>(&self, f: F) -> Result<TaskHandle<T>, TaskError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit(move || Ok::<T, std::convert::Infallible>(f()))
    }

    /// Wraps a callable so each call enqueues it instead of running inline.
    pub fn proxy<A, T, F>(&self, target: F) -> DeferredFn<'_, A, T>
    where
        F: Fn(A) -> T + Send + Sync + 'static,
        A: Send + 'static,
        T: Send + 'static,
    {
        DeferredFn::new(self, target)
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // Closing the channel lets workers drain queued tasks and exit.
        let old_tx = std::mem::replace(&mut self.tx, bounded::<Task>(1).0);
        drop(old_tx);

        let current = thread::current().id();
        for handle in self.workers.lock().drain(..) {
            // The last store handle may be dropped by a deferred task; a
            // worker cannot join itself.
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }
}
