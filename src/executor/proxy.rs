use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::TaskError;

use super::{Executor, TaskHandle};

/// A callable bound to an executor.
///
/// Each [`call`](DeferredFn::call) enqueues one invocation and returns a
/// handle; [`call_inline`](DeferredFn::call_inline) runs on the calling
/// thread instead.
///
/// ```
/// use statewire::executor::{Executor, ExecutorConfig};
///
/// let exec = Executor::new(ExecutorConfig::default());
/// let square = exec.proxy(|n: u64| n * n);
/// let handles: Vec<_> = (1..=3).map(|n| square.call(n).unwrap()).collect();
/// let results: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
/// assert_eq!(results, vec![1, 4, 9]);
/// assert_eq!(square.call_inline(5), 25);
/// ```
pub struct DeferredFn<'e, A, T> {
    executor: &'e Executor,
    target: Arc<dyn Fn(A) -> T + Send + Sync>,
    _marker: PhantomData<fn(A) -> T>,
}

impl<'e, A, T> DeferredFn<'e, A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    pub(crate) fn new<F>(executor: &'e Executor, target: F) -> Self
    where
        F: Fn(A) -> T + Send + Sync + 'static,
    {
        Self {
            executor,
            target: Arc::new(target),
            _marker: PhantomData,
        }
    }

    /// Enqueues one invocation with `args`.
    ///
    /// # Errors
    ///
    /// As [`Executor::submit`].
    pub fn call(&self, args: A) -> Result<TaskHandle<T>, TaskError> {
        let target = Arc::clone(&self.target);
        self.executor.spawn(move || target(args))
    }

    /// Runs the target on the calling thread.
    pub fn call_inline(&self, args: A) -> T {
        (self.target)(args)
    }
}

impl<A, T> Clone for DeferredFn<'_, A, T> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor,
            target: Arc::clone(&self.target),
            _marker: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::executor::ExecutorConfig;

    #[test]
    fn proxy_defers_each_call() {
        let exec = Executor::new(ExecutorConfig {
            workers: 2,
            ..ExecutorConfig::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let record = exec.proxy(move |label: String| {
            c.fetch_add(1, Ordering::SeqCst);
            label.len()
        });

        let a = record.call("abc".to_string()).unwrap();
        let b = record.clone().call("de".to_string()).unwrap();
        assert_eq!(a.join(), Ok(3));
        assert_eq!(b.join(), Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(exec.submitted(), 2);
    }

    #[test]
    fn inline_call_bypasses_the_queue() {
        let exec = Executor::new(ExecutorConfig {
            workers: 1,
            ..ExecutorConfig::default()
        });
        let double = exec.proxy(|n: i32| n * 2);
        assert_eq!(double.call_inline(21), 42);
        assert_eq!(exec.submitted(), 0);
    }
}
