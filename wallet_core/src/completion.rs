//! Single-shot delivery of results computed on the blocking pool.
//!
//! Every non-blocking call in this crate funnels through a [`Dispatcher`]:
//! the work runs via `spawn_blocking` on a tokio runtime and the completion
//! receives exactly one `Result`. If the work panics, or the runtime shuts
//! down before it runs, the completion still runs once with an error.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;

use crate::error::KinError;

/// Hands blocking wallet work to a tokio runtime's blocking pool.
///
/// Uses the ambient runtime when created inside one, otherwise owns a small
/// runtime of its own that lives as long as any clone.
#[derive(Clone)]
pub struct Dispatcher {
    handle: Handle,
    _owned: Option<Arc<OwnedRuntime>>,
}

impl Dispatcher {
    /// Borrow the current runtime, or start a private one if there is none.
    pub fn new() -> Result<Self, KinError> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self::from_handle(handle));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("kin-worker")
            .enable_all()
            .build()
            .map_err(|e| KinError::Other(format!("failed to start worker runtime: {e}")))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            _owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    /// Dispatch onto an existing runtime.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            _owned: None,
        }
    }

    /// Run `work` on the blocking pool and hand its result to `completion`.
    ///
    /// `completion` is called exactly once, on a pool thread.
    pub fn dispatch<T, W, C>(&self, name: &'static str, work: W, completion: C)
    where
        T: Send + 'static,
        W: FnOnce() -> Result<T, KinError> + Send + 'static,
        C: FnOnce(Result<T, KinError>) + Send + 'static,
    {
        let delivery = Delivery {
            name,
            completion: Some(completion),
            _result: PhantomData,
        };
        // A panic in `work` unwinds through `delivery`, whose drop reports it.
        let _job = self.handle.spawn_blocking(move || {
            let result = work();
            delivery.deliver(result);
        });
    }

    /// Like [`dispatch`](Self::dispatch), but the result arrives on a oneshot
    /// channel that can be awaited or read with `blocking_recv`.
    pub fn dispatch_oneshot<T, W>(
        &self,
        name: &'static str,
        work: W,
    ) -> oneshot::Receiver<Result<T, KinError>>
    where
        T: Send + 'static,
        W: FnOnce() -> Result<T, KinError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.dispatch(name, work, move |result| {
            // The receiver may have been dropped; nothing is waiting then.
            let _ = tx.send(result);
        });
        rx
    }
}

/// Shuts the owned runtime down without waiting, so the last clone may be
/// dropped from async code or from one of the runtime's own threads.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// The completion of one dispatched job. Dropping it undelivered (the job
/// panicked or never ran) delivers an error instead.
struct Delivery<T, C>
where
    C: FnOnce(Result<T, KinError>),
{
    name: &'static str,
    completion: Option<C>,
    _result: PhantomData<fn(T)>,
}

impl<T, C> Delivery<T, C>
where
    C: FnOnce(Result<T, KinError>),
{
    fn deliver(mut self, result: Result<T, KinError>) {
        if let Some(completion) = self.completion.take() {
            completion(result);
        }
    }
}

impl<T, C> Drop for Delivery<T, C>
where
    C: FnOnce(Result<T, KinError>),
{
    fn drop(&mut self) {
        let Some(completion) = self.completion.take() else {
            return;
        };
        let reason = if thread::panicking() {
            "panicked"
        } else {
            "was cancelled"
        };
        tracing::error!(operation = self.name, "worker {reason}");
        completion(Err(KinError::Other(format!("{} worker {reason}", self.name))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn delivers_success_once_off_thread() {
        let dispatcher = Dispatcher::new().unwrap();
        let caller = thread::current().id();
        let (tx, rx) = mpsc::channel();
        dispatcher.dispatch(
            "test",
            || Ok(7u32),
            move |result| {
                tx.send((result.ok(), thread::current().id())).unwrap();
            },
        );
        let (value, worker) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(value, Some(7));
        assert_ne!(worker, caller);
    }

    #[test]
    fn delivers_error() {
        let dispatcher = Dispatcher::new().unwrap();
        let (tx, rx) = mpsc::channel();
        dispatcher.dispatch(
            "test",
            || Err::<u32, _>(KinError::Network("down".into())),
            move |result| tx.send(result.err().map(|e| e.is_retryable())).unwrap(),
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Some(true));
    }

    #[test]
    fn panicking_work_still_completes_once() {
        let dispatcher = Dispatcher::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();
        let counter = Arc::clone(&calls);
        dispatcher.dispatch(
            "test",
            || -> Result<u32, KinError> { panic!("boom") },
            move |result| {
                counter.fetch_add(1, Ordering::SeqCst);
                tx.send(result.is_err()).unwrap();
            },
        );
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        thread::sleep(Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn oneshot_can_be_read_blocking() {
        let dispatcher = Dispatcher::new().unwrap();
        let rx = dispatcher.dispatch_oneshot("test", || Ok("done"));
        assert_eq!(rx.blocking_recv().unwrap().ok(), Some("done"));
    }

    #[tokio::test]
    async fn oneshot_on_the_ambient_runtime_can_be_awaited() {
        let dispatcher = Dispatcher::new().unwrap();
        let rx = dispatcher.dispatch_oneshot("test", || Ok(42u8));
        assert_eq!(rx.await.unwrap().ok(), Some(42));
    }

    #[test]
    fn dispatcher_outlives_dropped_clones() {
        let dispatcher = Dispatcher::new().unwrap();
        drop(dispatcher.clone());
        let rx = dispatcher.dispatch_oneshot("test", || Ok(1u8));
        assert_eq!(rx.blocking_recv().unwrap().ok(), Some(1));
    }
}
