//! Deferred dispatch onto the Tokio runtime.
//!
//! Every completion the cache and coordinator hand back to a caller goes
//! through [`Scheduler`]. A posted task is queued on the runtime and never
//! runs on the caller's stack, so a caller cannot tell a provider that
//! answered instantly from one that took a while.

use std::future::Future;

use tokio::runtime::Handle;

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    handle: Option<Handle>,
}

impl Scheduler {
    /// Dispatch onto whichever runtime is current at the time of posting.
    pub fn ambient() -> Self {
        Self { handle: None }
    }

    /// Pin dispatch to the runtime the caller is on, falling back to
    /// [`Scheduler::ambient`] outside a runtime.
    pub fn current() -> Self {
        Self {
            handle: Handle::try_current().ok(),
        }
    }

    /// Dispatch onto a specific runtime regardless of the calling context.
    pub fn with_handle(handle: Handle) -> Self {
        Self { handle: Some(handle) }
    }

    /// Queue `task` to run on a later scheduling turn.
    ///
    /// # Panics
    ///
    /// Panics when no handle was supplied and the caller is outside a Tokio
    /// runtime, like [`tokio::spawn`].
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(async move { task() });
    }

    /// Queue `future` as its own task.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Scheduler::post`].
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match &self.handle {
            Some(handle) => {
                handle.spawn(future);
            }
            None => {
                tokio::spawn(future);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn posted_task_runs_after_the_caller_continues() {
        let scheduler = Scheduler::ambient();
        let caller_continued = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = oneshot::channel();

        let observed = Arc::clone(&caller_continued);
        scheduler.post(move || {
            let _ = sender.send(observed.load(Ordering::SeqCst));
        });
        caller_continued.store(true, Ordering::SeqCst);

        assert!(receiver.await.expect("posted task ran"));
    }

    #[test]
    fn explicit_handle_allows_posting_outside_the_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        let scheduler = Scheduler::with_handle(runtime.handle().clone());
        let (sender, receiver) = oneshot::channel();

        scheduler.post(move || {
            let _ = sender.send(42);
        });

        assert_eq!(runtime.block_on(receiver).expect("posted task ran"), 42);
    }

    #[test]
    fn current_captures_the_runtime_it_was_created_on() {
        assert!(Scheduler::current().handle.is_none());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        let scheduler = runtime.block_on(async { Scheduler::current() });
        let (sender, receiver) = oneshot::channel();

        std::thread::spawn(move || {
            scheduler.post(move || {
                let _ = sender.send("from another thread");
            });
        })
        .join()
        .expect("posting thread");

        assert_eq!(runtime.block_on(receiver).expect("posted task ran"), "from another thread");
    }
}
