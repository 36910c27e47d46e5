//! Single-worker task executor.
//!
//! All query execution funnels through one worker thread consuming a FIFO
//! queue. Submissions made *from* the worker itself run inline, which lets
//! built-in functions re-enter [`Database::execute`] without deadlocking on
//! their own queue.
//!
//! [`Database::execute`]: crate::database::Database::execute

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};

use lumi_common::{Error, Result};

type Job = Box<dyn FnOnce() + Send>;

/// Awaitable handle for a submitted task.
pub struct TaskHandle<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task produces its value.
    ///
    /// Fails only if the worker dropped the task (a panic inside it).
    pub fn wait(self) -> Result<T> {
        self.rx
            .recv()
            .map_err(|_| Error::new("task was dropped by the executor"))
    }

    /// A handle that is already resolved.
    pub(crate) fn ready(value: T) -> Self {
        let (tx, rx) = mpsc::sync_channel(1);
        let _ = tx.send(value);
        Self { rx }
    }
}

impl<T> TaskHandle<Result<T>> {
    /// Blocks and flattens the task's own `Result`.
    pub fn join(self) -> Result<T> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(Error::new("task was dropped by the executor")))
    }
}

/// The worker thread plus its submission queue.
pub struct Executor {
    sender: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl Executor {
    /// Spawns the worker thread.
    pub fn new() -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();

        let worker = thread::Builder::new()
            .name("lumidb-executor".to_string())
            .spawn(move || {
                for job in receiver {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!("executor task panicked");
                    }
                }
            })?;
        let worker_id = worker.thread().id();

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            worker_id,
        })
    }

    /// Enqueues `task` and returns a handle for its value.
    ///
    /// Called from the worker thread itself, the task runs inline instead of
    /// enqueueing.
    pub fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let job: Job = Box::new(move || {
            let _ = tx.send(task());
        });

        if thread::current().id() == self.worker_id {
            job();
        } else if let Some(sender) = &self.sender {
            // A send failure means the worker is gone; the handle reports it.
            let _ = sender.send(job);
        }

        TaskHandle { rx }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // Closing the channel drains the queue and stops the worker.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if thread::current().id() != self.worker_id {
                let _ = worker.join();
            }
        }
    }
}
