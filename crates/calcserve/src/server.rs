use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::client::Client;
use crate::config::ServerConfig;
use crate::handler::{Evaluator, TaskHandler};
use crate::queue::{Location, TaskQueue};
use crate::results::ResultStore;
use crate::task::{Task, TaskId};
use crate::worker::run_worker;
use crate::{Error, Result};

/// State shared between the server, its clients and the worker thread.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) queue: TaskQueue,
    pub(crate) results: ResultStore,
}

impl Shared {
    pub(crate) fn submit(&self, task: Task) -> Result<TaskId> {
        let id = self.queue.push(task)?;
        tracing::trace!("Submitted task {} ({})", id, task.kind);
        Ok(id)
    }

    /// Lock order is result store first, then queue. The worker never holds both.
    pub(crate) fn await_result(&self, id: TaskId, timeout: Option<Duration>) -> Result<f64> {
        self.results
            .take(id, timeout, || match self.queue.locate(id) {
                Location::Unissued => Some(Error::UnknownTask(id)),
                Location::Retired => Some(Error::AlreadyConsumed(id)),
                Location::Pending | Location::InFlight => None,
            })
    }
}

enum Lifecycle<H> {
    Idle(H),
    Running(JoinHandle<()>),
    Stopped,
}

/// Compute server with a single dedicated worker thread.
///
/// Producers [`submit`](ComputeServer::submit) tasks from any thread and
/// block in [`await_result`](ComputeServer::await_result) until their own
/// id is done. Tasks run one at a time in submission order.
pub struct ComputeServer<H = Evaluator>
where
    H: TaskHandler,
{
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle<H>>,
    config: ServerConfig,
}

impl ComputeServer<Evaluator> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            lifecycle: Mutex::new(Lifecycle::Idle(Evaluator)),
            config: ServerConfig::default(),
        }
    }

    pub fn with_config(config: ServerConfig) -> Result<Self> {
        Self::with_handler(config, Evaluator)
    }
}

impl Default for ComputeServer<Evaluator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ComputeServer<H>
where
    H: TaskHandler,
{
    pub fn with_handler(config: ServerConfig, handler: H) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::default()),
            lifecycle: Mutex::new(Lifecycle::Idle(handler)),
            config,
        })
    }

    /// Spawn the worker thread. Tasks submitted earlier start running now.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        let handler = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(handler) => handler,
            Lifecycle::Running(worker) => {
                *lifecycle = Lifecycle::Running(worker);
                return Err(Error::AlreadyStarted);
            }
            Lifecycle::Stopped => return Err(Error::ServerStopped),
        };

        let mut builder = thread::Builder::new().name(self.config.thread_name.clone());
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let shared = self.shared.clone();
        match builder.spawn(move || run_worker(shared, handler)) {
            Ok(worker) => {
                tracing::info!("Compute server started on thread {}", self.config.thread_name);
                *lifecycle = Lifecycle::Running(worker);
                Ok(())
            }
            Err(err) => {
                tracing::error!("Failed to spawn worker thread: {}", err);
                self.shared.queue.close();
                Err(Error::Spawn(err))
            }
        }
    }

    /// Close the queue and wait for the worker to drain it and exit.
    ///
    /// Everything submitted before this call runs to completion. Later
    /// submissions are rejected with [`Error::ServerStopped`].
    pub fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(worker) => {
                tracing::info!(
                    "Stopping compute server, {} task(s) left to drain",
                    self.shared.queue.len()
                );
                self.shared.queue.close();
                if worker.join().is_err() {
                    tracing::error!("Worker thread panicked");
                }
                tracing::info!("Compute server stopped");
                Ok(())
            }
            Lifecycle::Idle(handler) => {
                *lifecycle = Lifecycle::Idle(handler);
                Err(Error::NotStarted)
            }
            Lifecycle::Stopped => Err(Error::AlreadyStopped),
        }
    }

    /// Enqueue a task and return its id without blocking.
    pub fn submit(&self, task: Task) -> Result<TaskId> {
        self.shared.submit(task)
    }

    /// Block until the result for `id` is ready, then remove and return it.
    ///
    /// Ids never issued by this server fail with [`Error::UnknownTask`],
    /// ids whose result was already taken with [`Error::AlreadyConsumed`].
    pub fn await_result(&self, id: TaskId) -> Result<f64> {
        self.shared.await_result(id, None)
    }

    /// [`ComputeServer::await_result`] with a bound. Expiry leaves the task
    /// queued; a later call can still collect it.
    pub fn await_result_timeout(&self, id: TaskId, timeout: Duration) -> Result<f64> {
        self.shared.await_result(id, Some(timeout))
    }

    /// Submit and wait in one call.
    pub fn compute(&self, task: Task) -> Result<f64> {
        let id = self.submit(task)?;
        self.await_result(id)
    }

    /// Handle for producer threads.
    pub fn client(&self) -> Client {
        Client::new(self.shared.clone())
    }

    /// Tasks waiting to be picked up by the worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Results published but not yet collected.
    pub fn unclaimed(&self) -> usize {
        self.shared.results.len()
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl<H> Drop for ComputeServer<H>
where
    H: TaskHandler,
{
    fn drop(&mut self) {
        if matches!(*self.lifecycle.get_mut(), Lifecycle::Running(_)) {
            let _ = self.stop();
        }
    }
}
