use std::sync::Arc;
use std::time::Duration;

use crate::server::Shared;
use crate::task::{Task, TaskId};
use crate::Result;

/// Producer handle onto a [`crate::ComputeServer`].
///
/// Cheap to clone and `'static`, so it can be moved into spawned threads.
/// It outlives the server without keeping the worker alive.
#[derive(Debug, Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn submit(&self, task: Task) -> Result<TaskId> {
        self.shared.submit(task)
    }

    pub fn await_result(&self, id: TaskId) -> Result<f64> {
        self.shared.await_result(id, None)
    }

    pub fn await_result_timeout(&self, id: TaskId, timeout: Duration) -> Result<f64> {
        self.shared.await_result(id, Some(timeout))
    }

    pub fn compute(&self, task: Task) -> Result<f64> {
        let id = self.submit(task)?;
        self.await_result(id)
    }
}
