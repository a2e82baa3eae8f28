use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::handler::TaskHandler;
use crate::server::Shared;
use crate::task::{QueuedTask, Task, TaskId};
use crate::{Error, Result};

/// Worker loop: runs until the queue is closed and drained.
pub(crate) fn run_worker<H>(shared: Arc<Shared>, mut handler: H)
where
    H: TaskHandler,
{
    tracing::info!("Worker started");

    while let Some(entry) = shared.queue.pop() {
        let QueuedTask {
            id,
            task,
            queued_at,
        } = entry;

        tracing::trace!(
            "Processing task {}, added {}ms ago",
            id,
            queued_at.elapsed().as_millis()
        );

        let outcome = dispatch(&mut handler, id, &task);
        if let Err(err) = &outcome {
            tracing::warn!("Task {} ({}) failed: {}", id, task.kind, err);
        }

        // Publish before completing, so a waiter never sees the id in neither place.
        shared.results.publish(id, outcome);
        shared.queue.complete(id);
        tracing::trace!("Published result for task {}", id);
    }

    tracing::info!("Queue drained, worker exiting");
}

fn dispatch<H>(handler: &mut H, id: TaskId, task: &Task) -> Result<f64>
where
    H: TaskHandler,
{
    let span = tracing::span!(tracing::Level::TRACE, "dispatch", %id, kind = %task.kind);
    let _enter = span.enter();

    match catch_unwind(AssertUnwindSafe(|| handler.handle(id, task))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("Handler panicked on task {}: {}", id, message);
            Err(Error::TaskPanicked(id, message))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
