use std::time::Duration;
use thiserror::Error;

use crate::task::{TaskId, TaskKind};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Domain error: {kind} is undefined for operand {operand}")]
    Domain { kind: TaskKind, operand: f64 },

    #[error("Task {0} panicked: {1}")]
    TaskPanicked(TaskId, String),

    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Result of task {0} was already consumed")]
    AlreadyConsumed(TaskId),

    #[error("Timed out after {1:?} waiting for task {0}")]
    Timeout(TaskId, Duration),

    #[error("Server already started")]
    AlreadyStarted,

    #[error("Server not started")]
    NotStarted,

    #[error("Server already stopped")]
    AlreadyStopped,

    #[error("Server is stopped and accepts no new tasks")]
    ServerStopped,

    #[error("Invalid task kind: {0}")]
    ParseTaskKind(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
