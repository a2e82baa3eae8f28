use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::Error;

/// Identifier handed out by [`crate::ComputeServer::submit`].
///
/// Ids are allocated from 0 upward by a single server and never reused, so
/// ordering ids is the same as ordering submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The operations the worker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Trigonometric sine of the operand (radians)
    Sine,
    /// Non-negative square root of the operand
    SquareRoot,
    /// Operand raised to an integer exponent
    Power,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Sine, TaskKind::SquareRoot, TaskKind::Power];

    /// Short name, also used for driver output files.
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Sine => "sine",
            TaskKind::SquareRoot => "sqrt",
            TaskKind::Power => "power",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.trim().to_lowercase() {
            "sine" | "sin" | "sinus" => Ok(TaskKind::Sine),
            "sqrt" | "square-root" | "squareroot" | "square" => Ok(TaskKind::SquareRoot),
            "power" | "pow" => Ok(TaskKind::Power),
            _ => Err(Error::ParseTaskKind(s.to_string())),
        }
    }
}

/// A unit of work. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub operand: f64,
    /// Only read for [`TaskKind::Power`]
    pub exponent: i32,
}

impl Task {
    pub fn sine(operand: f64) -> Self {
        Self {
            kind: TaskKind::Sine,
            operand,
            exponent: 0,
        }
    }

    pub fn square_root(operand: f64) -> Self {
        Self {
            kind: TaskKind::SquareRoot,
            operand,
            exponent: 0,
        }
    }

    pub fn power(operand: f64, exponent: i32) -> Self {
        Self {
            kind: TaskKind::Power,
            operand,
            exponent,
        }
    }
}

/// Pending queue entry
#[derive(Debug, Clone)]
pub struct QueuedTask {
    /// Identifier
    pub id: TaskId,

    /// Request
    pub task: Task,

    /// Instant when this entry was queued
    pub queued_at: Instant,
}

impl QueuedTask {
    pub(crate) fn new(id: TaskId, task: Task) -> Self {
        Self {
            id,
            task,
            queued_at: Instant::now(),
        }
    }
}
