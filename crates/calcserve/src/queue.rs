use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::task::{QueuedTask, Task, TaskId};
use crate::{Error, Result};

/// Where an id currently sits, as seen by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Never handed out by this queue
    Unissued,
    /// Waiting to be popped
    Pending,
    /// Popped, outcome not yet marked complete
    InFlight,
    /// Executed and completed; its outcome lives (or lived) in the result store
    Retired,
}

#[derive(Debug, Default)]
struct QueueState {
    /// Strictly ascending by id: ids are allocated under the same lock as the push.
    pending: VecDeque<QueuedTask>,
    next_id: u64,
    in_flight: Option<TaskId>,
    closed: bool,
}

impl QueueState {
    fn take_front(&mut self) -> Option<QueuedTask> {
        let entry = self.pending.pop_front()?;
        self.in_flight = Some(entry.id);
        Some(entry)
    }

    fn has_work_or_closed(&self) -> bool {
        !self.pending.is_empty() || self.closed
    }
}

/// FIFO set of tasks awaiting execution.
///
/// All state sits behind one mutex. Consumers block on a single condition
/// variable and re-check their predicate after every wake.
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next id, enqueue the task and wake one consumer.
    ///
    /// Never blocks. Fails once the queue is closed.
    pub fn push(&self, task: Task) -> Result<TaskId> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::ServerStopped);
        }

        let id = TaskId::from(state.next_id);
        state.next_id += 1;
        state.pending.push_back(QueuedTask::new(id, task));
        drop(state);

        self.available.notify_one();
        Ok(id)
    }

    /// Block until a task is pending or the queue is closed.
    ///
    /// Returns the oldest task and marks it in flight. `None` means the
    /// queue is closed and fully drained.
    pub fn pop(&self) -> Option<QueuedTask> {
        let mut state = self.state.lock();
        while !state.has_work_or_closed() {
            self.available.wait(&mut state);
        }
        state.take_front()
    }

    /// Like [`TaskQueue::pop`], giving up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<QueuedTask> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.pop();
        };
        let mut state = self.state.lock();
        while !state.has_work_or_closed() {
            if self.available.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.take_front()
    }

    /// Clear the in-flight marker for `id` once its outcome is published.
    pub fn complete(&self, id: TaskId) {
        let mut state = self.state.lock();
        if state.in_flight == Some(id) {
            state.in_flight = None;
        }
    }

    /// Stop accepting tasks and wake every consumer. Already pending tasks
    /// can still be popped.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of pending (not yet popped) tasks.
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn locate(&self, id: TaskId) -> Location {
        let state = self.state.lock();
        if id.as_u64() >= state.next_id {
            Location::Unissued
        } else if state.in_flight == Some(id) {
            Location::InFlight
        } else if state.pending.binary_search_by_key(&id, |e| e.id).is_ok() {
            Location::Pending
        } else {
            Location::Retired
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_ids_are_sequential() -> Result<()> {
        let queue = TaskQueue::new();
        for expected in 0..5u64 {
            assert_eq!(queue.push(Task::sine(1.0))?, TaskId::from(expected));
        }
        assert_eq!(queue.len(), 5);
        Ok(())
    }

    #[test]
    fn test_pop_is_fifo() -> Result<()> {
        let queue = TaskQueue::new();
        let ids = (0..10)
            .map(|i| queue.push(Task::power(i as f64, 2)))
            .collect::<Result<Vec<_>>>()?;

        for id in ids {
            let entry = queue.pop().expect("queue should not be empty");
            assert_eq!(entry.id, id);
            assert_eq!(entry.task.operand, id.as_u64() as f64);
            queue.complete(entry.id);
        }
        assert!(queue.is_empty());
        Ok(())
    }

    #[test]
    fn test_pop_timeout_on_empty_queue() {
        let queue = TaskQueue::new();
        assert!(queue.pop_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_pop_timeout_with_unbounded_duration() -> Result<()> {
        let queue = TaskQueue::new();
        let id = queue.push(Task::sine(0.0))?;
        assert_eq!(queue.pop_timeout(Duration::MAX).map(|e| e.id), Some(id));

        queue.close();
        assert!(queue.pop_timeout(Duration::MAX).is_none());
        Ok(())
    }

    #[test]
    fn test_close_drains_before_signalling_no_work() -> Result<()> {
        let queue = TaskQueue::new();
        queue.push(Task::sine(0.0))?;
        queue.push(Task::sine(1.0))?;
        queue.close();

        assert!(queue.is_closed());
        assert!(matches!(queue.push(Task::sine(2.0)), Err(Error::ServerStopped)));

        assert_eq!(queue.pop().map(|e| e.id), Some(TaskId::from(0)));
        assert_eq!(queue.pop().map(|e| e.id), Some(TaskId::from(1)));
        assert!(queue.pop().is_none());
        Ok(())
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let queue = Arc::new(TaskQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn test_push_wakes_blocked_consumer() -> Result<()> {
        let queue = Arc::new(TaskQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop().map(|e| e.id))
        };

        thread::sleep(Duration::from_millis(20));
        let id = queue.push(Task::square_root(9.0))?;
        assert_eq!(consumer.join().unwrap(), Some(id));
        Ok(())
    }

    #[test]
    fn test_locate() -> Result<()> {
        let queue = TaskQueue::new();
        let first = queue.push(Task::sine(0.0))?;
        let second = queue.push(Task::sine(0.0))?;

        assert_eq!(queue.locate(first), Location::Pending);
        assert_eq!(queue.locate(TaskId::from(99)), Location::Unissued);

        let entry = queue.pop().unwrap();
        assert_eq!(entry.id, first);
        assert_eq!(queue.locate(first), Location::InFlight);
        assert_eq!(queue.locate(second), Location::Pending);

        queue.complete(first);
        assert_eq!(queue.locate(first), Location::Retired);
        Ok(())
    }

    #[test]
    fn test_concurrent_push_never_duplicates_ids() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 500;

        let queue = Arc::new(TaskQueue::new());
        let handles = (0..PRODUCERS)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    (0..PER_PRODUCER)
                        .map(|_| queue.push(Task::sine(0.5)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        let ids = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), PRODUCERS * PER_PRODUCER);

        // Pending order must still be ascending
        let mut previous = None;
        while let Some(entry) = queue.pop_timeout(Duration::ZERO) {
            if let Some(prev) = previous {
                assert!(entry.id > prev);
            }
            previous = Some(entry.id);
        }
    }
}
