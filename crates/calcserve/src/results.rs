use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::task::TaskId;
use crate::{Error, Result};

/// Completed outcomes keyed by id, drained by waiters.
///
/// The worker is the only writer. Every publish broadcasts, and each waiter
/// re-checks its own id.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: Mutex<HashMap<TaskId, Result<f64>>>,
    ready: Condvar,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, id: TaskId, outcome: Result<f64>) {
        let previous = self.results.lock().insert(id, outcome);
        if previous.is_some() {
            tracing::error!("Task {} published twice, earlier outcome dropped", id);
        }
        self.ready.notify_all();
    }

    /// Remove the outcome for `id` if it is already there.
    pub fn try_take(&self, id: TaskId) -> Option<Result<f64>> {
        self.results.lock().remove(&id)
    }

    /// Block until the outcome for `id` is published, then remove and return it.
    ///
    /// `settled` runs with the store locked whenever the outcome is absent.
    /// Returning `Some(err)` ends the wait with that error. Nothing can be
    /// published while it runs. A timeout too large to represent as a
    /// deadline waits without bound.
    pub fn take<F>(&self, id: TaskId, timeout: Option<Duration>, mut settled: F) -> Result<f64>
    where
        F: FnMut() -> Option<Error>,
    {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t).map(|d| (d, t)));
        let mut results = self.results.lock();
        loop {
            if let Some(outcome) = results.remove(&id) {
                return outcome;
            }
            if let Some(err) = settled() {
                return Err(err);
            }
            match deadline {
                Some((deadline, timeout)) => {
                    if Instant::now() >= deadline {
                        return Err(Error::Timeout(id, timeout));
                    }
                    self.ready.wait_until(&mut results, deadline);
                }
                None => self.ready.wait(&mut results),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_publish_then_take() -> Result<()> {
        let store = ResultStore::new();
        store.publish(TaskId::from(1), Ok(2.5));

        assert_eq!(store.len(), 1);
        assert_eq!(store.take(TaskId::from(1), None, || None)?, 2.5);
        assert!(store.is_empty());
        assert!(store.try_take(TaskId::from(1)).is_none());
        Ok(())
    }

    #[test]
    fn test_take_times_out() {
        let store = ResultStore::new();
        let err = store
            .take(TaskId::from(4), Some(Duration::from_millis(10)), || None)
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(id, _) if id == TaskId::from(4)));
    }

    #[test]
    fn test_take_with_unbounded_timeout() -> Result<()> {
        let store = Arc::new(ResultStore::new());
        let publisher = {
            let store = store.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                store.publish(TaskId::from(9), Ok(-1.0));
            })
        };

        assert_eq!(store.take(TaskId::from(9), Some(Duration::MAX), || None)?, -1.0);
        publisher.join().unwrap();
        Ok(())
    }

    #[test]
    fn test_settled_check_short_circuits() {
        let store = ResultStore::new();
        let err = store
            .take(TaskId::from(4), None, || Some(Error::UnknownTask(TaskId::from(4))))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTask(_)));
    }

    #[test]
    fn test_error_outcome_is_delivered() {
        let store = ResultStore::new();
        store.publish(
            TaskId::from(0),
            Err(Error::Domain {
                kind: crate::TaskKind::SquareRoot,
                operand: -4.0,
            }),
        );
        assert!(matches!(
            store.try_take(TaskId::from(0)),
            Some(Err(Error::Domain { .. }))
        ));
    }

    #[test]
    fn test_waiters_only_take_their_own_id() {
        let store = Arc::new(ResultStore::new());
        let waiters = (0..4u64)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || store.take(TaskId::from(i), None, || None).unwrap())
            })
            .collect::<Vec<_>>();

        thread::sleep(Duration::from_millis(20));
        for i in (0..4u64).rev() {
            store.publish(TaskId::from(i), Ok(i as f64 * 10.0));
        }

        for (i, waiter) in waiters.into_iter().enumerate() {
            assert_eq!(waiter.join().unwrap(), i as f64 * 10.0);
        }
        assert!(store.is_empty());
    }
}
