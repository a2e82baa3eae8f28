use crate::task::{Task, TaskId, TaskKind};
use crate::{Error, Result};

/// Trait representing a (stateful) task processor that runs inside the
/// server's worker thread.
///
/// The worker is the only caller, so `handle` gets `&mut self` and needs no
/// internal locking. An `Err` is delivered to whoever awaits that task's id
/// and does not stop the worker.
pub trait TaskHandler
where
    Self: Send + 'static,
{
    fn handle(&mut self, id: TaskId, task: &Task) -> Result<f64>;
}

/// Default numeric processor.
///
/// A negative square root operand yields [`Error::Domain`] rather than NaN.
#[derive(Debug, Default, Clone, Copy)]
pub struct Evaluator;

impl TaskHandler for Evaluator {
    fn handle(&mut self, _id: TaskId, task: &Task) -> Result<f64> {
        match task.kind {
            TaskKind::Sine => Ok(task.operand.sin()),
            TaskKind::SquareRoot if task.operand < 0.0 => Err(Error::Domain {
                kind: task.kind,
                operand: task.operand,
            }),
            TaskKind::SquareRoot => Ok(task.operand.sqrt()),
            TaskKind::Power => Ok(task.operand.powi(task.exponent)),
        }
    }
}

/// Wraps a closure as a [`TaskHandler`].
pub struct FnHandler<F>
where
    F: FnMut(TaskId, &Task) -> Result<f64>,
{
    op: F,
}

impl<F> FnHandler<F>
where
    F: FnMut(TaskId, &Task) -> Result<f64>,
{
    pub fn new(op: F) -> Self {
        Self { op }
    }
}

impl<F> From<F> for FnHandler<F>
where
    F: FnMut(TaskId, &Task) -> Result<f64>,
{
    fn from(op: F) -> Self {
        Self::new(op)
    }
}

impl<F> TaskHandler for FnHandler<F>
where
    F: FnMut(TaskId, &Task) -> Result<f64> + Send + 'static,
{
    fn handle(&mut self, id: TaskId, task: &Task) -> Result<f64> {
        (self.op)(id, task)
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    fn eval(task: Task) -> Result<f64> {
        Evaluator.handle(TaskId::from(0), &task)
    }

    #[test]
    fn test_evaluator_scenarios() -> Result<()> {
        assert_relative_eq!(eval(Task::sine(0.0))?, 0.0, epsilon = 1e-9);
        assert_relative_eq!(
            eval(Task::sine(std::f64::consts::FRAC_PI_2))?,
            1.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(eval(Task::square_root(4.0))?, 2.0, epsilon = 1e-9);
        assert_relative_eq!(eval(Task::power(2.0, 10))?, 1024.0, epsilon = 1e-9);
        assert_relative_eq!(eval(Task::power(2.0, -2))?, 0.25, epsilon = 1e-9);
        assert_relative_eq!(eval(Task::power(7.5, 0))?, 1.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_negative_square_root_is_domain_error() {
        let err = eval(Task::square_root(-1.0)).unwrap_err();
        assert!(matches!(
            err,
            Error::Domain {
                kind: TaskKind::SquareRoot,
                operand
            } if operand == -1.0
        ));
    }

    #[test]
    fn test_non_finite_operands_follow_ieee() -> Result<()> {
        assert!(eval(Task::square_root(f64::NAN))?.is_nan());
        assert!(eval(Task::sine(f64::INFINITY))?.is_nan());
        assert_eq!(eval(Task::square_root(f64::INFINITY))?, f64::INFINITY);
        Ok(())
    }

    #[test]
    fn test_fn_handler() -> Result<()> {
        let mut calls = 0;
        let mut handler = FnHandler::from(move |id: TaskId, task: &Task| -> Result<f64> {
            calls += 1;
            Ok(task.operand + id.as_u64() as f64 + calls as f64)
        });

        assert_eq!(handler.handle(TaskId::from(10), &Task::sine(1.0))?, 12.0);
        assert_eq!(handler.handle(TaskId::from(10), &Task::sine(1.0))?, 13.0);
        Ok(())
    }
}
