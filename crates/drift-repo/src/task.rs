//! Fan-out of independent tasks with join-all, first-error semantics.

use std::future::Future;
use tokio::task::{JoinError, JoinSet};

/// A group of independent tasks that are all awaited before reporting.
///
/// Unlike `try_join_all`, a failing task does not cancel its siblings:
/// every spawned task runs to completion, and [`TaskGroup::join_all`]
/// returns the first error in completion order.
pub struct TaskGroup<E> {
    tasks: JoinSet<Result<(), E>>,
}

impl<E> TaskGroup<E>
where
    E: From<JoinError> + Send + 'static,
{
    /// Creates an empty group.
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
        }
    }

    /// Spawns a task onto the current runtime.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Returns the number of tasks still running or unjoined.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every task and returns the first error observed.
    pub async fn join_all(mut self) -> Result<(), E> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            let outcome = joined.map_err(E::from).and_then(|r| r);
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<E> Default for TaskGroup<E>
where
    E: From<JoinError> + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
