use super::error::TaskError;
use super::task::Task;
use std::sync::Mutex;
use tracing::debug;

/// Default number of idle tasks kept for reuse.
pub const DEFAULT_POOL_SIZE: usize = 256;

/// Recycles finished tasks so their queues and slot tables are reused.
pub struct TaskPool<T> {
    idle: Mutex<Vec<Task<T>>>,
    capacity: usize,
}

impl<T: Send + 'static> TaskPool<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    /// Take a fresh task from the pool, or build one when the pool is empty.
    #[must_use]
    pub fn acquire(&self) -> Task<T> {
        self.lock().pop().unwrap_or_default()
    }

    /// Hand a finished task back.
    ///
    /// A task still in flight is rejected and dropped along with its pending
    /// steps. When the pool is full the task is simply dropped.
    pub fn release(&self, mut task: Task<T>) -> Result<(), TaskError> {
        if !task.is_done() {
            debug!(pending = task.pending_steps(), "refusing to pool an unfinished task");
            return Err(TaskError::InFlight);
        }
        task.reset();
        let mut idle = self.lock();
        if idle.len() < self.capacity {
            idle.push(task);
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Task<T>>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Send + 'static> Default for TaskPool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl<T> std::fmt::Debug for TaskPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
